use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::Batch;
use crate::core::{Error, Result, UploadConfig};
use super::UPLOAD_TIMEOUT;

/// Posts batches to an IoTPlotter feed as CSV
pub struct IotPlotterUploader {
    /// HTTP client
    client: Client,
    /// Feed endpoint
    url: String,
    /// Feed API key
    api_key: String,
}

impl IotPlotterUploader {
    /// Creates an uploader for the configured feed
    pub fn new(config: &UploadConfig) -> Result<Self> {
        if config.feed_id.is_empty() {
            return Err(Error::config("Upload feed id must not be empty"));
        }

        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| Error::upload(format!("Failed to build HTTP client: {}", e)))?;

        Ok(IotPlotterUploader {
            client,
            url: format!(
                "{}/api/v2/feed/{}.csv",
                config.base_url.trim_end_matches('/'),
                config.feed_id
            ),
            api_key: config.api_key.clone(),
        })
    }

    /// Feed endpoint
    pub fn url(&self) -> &str {
        &self.url
    }

    /// CSV body for a batch: one `0,<name>,<value>` line per present reading
    pub fn csv_body(batch: &Batch) -> String {
        batch
            .flatten()
            .into_iter()
            .map(|(name, value)| format!("0,{},{}\n", name, value))
            .collect()
    }

    /// Uploads one batch
    pub async fn upload(&self, batch: &Batch) -> Result<()> {
        let body = Self::csv_body(batch);
        if body.is_empty() {
            debug!(cadence = ?batch.cadence, "Nothing to upload");
            return Ok(());
        }

        self.client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        debug!(cadence = ?batch.cadence, "Uploaded batch");
        Ok(())
    }

    /// Uploads batches until the producer goes away
    ///
    /// A failed upload drops that batch; the next one is tried as usual.
    pub async fn run(&self, mut batches: mpsc::Receiver<Batch>) -> Result<()> {
        info!(url = %self.url, "Uploading batches");
        while let Some(batch) = batches.recv().await {
            if let Err(e) = self.upload(&batch).await {
                warn!(error = %e, cadence = ?batch.cadence, "Upload failed");
            }
        }
        info!("Batch channel closed, uploader stopping");
        Ok(())
    }
}
