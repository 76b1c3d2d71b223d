//! Telemetry upload module
//!
//! Forwards completed batches to a remote time-series service.

mod upload;

pub use self::upload::IotPlotterUploader;

use std::time::Duration;

/// Per-request deadline for uploads
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);
