//! Votronic bus command-line tool
//!
//! Dumps bus traffic, sends hand-crafted frames and runs the stats collector.

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use votonic::client::{Batch, PollingClient, StatsScheduler};
use votonic::core::{Clock, Config, SystemClock, UploadConfig, DEFAULT_UPLOAD_BASE_URL};
use votonic::network::IotPlotterUploader;
use votonic::protocol::{self, Frame};
use votonic::sync::FrameSynchronizer;
use votonic::transport::SerialTransport;
use votonic::util::parse_hex;
use votonic::{Error, Result};

/// Batches buffered between the collector thread and the uploader
const BATCH_QUEUE: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "votonic", version, about = "Votronic controller bus client", long_about = None)]
struct Cli {
    /// Serial device, overrides the config file
    #[arg(short, long, env = "VOTONIC_DEVICE")]
    device: Option<String>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every valid frame on the bus
    Dump,

    /// Send one frame given as hex (3 header bytes, then the payload)
    Send {
        /// Frame bytes, e.g. "22 10 f4 02 00 00"
        hex: String,

        /// Frames to print before sending
        #[arg(short = 'b', long, default_value_t = 0)]
        read_before: usize,

        /// Frames to print after sending
        #[arg(short = 'a', long, default_value_t = 0)]
        read_after: usize,
    },

    /// Poll measurements forever and upload them
    Collect {
        /// IoTPlotter feed id
        #[arg(short = 'f', long, env = "VOTONIC_FEED_ID")]
        feed_id: Option<String>,

        /// IoTPlotter API key
        #[arg(short = 'k', long, env = "VOTONIC_API_KEY")]
        key: Option<String>,

        /// Log every frame sent and received
        #[arg(short = 'v', long)]
        dump: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(matches!(cli.command, Command::Collect { dump: true, .. }));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info,votonic=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(device) = cli.device {
        config.serial.device = device;
    }

    match cli.command {
        Command::Dump => {
            config.validate()?;
            blocking(move || dump(&config)).await
        }
        Command::Send { hex, read_before, read_after } => {
            config.validate()?;
            let frame = Frame::from_raw(&parse_hex(&hex)?)?;
            blocking(move || send(&config, frame, read_before, read_after)).await
        }
        Command::Collect { feed_id, key, .. } => {
            apply_upload_flags(&mut config, feed_id, key)?;
            config.validate()?;
            collect(config).await
        }
    }
}

/// Runs bus work on the blocking pool
async fn blocking<F>(work: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Io(io::Error::other(format!("Bus thread failed: {}", e))))?
}

fn apply_upload_flags(config: &mut Config, feed_id: Option<String>, key: Option<String>) -> Result<()> {
    match (feed_id, key) {
        (Some(feed_id), Some(api_key)) => {
            let base_url = config
                .upload
                .as_ref()
                .map(|u| u.base_url.clone())
                .unwrap_or_else(|| DEFAULT_UPLOAD_BASE_URL.to_string());
            config.upload = Some(UploadConfig { feed_id, api_key, base_url });
            Ok(())
        }
        (None, None) => Ok(()),
        _ => Err(Error::config("--feed-id and --key must be given together")),
    }
}

fn open(config: &Config) -> Result<FrameSynchronizer<SerialTransport>> {
    Ok(FrameSynchronizer::new(SerialTransport::open(&config.serial)?))
}

fn dump(config: &Config) -> Result<()> {
    let clock = SystemClock::new();
    let mut sync = open(config)?;
    for frame in &mut sync {
        let frame = frame?;
        println!("{:10.3}  {}", clock.now().as_secs_f64(), protocol::annotate(&frame));
    }
    Ok(())
}

fn send(config: &Config, frame: Frame, read_before: usize, read_after: usize) -> Result<()> {
    let mut sync = open(config)?;
    print_frames(&mut sync, read_before)?;
    println!("--> {}", frame);
    sync.send(frame)?;
    print_frames(&mut sync, read_after)
}

fn print_frames(sync: &mut FrameSynchronizer<SerialTransport>, count: usize) -> Result<()> {
    for _ in 0..count {
        let frame = sync.next_frame()?;
        println!("<-- {}", protocol::annotate(&frame));
    }
    Ok(())
}

async fn collect(config: Config) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Batch>(BATCH_QUEUE);

    match &config.upload {
        Some(upload) => {
            let uploader = IotPlotterUploader::new(upload)?;
            tokio::spawn(async move { uploader.run(rx).await });
        }
        None => {
            info!("No upload configured, printing batches");
            tokio::spawn(print_batches(rx));
        }
    }

    blocking(move || {
        let clock = SystemClock::shared();
        let client = PollingClient::new(open(&config)?, clock.clone(), config.poll.clone());
        StatsScheduler::new(client, tx, clock, config.schedule.clone()).run()
    })
    .await
}

async fn print_batches(mut batches: mpsc::Receiver<Batch>) {
    while let Some(batch) = batches.recv().await {
        match serde_json::to_string(&batch) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "Failed to serialize batch"),
        }
    }
}
