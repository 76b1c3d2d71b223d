use std::io;
use std::time::Duration;
use thiserror::Error;

/// Custom error types for the Votronic bus client
///
/// Only fatal conditions live here. A measurement that does not arrive in time
/// is reported as `Ok(None)` by the polling client, and corrupted frames never
/// leave the synchronizer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Watchdog expired: no frame drained for {idle:?}")]
    WatchdogExpired {
        /// Time since the last valid frame
        idle: Duration,
    },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Upload error: {0}")]
    Upload(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Exit status used when the watchdog kills the process
pub const EXIT_WATCHDOG: u8 = 2;

/// Exit status for every other fatal error
pub const EXIT_FAILURE: u8 = 1;

impl Error {
    /// Creates a new serial port error
    pub fn serial(msg: impl Into<String>) -> Self {
        Error::Serial(msg.into())
    }

    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Error::Sink(msg.into())
    }

    /// Creates a new upload error
    pub fn upload(msg: impl Into<String>) -> Self {
        Error::Upload(msg.into())
    }

    /// Process exit status a supervisor sees for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::WatchdogExpired { .. } => EXIT_WATCHDOG,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Error::Serial(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Upload(err.to_string())
    }
}
