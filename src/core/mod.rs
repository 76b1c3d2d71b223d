//! Core types and traits for the Votronic bus client
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod clock;
pub mod error;
pub mod serde;
pub mod types;

pub use self::clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use self::error::{Error, Result, EXIT_FAILURE, EXIT_WATCHDOG};
pub use self::types::{Config, PollConfig, ScheduleConfig, SerialConfig, UploadConfig};

/// Line speed of the controller bus
pub const DEFAULT_BAUD_RATE: u32 = 19200;

/// Root of the telemetry upload service
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://iotplotter.com";
