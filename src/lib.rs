//! Votronic bus client
//!
//! Talks to the devices of a Votronic battery/solar controller over the
//! shared serial bus: frame synchronization on a noisy byte stream, decoding
//! of the known measurements, request/response polling with bounded retries,
//! and a multi-rate collection loop that hands batches to an uploader.
pub mod core;

pub mod client;
pub mod network;
pub mod protocol;
pub mod sync;
pub mod transport;
pub mod util;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use crate::core::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
