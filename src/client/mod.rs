//! Bus client module
//!
//! Request/response polling on top of the frame synchronizer, and the
//! multi-rate collection loop that turns polled measurements into batches.

mod batch;
mod poll;
mod scheduler;

pub use self::batch::{Batch, BatchSink, Cadence, Reading, USAGE_CURRENT};
pub use self::poll::PollingClient;
pub use self::scheduler::{StatsScheduler, FAST_KINDS, SLOW_KINDS, WATER_KINDS};
