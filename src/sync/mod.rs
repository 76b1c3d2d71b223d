//! Frame synchronization module
//!
//! Turns the raw byte stream of the bus into checksum-valid frames. The
//! synchronizer exclusively owns both the transport and the backlog of bytes
//! read but not yet framed.

mod watchdog;

pub use self::watchdog::Watchdog;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::core::Result;
use crate::protocol::{Frame, FrameCodec, SyncStats};
use crate::transport::Transport;

/// Bytes requested from the transport per read
const READ_CHUNK: usize = 64;

/// Lazy, unbounded source of valid frames over one transport
pub struct FrameSynchronizer<T> {
    /// Byte source/sink
    transport: T,
    /// Sentinel hunting and checksum validation
    codec: FrameCodec,
    /// Bytes read but not yet framed; never holds more than one candidate
    /// frame once the codec has run
    backlog: BytesMut,
    /// Optional deadline on valid frames
    watchdog: Option<Watchdog>,
}

impl<T: Transport> FrameSynchronizer<T> {
    /// Creates a synchronizer without a watchdog
    pub fn new(transport: T) -> Self {
        FrameSynchronizer {
            transport,
            codec: FrameCodec::new(),
            backlog: BytesMut::with_capacity(2 * READ_CHUNK),
            watchdog: None,
        }
    }

    /// Arms a watchdog that fails reads when no valid frame shows up in time
    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.set_watchdog(watchdog);
        self
    }

    /// Arms or replaces the watchdog
    pub fn set_watchdog(&mut self, watchdog: Watchdog) {
        self.watchdog = Some(watchdog);
    }

    /// Blocks until the next valid frame
    ///
    /// Transport errors and watchdog expiry are returned as errors; a frame is
    /// never handed out partially read.
    pub fn next_frame(&mut self) -> Result<Frame> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.codec.decode(&mut self.backlog)? {
                if let Some(watchdog) = &mut self.watchdog {
                    watchdog.feed();
                }
                debug!(frame = %frame, "<--");
                return Ok(frame);
            }

            if let Some(watchdog) = &self.watchdog {
                watchdog.check()?;
            }

            let n = self.transport.read(&mut chunk)?;
            self.backlog.extend_from_slice(&chunk[..n]);
        }
    }

    /// Writes a frame to the bus
    pub fn send(&mut self, frame: Frame) -> Result<()> {
        debug!(frame = %frame, "-->");
        let mut out = BytesMut::with_capacity(frame.len());
        self.codec.encode(frame, &mut out)?;
        self.transport.write_all(&out)
    }

    /// Stream counters
    pub fn stats(&self) -> SyncStats {
        self.codec.stats()
    }

    /// Shared access to the transport
    pub fn get_ref(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Iterator for FrameSynchronizer<T> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_frame())
    }
}
