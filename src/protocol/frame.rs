use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::core::{Error, Result};
use crate::util::hex_bytes;
use super::{
    checksum, FRAME_OVERHEAD, HEADER_LEN, LENGTH_OFFSET, MAX_PAYLOAD_LEN, PROTOCOL_BYTE, SENTINEL,
};

/// One complete, checksum-valid protocol unit
///
/// Layout: sentinel, 3 header bytes (class, device address, 0xF4), payload
/// length N, N payload bytes, checksum. Only built through [`Frame::new`] or
/// by [`FrameCodec`] after verification, so every instance folds to zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Builds a frame from a header and payload, appending the checksum
    pub fn new(header: [u8; HEADER_LEN], payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::protocol(format!(
                "Payload of {} bytes exceeds {} byte limit",
                payload.len(),
                MAX_PAYLOAD_LEN
            )));
        }

        Ok(Self::assemble(header, payload))
    }

    /// Builds a frame whose payload is known to fit the length byte
    pub(crate) fn assemble(header: [u8; HEADER_LEN], payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);

        let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
        buf.put_u8(SENTINEL);
        buf.put_slice(&header);
        buf.put_u8(payload.len() as u8);
        buf.put_slice(payload);
        let sum = checksum::compute(&buf);
        buf.put_u8(sum);

        Frame { bytes: buf.freeze() }
    }

    /// Builds a frame from raw `header ++ payload` bytes, as typed on the command line
    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_LEN {
            return Err(Error::protocol(format!(
                "Header needs {} bytes, got {}",
                HEADER_LEN,
                raw.len()
            )));
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&raw[..HEADER_LEN]);
        Self::new(header, &raw[HEADER_LEN..])
    }

    /// Entire frame, sentinel through checksum
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total length on the wire
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Frames always carry at least the fixed overhead
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The three header bytes
    pub fn header(&self) -> &[u8] {
        &self.bytes[1..1 + HEADER_LEN]
    }

    /// Request/response marker
    pub fn class(&self) -> u8 {
        self.bytes[1]
    }

    /// Device the frame concerns
    ///
    /// Requests carry the address ahead of the protocol byte. The panel answers
    /// with the two swapped (`62 f4 <address>`), so the address is whichever of
    /// header bytes 2 and 3 is not the protocol byte.
    pub fn address(&self) -> u8 {
        if self.bytes[2] == PROTOCOL_BYTE {
            self.bytes[3]
        } else {
            self.bytes[2]
        }
    }

    /// Payload bytes, field id first
    pub fn payload(&self) -> &[u8] {
        &self.bytes[LENGTH_OFFSET + 1..self.bytes.len() - 1]
    }

    /// Field id, if the payload is not empty
    pub fn field_id(&self) -> Option<u8> {
        self.payload().first().copied()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", hex_bytes(self.header()), hex_bytes(self.payload()))
    }
}

/// Counters describing how clean the incoming stream is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Valid frames produced
    pub frames: u64,
    /// Sentinel-started candidates dropped on checksum mismatch
    pub rejected: u64,
    /// Bytes thrown away while hunting for a sentinel
    pub skipped_bytes: u64,
}

/// Sentinel-synchronised frame extractor
///
/// Skips bytes until a sentinel, trusts the length byte that follows, and
/// checks the checksum over the whole candidate. A failed candidate is dropped
/// as a whole and the hunt resumes with the byte after it. A sentinel value
/// inside a payload is not escaped: if the stream is entered mid-frame such a
/// byte may start a bogus candidate, which the checksum then rejects. A
/// corrupted length byte costs at most 255 further bytes before resync.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    stats: SyncStats,
}

impl FrameCodec {
    /// Creates a new frame codec
    pub fn new() -> Self {
        FrameCodec::default()
    }

    /// Counters accumulated since creation
    pub fn stats(&self) -> SyncStats {
        self.stats
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            // Hunt for the sentinel
            match src.iter().position(|&b| b == SENTINEL) {
                Some(0) => {}
                Some(skip) => {
                    trace!(skip, "Skipping bytes before sentinel");
                    self.stats.skipped_bytes += skip as u64;
                    src.advance(skip);
                }
                None => {
                    if !src.is_empty() {
                        trace!(skip = src.len(), "No sentinel in backlog");
                        self.stats.skipped_bytes += src.len() as u64;
                        src.clear();
                    }
                    return Ok(None);
                }
            }

            if src.len() <= LENGTH_OFFSET {
                // Need the length byte
                return Ok(None);
            }

            let total = FRAME_OVERHEAD + src[LENGTH_OFFSET] as usize;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }

            let candidate = src.split_to(total).freeze();
            if checksum::verify(&candidate) {
                self.stats.frames += 1;
                return Ok(Some(Frame { bytes: candidate }));
            }

            self.stats.rejected += 1;
            trace!(frame = %hex_bytes(&candidate), "Dropping frame with bad checksum");
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}
