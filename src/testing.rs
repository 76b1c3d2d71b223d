//! In-memory bus used by the unit tests

use bytes::BytesMut;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::codec::Decoder;

use crate::core::{Clock, Error, ManualClock, Result};
use crate::protocol::{
    Frame, FrameCodec, MeasurementKind, MeasurementTable, CLASS_REQUEST, CLASS_RESPONSE,
    PROTOCOL_BYTE,
};
use crate::transport::Transport;

/// Response payload the mock devices report for each kind
pub fn canned_payload(kind: MeasurementKind) -> Vec<u8> {
    let field_id = MeasurementTable::entry(kind).field_id;
    let data: [u8; 2] = match kind {
        MeasurementKind::SolarCurrent => 32i16.to_le_bytes(),  // 3.2 A
        MeasurementKind::HouseCurrent => 50i16.to_le_bytes(),  // 5.0 A
        MeasurementKind::HouseVoltage => 1325u16.to_le_bytes(), // 13.25 V
        MeasurementKind::VehicleVoltage => 1220u16.to_le_bytes(),
        MeasurementKind::HouseCapacityAmpHours => 500u16.to_le_bytes(),
        MeasurementKind::HouseCapacityPercent => [87, 3],
        MeasurementKind::FreshPercent => 50u16.to_le_bytes(),
        MeasurementKind::GrayPercent => 10u16.to_le_bytes(),
    };
    vec![field_id, data[0], data[1]]
}

/// Response frame carrying [`canned_payload`], in the panel's header order
pub fn canned_response(kind: MeasurementKind) -> Frame {
    let address = MeasurementTable::entry(kind).address;
    Frame::assemble([CLASS_RESPONSE, PROTOCOL_BYTE, address], &canned_payload(kind))
}

/// Response from a device nobody polls
pub fn chatter_frame() -> Frame {
    Frame::assemble([CLASS_RESPONSE, 0x99, PROTOCOL_BYTE], &[0x01, 0x00, 0x00])
}

/// Everything written to a [`MockBus`], with the clock reading at write time
#[derive(Clone, Default)]
pub struct WriteLog {
    entries: Arc<Mutex<Vec<(Duration, Vec<u8>)>>>,
}

impl WriteLog {
    fn push(&self, at: Duration, bytes: &[u8]) {
        self.entries.lock().unwrap().push((at, bytes.to_vec()));
    }

    /// Number of writes
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Written frames, in order
    pub fn frames(&self) -> Vec<Frame> {
        self.timed_frames().into_iter().map(|(_, f)| f).collect()
    }

    /// Written frames with their write time
    pub fn timed_frames(&self) -> Vec<(Duration, Frame)> {
        let mut codec = FrameCodec::new();
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(at, bytes)| {
                let mut buf = BytesMut::from(&bytes[..]);
                (*at, codec.decode(&mut buf).unwrap().unwrap())
            })
            .collect()
    }

    /// Times at which a request went to `address`
    pub fn request_times(&self, address: u8) -> Vec<Duration> {
        self.timed_frames()
            .into_iter()
            .filter(|(_, f)| f.class() == CLASS_REQUEST && f.address() == address)
            .map(|(at, _)| at)
            .collect()
    }
}

/// Scripted in-memory transport
#[derive(Default)]
pub struct MockBus {
    /// Bytes waiting to be read
    inbound: VecDeque<u8>,
    /// Frame pushed whenever the bus would otherwise be idle
    chatter: Option<Frame>,
    /// Bytes pushed whenever the bus would otherwise be idle
    noise: Option<Vec<u8>>,
    /// Fail reads with end-of-stream once drained
    eof_when_empty: bool,
    /// Answer requests with canned responses
    answering: bool,
    /// Max bytes handed out per read
    read_limit: Option<usize>,
    /// Clock moved forward by every read, simulating the read timeout
    read_wait: Option<(ManualClock, Duration)>,
    /// Clock used to stamp writes
    clock: Option<ManualClock>,
    writes: WriteLog,
    reads: usize,
}

impl MockBus {
    /// Silent bus: reads return nothing, forever
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus that delivers `bytes` and then reports end of stream
    pub fn with_bytes(bytes: &[u8]) -> Self {
        MockBus {
            inbound: bytes.iter().copied().collect(),
            eof_when_empty: true,
            ..Self::default()
        }
    }

    /// Bus whose devices answer every request for a known measurement, with
    /// unrelated chatter in between
    pub fn answering(clock: ManualClock) -> Self {
        MockBus {
            chatter: Some(chatter_frame()),
            answering: true,
            clock: Some(clock),
            ..Self::default()
        }
    }

    /// Bus that only ever carries unrelated chatter
    pub fn chatter_only() -> Self {
        MockBus {
            chatter: Some(chatter_frame()),
            ..Self::default()
        }
    }

    /// Every read advances `clock` by `wait`
    pub fn quiet(mut self, clock: ManualClock, wait: Duration) -> Self {
        self.read_wait = Some((clock, wait));
        self
    }

    /// Idle reads return `noise` instead of nothing
    pub fn with_noise(mut self, noise: Vec<u8>) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Limits bytes per read
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit);
        self
    }

    /// Queues bytes for reading
    pub fn push(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Handle on the write log that survives moving the bus
    pub fn write_log(&self) -> WriteLog {
        self.writes.clone()
    }

    /// Number of read calls
    pub fn reads(&self) -> usize {
        self.reads
    }

    fn answer(&mut self, written: &[u8]) {
        let mut buf = BytesMut::from(written);
        let Ok(Some(frame)) = FrameCodec::new().decode(&mut buf) else {
            return;
        };
        let Some(field_id) = frame.field_id() else {
            return;
        };
        if frame.class() != CLASS_REQUEST {
            return;
        }
        if let Some(entry) = MeasurementTable::lookup(frame.address(), field_id) {
            let response = canned_response(entry.kind);
            self.push(response.as_bytes());
        }
    }
}

impl Transport for MockBus {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reads += 1;
        if let Some((clock, wait)) = &self.read_wait {
            clock.advance(*wait);
        }

        if self.inbound.is_empty() {
            if let Some(chatter) = &self.chatter {
                let bytes = chatter.as_bytes().to_vec();
                self.push(&bytes);
            } else if let Some(noise) = self.noise.clone() {
                self.push(&noise);
            } else if self.eof_when_empty {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "mock bus drained",
                )));
            }
        }

        let limit = self.read_limit.unwrap_or(usize::MAX);
        let n = buf.len().min(limit).min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let at = self.clock.as_ref().map(|c| c.now()).unwrap_or_default();
        self.writes.push(at, bytes);
        if self.answering {
            self.answer(bytes);
        }
        Ok(())
    }
}
