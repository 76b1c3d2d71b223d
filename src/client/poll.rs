use tracing::{debug, trace, warn};

use crate::core::{PollConfig, Result, SharedClock};
use crate::protocol::{self, Frame, Measurement, MeasurementKind, Request};
use crate::sync::FrameSynchronizer;
use crate::transport::Transport;

/// Request/response client over the shared bus
///
/// The bus carries traffic from every device, so an answer is searched for in
/// a bounded window of frames rather than expected as the next frame.
pub struct PollingClient<T> {
    /// Frame source and sink
    sync: FrameSynchronizer<T>,
    /// Time source for the retry backoff
    clock: SharedClock,
    /// Retry budget
    config: PollConfig,
}

impl<T: Transport> PollingClient<T> {
    /// Creates a new polling client
    pub fn new(sync: FrameSynchronizer<T>, clock: SharedClock, config: PollConfig) -> Self {
        PollingClient { sync, clock, config }
    }

    /// Sends the request for `kind` without waiting for the answer
    pub fn request(&mut self, kind: MeasurementKind) -> Result<()> {
        self.send(protocol::encode(&Request::for_kind(kind)))
    }

    /// Sends an arbitrary frame
    pub fn send(&mut self, frame: Frame) -> Result<()> {
        self.sync.send(frame)
    }

    /// Reads and decodes exactly one frame
    pub fn next_measurement(&mut self) -> Result<Measurement> {
        let frame = self.sync.next_frame()?;
        Ok(protocol::decode(&frame))
    }

    /// Polls one measurement with bounded retries
    ///
    /// SEND writes the request; AWAIT scans up to `frames_per_send` frames,
    /// dropping anything that is not the requested kind. An empty window
    /// backs off and returns to SEND until `max_sends` requests went out,
    /// after which the measurement is absent (`Ok(None)`). Only transport
    /// failures and watchdog expiry are errors.
    pub fn get(&mut self, kind: MeasurementKind) -> Result<Option<Measurement>> {
        for attempt in 1..=self.config.max_sends {
            self.request(kind)?;

            for _ in 0..self.config.frames_per_send {
                let measurement = self.next_measurement()?;
                if measurement.is(kind) {
                    debug!(%kind, attempt, value = %measurement, "Got answer");
                    return Ok(Some(measurement));
                }
                trace!(%kind, other = %measurement, "Ignoring unrelated frame");
            }

            if attempt < self.config.max_sends {
                debug!(%kind, attempt, "No answer yet, backing off");
                self.clock.sleep(self.config.retry_backoff);
            }
        }

        warn!(%kind, sends = self.config.max_sends, "Measurement absent");
        Ok(None)
    }

    /// Polls several kinds in order
    pub fn get_all(
        &mut self,
        kinds: &[MeasurementKind],
    ) -> Result<Vec<(MeasurementKind, Option<Measurement>)>> {
        kinds
            .iter()
            .map(|&kind| self.get(kind).map(|m| (kind, m)))
            .collect()
    }

    /// The underlying synchronizer
    pub fn synchronizer(&self) -> &FrameSynchronizer<T> {
        &self.sync
    }

    /// Mutable access to the underlying synchronizer
    pub fn synchronizer_mut(&mut self) -> &mut FrameSynchronizer<T> {
        &mut self.sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Clock, Error, ManualClock};
    use crate::protocol::{address, Scaled};
    use crate::testing::{canned_response, MockBus};
    use std::sync::Arc;
    use std::time::Duration;

    fn client(bus: MockBus, clock: &ManualClock) -> PollingClient<MockBus> {
        PollingClient::new(
            FrameSynchronizer::new(bus),
            Arc::new(clock.clone()),
            PollConfig::default(),
        )
    }

    #[test]
    fn test_answer_found_among_chatter() {
        let clock = ManualClock::new();
        let mut bus = MockBus::answering(clock.clone());
        // Unrelated traffic already queued ahead of the answer
        bus.push(canned_response(MeasurementKind::HouseVoltage).as_bytes());
        bus.push(canned_response(MeasurementKind::GrayPercent).as_bytes());
        let log = bus.write_log();

        let mut client = client(bus, &clock);
        let answer = client.get(MeasurementKind::SolarCurrent).unwrap();

        assert_eq!(answer, Some(Measurement::SolarCurrent(Scaled::new(32, 1))));
        assert_eq!(log.len(), 1);
        assert_eq!(client.synchronizer().stats().frames, 3);
    }

    #[test]
    fn test_retry_budget() {
        let clock = ManualClock::new();
        let bus = MockBus::chatter_only();
        let log = bus.write_log();

        let mut client = client(bus, &clock);
        let answer = client.get(MeasurementKind::HouseCurrent).unwrap();

        assert_eq!(answer, None);
        assert_eq!(log.len(), 3);
        assert_eq!(log.request_times(address::HOUSE).len(), 3);
        assert_eq!(client.synchronizer().stats().frames, 30);
        assert_eq!(client.synchronizer().get_ref().reads(), 30);
        // Backoff between the three sends only
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_late_answer_on_second_send() {
        let clock = ManualClock::new();
        let mut bus = MockBus::chatter_only();
        let filler = crate::testing::chatter_frame();
        for _ in 0..10 {
            bus.push(filler.as_bytes());
        }
        bus.push(canned_response(MeasurementKind::VehicleVoltage).as_bytes());
        let log = bus.write_log();

        let mut client = client(bus, &clock);
        let answer = client.get(MeasurementKind::VehicleVoltage).unwrap();

        assert_eq!(answer, Some(Measurement::VehicleVoltage(Scaled::new(1220, 2))));
        assert_eq!(log.len(), 2);
        assert_eq!(clock.now(), Duration::from_millis(500));
    }

    #[test]
    fn test_transport_failure_is_not_absence() {
        let clock = ManualClock::new();
        let bus = MockBus::with_bytes(&[]);
        let mut client = client(bus, &clock);
        assert!(matches!(client.get(MeasurementKind::SolarCurrent), Err(Error::Io(_))));
    }

    #[test]
    fn test_get_all_keeps_order() {
        let clock = ManualClock::new();
        let mut client = client(MockBus::answering(clock.clone()), &clock);
        let kinds = [MeasurementKind::HouseCapacityPercent, MeasurementKind::HouseCapacityAmpHours];
        let results = client.get_all(&kinds).unwrap();

        assert_eq!(results[0].0, MeasurementKind::HouseCapacityPercent);
        assert_eq!(
            results[0].1,
            Some(Measurement::HouseCapacityPercent { percent: 87, unknown: 3 })
        );
        assert_eq!(results[1].1, Some(Measurement::HouseCapacityAmpHours(500)));
    }
}
