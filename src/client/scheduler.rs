use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::{Result, ScheduleConfig, SharedClock};
use crate::protocol::{Measurement, MeasurementKind, Scaled};
use crate::sync::Watchdog;
use crate::transport::Transport;
use super::batch::{Batch, BatchSink, Cadence, Reading, USAGE_CURRENT};
use super::poll::PollingClient;

/// Polled every fast cadence
pub const FAST_KINDS: [MeasurementKind; 2] =
    [MeasurementKind::SolarCurrent, MeasurementKind::HouseCurrent];

/// Polled every slow cadence
pub const SLOW_KINDS: [MeasurementKind; 4] = [
    MeasurementKind::HouseCapacityAmpHours,
    MeasurementKind::HouseCapacityPercent,
    MeasurementKind::HouseVoltage,
    MeasurementKind::VehicleVoltage,
];

/// Prompted and captured during a water window
pub const WATER_KINDS: [MeasurementKind; 2] =
    [MeasurementKind::FreshPercent, MeasurementKind::GrayPercent];

/// Open water collection window
#[derive(Debug)]
struct WaterWindow {
    /// Clock reading when the window opened
    opened_at: Duration,
    /// Last keep-alive burst
    last_prompt: Option<Duration>,
    /// Latest value per kind seen by the drain
    captured: BTreeMap<MeasurementKind, Measurement>,
}

impl WaterWindow {
    fn open(now: Duration) -> Self {
        WaterWindow {
            opened_at: now,
            last_prompt: None,
            captured: BTreeMap::new(),
        }
    }
}

/// Perpetual multi-rate collection loop over one bus
///
/// Every tick drains exactly one frame so the receive buffer never backs up,
/// then runs whichever cadences are due. Fast and slow cadences poll through
/// the [`PollingClient`]; the water cadence opens a window during which the
/// tank sensors are prompted periodically and their answers are picked out of
/// the drained frames.
pub struct StatsScheduler<T, S> {
    /// Bus access
    client: PollingClient<T>,
    /// Batch consumer
    sink: S,
    /// Time source for cadences
    clock: SharedClock,
    /// Cadence settings
    config: ScheduleConfig,
    /// Last fast batch
    last_fast: Duration,
    /// Last slow batch
    last_slow: Duration,
    /// Last time a water window opened
    last_water: Duration,
    /// Window in progress
    water: Option<WaterWindow>,
}

impl<T: Transport, S: BatchSink> StatsScheduler<T, S> {
    /// Creates a scheduler whose cadences count from now and arms the watchdog
    pub fn new(
        mut client: PollingClient<T>,
        sink: S,
        clock: SharedClock,
        config: ScheduleConfig,
    ) -> Self {
        let watchdog = Watchdog::new(clock.clone(), config.watchdog_timeout);
        client.synchronizer_mut().set_watchdog(watchdog);

        let now = clock.now();
        StatsScheduler {
            client,
            sink,
            clock,
            config,
            last_fast: now,
            last_slow: now,
            last_water: now,
            water: None,
        }
    }

    /// Runs until a fatal error
    pub fn run(&mut self) -> Result<()> {
        info!(
            fast = ?self.config.fast_interval,
            slow = ?self.config.slow_interval,
            water = ?self.config.water_interval,
            "Collecting stats"
        );
        loop {
            self.tick()?;
        }
    }

    /// One loop iteration: drain a frame, then run due cadences
    pub fn tick(&mut self) -> Result<()> {
        let measurement = self.client.next_measurement()?;
        self.capture(measurement);

        if self.due(self.last_fast, self.config.fast_interval) {
            self.last_fast = self.clock.now();
            self.collect_fast()?;
        }

        if self.due(self.last_slow, self.config.slow_interval) {
            self.last_slow = self.clock.now();
            self.collect_slow()?;
        }

        self.step_water()
    }

    fn due(&self, last: Duration, interval: Duration) -> bool {
        self.clock.now().saturating_sub(last) >= interval
    }

    fn capture(&mut self, measurement: Measurement) {
        let Some(window) = &mut self.water else {
            return;
        };
        if let Some(kind) = measurement.kind().filter(|k| WATER_KINDS.contains(k)) {
            debug!(%kind, value = %measurement, "Captured water reading");
            window.captured.insert(kind, measurement);
        }
    }

    fn collect_fast(&mut self) -> Result<()> {
        let mut batch = Batch::new(Cadence::Fast);
        let mut currents = Vec::with_capacity(FAST_KINDS.len());

        for (kind, measurement) in self.client.get_all(&FAST_KINDS)? {
            batch.record(kind, measurement.as_ref());
            currents.push(measurement.as_ref().and_then(current));
        }

        let usage = match currents[..] {
            [Some(solar), Some(house)] => Some(Reading::Decimal(house.minus(&solar))),
            _ => None,
        };
        batch.insert(USAGE_CURRENT, usage);

        self.emit(batch)
    }

    fn collect_slow(&mut self) -> Result<()> {
        let mut batch = Batch::new(Cadence::Slow);
        for (kind, measurement) in self.client.get_all(&SLOW_KINDS)? {
            batch.record(kind, measurement.as_ref());
        }
        self.emit(batch)
    }

    fn step_water(&mut self) -> Result<()> {
        let now = self.clock.now();

        if self.water.is_none() && self.due(self.last_water, self.config.water_interval) {
            info!(window = ?self.config.water_window, "Opening water window");
            self.last_water = now;
            self.water = Some(WaterWindow::open(now));
        }

        let (opened_at, last_prompt) = match &self.water {
            Some(window) => (window.opened_at, window.last_prompt),
            None => return Ok(()),
        };

        if now.saturating_sub(opened_at) >= self.config.water_window {
            if let Some(window) = self.water.take() {
                let mut batch = Batch::new(Cadence::Water);
                for kind in WATER_KINDS {
                    batch.record(kind, window.captured.get(&kind));
                }
                info!("Closing water window");
                self.emit(batch)?;
            }
            return Ok(());
        }

        let prompt_due = last_prompt
            .map_or(true, |at| now.saturating_sub(at) >= self.config.water_keepalive);
        if prompt_due {
            for kind in WATER_KINDS {
                self.client.request(kind)?;
            }
            if let Some(window) = &mut self.water {
                window.last_prompt = Some(now);
            }
        }

        Ok(())
    }

    fn emit(&mut self, batch: Batch) -> Result<()> {
        info!(batch = %batch, "Batch complete");
        self.sink.emit(batch)
    }

    /// The polling client
    pub fn client(&self) -> &PollingClient<T> {
        &self.client
    }

    /// The batch consumer
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn current(measurement: &Measurement) -> Option<Scaled> {
    match measurement {
        Measurement::SolarCurrent(v) | Measurement::HouseCurrent(v) => Some(*v),
        _ => None,
    }
}
