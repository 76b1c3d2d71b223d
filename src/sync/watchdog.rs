use std::time::Duration;

use crate::core::{Error, Result, SharedClock};

/// Deadline rearmed by every valid frame
///
/// Checked cooperatively by the synchronizer between reads. Expiry is fatal:
/// a wedged line is recovered by restarting the process, not by retrying.
pub struct Watchdog {
    /// Allowed silence
    timeout: Duration,
    /// Clock reading at the last valid frame
    last_fed: Duration,
    /// Time source
    clock: SharedClock,
}

impl Watchdog {
    /// Arms a watchdog starting now
    pub fn new(clock: SharedClock, timeout: Duration) -> Self {
        let last_fed = clock.now();
        Watchdog {
            timeout,
            last_fed,
            clock,
        }
    }

    /// Rearms the deadline
    pub fn feed(&mut self) {
        self.last_fed = self.clock.now();
    }

    /// Time since the last feed
    pub fn idle(&self) -> Duration {
        self.clock.now().saturating_sub(self.last_fed)
    }

    /// Fails once the allowed silence is used up
    pub fn check(&self) -> Result<()> {
        let idle = self.idle();
        if idle >= self.timeout {
            return Err(Error::WatchdogExpired { idle });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("timeout", &self.timeout)
            .field("last_fed", &self.last_fed)
            .finish_non_exhaustive()
    }
}
