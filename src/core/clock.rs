use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic time source used by the polling client, the watchdog and the scheduler
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Suspends the caller for `duration`
    fn sleep(&self, duration: Duration);
}

/// Clock handle shared between the components driving one bus
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }

    /// Creates a shareable handle
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Settable clock; `sleep` advances it instantly
///
/// Clones share the same time, so a test can hold one handle and hand
/// another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Creates a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Jumps to an absolute time
    pub fn set(&self, now: Duration) {
        *self.lock() = now;
    }

    /// Moves time forward
    pub fn advance(&self, by: Duration) {
        *self.lock() += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Duration> {
        // A poisoned lock still holds a valid Duration.
        self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
