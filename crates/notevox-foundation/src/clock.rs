//! Clock abstraction so elapsed-time accounting and silence debouncing can
//! run against virtual time in tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source for the capture session.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock implementation used in production.
#[derive(Default)]
pub struct RealClock;

impl RealClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Virtual clock advanced manually by tests.
pub struct TestClock {
    current: Mutex<Instant>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Instant::now()),
        }
    }

    /// Advance the virtual clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }
}

/// Clock handle shared between the session and its poll thread.
pub type SharedClock = Arc<dyn Clock>;

pub fn real_clock() -> SharedClock {
    Arc::new(RealClock::new())
}

pub fn test_clock() -> Arc<TestClock> {
    Arc::new(TestClock::new())
}
