/*!
Wall-clock sources for the scheduler.

The scheduler only ever asks "what time is it now", as a monotonic offset from
an arbitrary origin. `StdHostClock` reads `Instant`; `FakeHostClock` is moved
by hand and is shared between clones, so a test (or a host replaying a
recording) can keep one copy and give the other to the scheduler.
*/

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub trait HostClock {
    /// Monotonic time since the clock's origin.
    fn now(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct StdHostClock {
    origin: Instant,
}

impl StdHostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for StdHostClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct FakeHostClock {
    now: Rc<Cell<Duration>>,
}

impl FakeHostClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl HostClock for FakeHostClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
