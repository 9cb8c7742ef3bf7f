//! Time sources for file ages.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time.
    fn now(&self) -> SystemTime;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
///
/// Starts at the moment it is created, so ages computed against real file
/// modification times stay meaningful.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Create a clock frozen at the current system time.
    pub fn new() -> Self {
        Self::at(SystemTime::now())
    }

    /// Create a clock frozen at `time`.
    pub fn at(time: SystemTime) -> Self {
        Self {
            now: Mutex::new(time),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Jump to an absolute time.
    pub fn set(&self, time: SystemTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Age of something created at `created_at`, as seen at `now`.
///
/// Timestamps in the future (clock skew, coarse mtimes) count as age zero.
pub fn age(now: SystemTime, created_at: SystemTime) -> Duration {
    now.duration_since(created_at).unwrap_or(Duration::ZERO)
}
