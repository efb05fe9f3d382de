//! `Clock` implementations.
//!
//! `SystemClock` is used in production. `FixedClock` and `StepClock` make
//! ledger timestamps deterministic in tests and demos.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::traits::Clock;

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Returns `start`, then `start + step`, `start + 2*step`, ...
///
/// Useful when records must have distinct, strictly increasing timestamps.
#[derive(Debug)]
pub struct StepClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl StepClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }

    /// One tick per second, starting at `start`.
    pub fn per_second(start: DateTime<Utc>) -> Self {
        Self::new(start, Duration::seconds(1))
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        // A poisoned lock still holds a valid instant.
        let mut next = match self.next.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = *next;
        *next = current + self.step;
        current
    }
}
