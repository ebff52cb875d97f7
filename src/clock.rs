//! Clock abstraction so timers and streak detection are testable.
//!
//! Production code uses `SystemClock`; tests use `FixedClock`, which hands
//! out a shared handle so a test can advance time between engine calls.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};

/// Source of the current wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as epoch milliseconds.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Real wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to an explicit instant, shared through a cloneable handle.
#[derive(Clone)]
pub struct FixedClock {
    ms: Rc<Cell<i64>>,
}

impl FixedClock {
    pub fn new(ms: i64) -> Self {
        FixedClock {
            ms: Rc::new(Cell::new(ms)),
        }
    }

    pub fn set_ms(&self, ms: i64) {
        self.ms.set(ms);
    }

    pub fn advance_ms(&self, delta: i64) {
        self.ms.set(self.ms.get() + delta);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.ms.get())
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn now_ms(&self) -> i64 {
        self.ms.get()
    }
}
