//! Time abstraction.
//!
//! Every use-case that reasons about expiry, lockout windows, or TTLs takes a
//! `Clock` rather than calling `Utc::now()` directly, so tests can freeze time
//! deterministically (the teacher's `ports::Clock` pattern).

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Deterministic clock for tests. Advance it explicitly with `advance`.
    pub struct FakeClock {
        current: Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                current: Mutex::new(start),
            }
        }

        pub fn advance(&self, delta: chrono::Duration) {
            let mut guard = self.current.lock().unwrap();
            *guard += delta;
        }

        pub fn set(&self, at: DateTime<Utc>) {
            *self.current.lock().unwrap() = at;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.current.lock().unwrap()
        }
    }
}
