//! Wall-clock abstraction so token expiry can be driven from tests.
//!
//! - `SystemClock`: delegates to `chrono::Utc::now`
//! - `MockClock`: returns a controllable timestamp

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Live implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock fixed at a given moment that only moves when told to.
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Start at a millisecond epoch timestamp; out-of-range values fall back to the epoch.
    pub fn at_millis(millis: i64) -> Self {
        let start = DateTime::<Utc>::from_timestamp_millis(millis)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::at(start)
    }

    pub fn advance(&self, by: Duration) {
        let mut current = match self.current.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        *current += by;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        let current = match self.current.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        *current
    }
}
