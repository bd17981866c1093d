//! Injectable wall-clock source.
//!
//! Stores should never call `Utc::now()` directly — threading a `Clock`
//! through keeps tests deterministic and keeps "no authoritative clock
//! beyond wall-clock timestamps" an explicit, swappable dependency rather
//! than a hidden global.

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
