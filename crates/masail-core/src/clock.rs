//! Time source for event timestamps and document audit fields.

use chrono::{DateTime, Utc};

/// Supplies the instant stamped on recorded events.
///
/// Document aggregates take `created_at` and `updated_at` from the events
/// they apply, so swapping the clock makes whole command sequences
/// reproducible in tests.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used by the server.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
