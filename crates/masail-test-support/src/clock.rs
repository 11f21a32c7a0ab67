//! Frozen `Clock` for tests that assert on event timestamps.

use chrono::{DateTime, Utc};
use masail_core::clock::Clock;

/// Returns the wrapped instant on every call, so every event recorded in a
/// test and every `created_at`/`updated_at` it feeds carries the same time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_fixed_clock_never_advances() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let clock = FixedClock(instant);

        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), clock.now());
    }
}
