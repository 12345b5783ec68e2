use chrono::{DateTime, Duration, Utc};

/// Time source for the round engine and the services that drive it.
///
/// Rounds never schedule anything; every timeout is derived from the clock
/// reading taken when a request arrives, so tests pin it with `Clock::Fixed`.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that reads the system time.
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    /// Returns a clock pinned at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Move a fixed clock forward. No effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns a copy of this clock moved forward by `delta`.
    #[must_use]
    pub fn advanced(mut self, delta: Duration) -> Self {
        self.advance(delta);
        self
    }
}

/// Time elapsed from `since` to `now`, truncated to whole seconds.
///
/// A `since` in the future (clock skew between writers) counts as zero.
#[must_use]
pub fn elapsed_whole_seconds(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let secs = (now - since).num_seconds().max(0);
    Duration::seconds(secs)
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` pinned at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = fixed_clock().advanced(Duration::seconds(33));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(33));
    }

    #[test]
    fn system_clock_ignores_advance() {
        let mut clock = Clock::system();
        clock.advance(Duration::days(365));
        assert!(clock.now() <= Utc::now());
    }

    #[test]
    fn elapsed_truncates_and_clamps() {
        let t0 = fixed_now();
        assert_eq!(
            elapsed_whole_seconds(t0, t0 + Duration::milliseconds(32_900)),
            Duration::seconds(32)
        );
        assert_eq!(
            elapsed_whole_seconds(t0 + Duration::seconds(5), t0),
            Duration::zero()
        );
    }
}
