use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

//
// ─── PHASE TIMER ───────────────────────────────────────────────────────────────
//

/// Wall-clock budget for a single test phase.
///
/// The timer is informational: expiry is reported, never enforced by
/// auto-submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimer {
    started_at: DateTime<Utc>,
    limit: Duration,
}

impl PhaseTimer {
    /// Both phases run for thirty minutes.
    pub const PHASE_LIMIT_MINUTES: i64 = 30;

    #[must_use]
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self::with_limit(started_at, Duration::minutes(Self::PHASE_LIMIT_MINUTES))
    }

    #[must_use]
    pub fn with_limit(started_at: DateTime<Utc>, limit: Duration) -> Self {
        Self { started_at, limit }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.started_at + self.limit
    }

    /// Time left before the deadline, clamped at zero.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.deadline() - now;
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left
        }
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_counts_down_and_clamps() {
        let start = fixed_now();
        let timer = PhaseTimer::start(start);

        assert_eq!(timer.remaining(start), Duration::minutes(30));
        assert_eq!(
            timer.remaining(start + Duration::minutes(12)),
            Duration::minutes(18)
        );
        assert_eq!(timer.remaining(start + Duration::hours(2)), Duration::zero());
        assert_eq!(timer.deadline(), start + Duration::minutes(30));
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(90));
    }
}
