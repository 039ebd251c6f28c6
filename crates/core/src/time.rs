use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// A clock abstraction for deterministic time in the tracker and in tests.
///
/// `Manual` shares its instant between clones, so a test can keep one handle
/// and advance the time observed by a tracker that owns another.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
    Manual(Arc<Mutex<DateTime<Utc>>>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns a shared clock starting at the given timestamp.
    #[must_use]
    pub fn manual(at: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(Mutex::new(at)))
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
            Clock::Manual(shared) => *shared.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Advance a fixed or manual clock by the given duration.
    ///
    /// Advancing a `Manual` clock is visible through every clone of it.
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::Default => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Manual(shared) => {
                *shared.lock().unwrap_or_else(PoisonError::into_inner) += delta;
            }
        }
    }

    /// Returns true if this clock represents real time.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Clock::Default)
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

/// Returns a shared, advanceable `Clock` starting at the deterministic test timestamp.
#[must_use]
pub fn manual_clock() -> Clock {
    Clock::manual(fixed_now())
}
