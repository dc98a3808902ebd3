//! Time Provider Abstraction
//!
//! The store refreshes `Document::updated_at` on every write. To keep that
//! behavior testable without sleeps, the current time is obtained through a
//! trait object injected at store construction.
//!
//! # Examples
//!
//! ```rust
//! use inkdeck_core::models::time::{TimeProvider, SystemTimeProvider};
//! use chrono::Utc;
//!
//! let provider = SystemTimeProvider;
//! assert!(provider.now() <= Utc::now());
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Trait for providing current time
pub trait TimeProvider: Send + Sync {
    /// Get the current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// System clock provider, the production default
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for deterministic tests.
///
/// Unlike the system provider this one is mutable through `&self` (interior
/// mutex) so it can be advanced while shared behind an `Arc<dyn TimeProvider>`
/// already handed to the store.
///
/// Exposed outside `cfg(test)` so integration tests can use it.
#[derive(Debug)]
pub struct MockTimeProvider {
    current: Mutex<DateTime<Utc>>,
}

impl MockTimeProvider {
    /// Create a mock provider pinned to the given instant
    pub fn with_time(time: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(time),
        }
    }

    /// Advance the clock by `duration`
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap();
        *current = *current + duration;
    }

    /// Pin the clock to a specific instant
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.current.lock().unwrap() = time;
    }
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::with_time(Utc::now())
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_provider_tracks_clock() {
        let provider = SystemTimeProvider;
        let delta = Utc::now() - provider.now();
        assert!(delta.num_milliseconds().abs() < 1000);
    }

    #[test]
    fn test_mock_provider_is_deterministic() {
        let start = Utc::now();
        let provider = MockTimeProvider::with_time(start);

        assert_eq!(provider.now(), start);
        assert_eq!(provider.now(), start);

        provider.advance(Duration::seconds(30));
        assert_eq!(provider.now() - start, Duration::seconds(30));
    }

    #[test]
    fn test_mock_provider_set_time() {
        let provider = MockTimeProvider::default();
        let pinned = Utc::now() + Duration::hours(1);
        provider.set_time(pinned);
        assert_eq!(provider.now(), pinned);
    }
}
