//! Deterministic clock abstraction for testable time-dependent logic.
//!
//! Every timed wait in the Agent and the Usage Collector goes through
//! [`Clock::sleep`], so tests can run a full cycle without real delays.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Clock trait for deterministic time in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Mock clock for deterministic testing.
///
/// `sleep` returns immediately, advances the clock, and records the duration.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    now: std::sync::Mutex<DateTime<Utc>>,
    sleeps: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
            sleeps: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().expect("mock clock lock");
        *now += duration;
    }

    /// Every duration passed to `sleep`, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("mock clock lock").clone()
    }
}

#[cfg(any(test, feature = "test-seams"))]
#[async_trait]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("mock clock lock")
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("mock clock lock").push(duration);
        if let Ok(step) = chrono::Duration::from_std(duration) {
            self.advance(step);
        }
        tokio::task::yield_now().await;
    }
}
