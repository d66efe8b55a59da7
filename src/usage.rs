//! Usage Collector.
//!
//! Reads the backend's version and entity count with bounded retry. While
//! the backend boots these calls can fail for a while; that is never a
//! license problem, so [`UsageCollector::collect`] cannot fail and falls back
//! to [`UsageSnapshot::default`].

use crate::clock::Clock;
use crate::protocol::models::UsageSnapshot;
use crate::LicenseGateError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One complete read of the backend's usage facts.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Authenticate, read the version, read the entity count.
    async fn query(&self) -> Result<UsageSnapshot, LicenseGateError>;
}

/// Bounded-retry wrapper around a [`UsageSource`].
pub struct UsageCollector {
    source: Arc<dyn UsageSource>,
    clock: Arc<dyn Clock>,
    retries: u32,
    retry_delay: Duration,
}

impl UsageCollector {
    /// Create a collector making at most `retries` attempts.
    pub fn new(
        source: Arc<dyn UsageSource>,
        clock: Arc<dyn Clock>,
        retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            source,
            clock,
            retries: retries.max(1),
            retry_delay,
        }
    }

    /// Collect a snapshot, never failing.
    pub async fn collect(&self) -> UsageSnapshot {
        for attempt in 1..=self.retries {
            match self.source.query().await {
                Ok(snapshot) => {
                    debug!(attempt, "Usage collected");
                    return snapshot;
                }
                Err(e) => {
                    warn!(attempt, retries = self.retries, error = %e, "Usage collection attempt failed");
                    if attempt < self.retries {
                        self.clock.sleep(self.retry_delay).await;
                    }
                }
            }
        }

        warn!(retries = self.retries, "Usage collection gave up, reporting defaults");
        UsageSnapshot::default()
    }
}
