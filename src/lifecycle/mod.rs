//! Backend Lifecycle Controller.
//!
//! [`LifecycleController`] is the narrow capability (query, start, stop).
//! [`BackendLifecycle::ensure`] makes it idempotent: it re-queries the real
//! state every call and acts only on a mismatch. Failures are logged and
//! swallowed; the Agent's next cycle is the retry.

pub mod docker;

use crate::LicenseGateError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub use docker::DockerLifecycle;

/// Start/stop control over the monitored backend.
#[async_trait]
pub trait LifecycleController: Send + Sync {
    /// Whether the backend is currently running.
    async fn is_running(&self) -> Result<bool, LicenseGateError>;

    /// Start the backend.
    async fn start(&self) -> Result<(), LicenseGateError>;

    /// Stop the backend.
    async fn stop(&self) -> Result<(), LicenseGateError>;
}

/// What [`BackendLifecycle::try_ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Already in the requested state.
    Unchanged,
    /// Issued a start.
    Started,
    /// Issued a stop.
    Stopped,
}

/// Idempotent wrapper around a [`LifecycleController`].
#[derive(Clone)]
pub struct BackendLifecycle {
    controller: Arc<dyn LifecycleController>,
}

impl BackendLifecycle {
    /// Wrap a controller.
    pub fn new(controller: Arc<dyn LifecycleController>) -> Self {
        Self { controller }
    }

    /// Bring the backend to the requested state, reporting errors.
    pub async fn try_ensure(&self, should_run: bool) -> Result<LifecycleAction, LicenseGateError> {
        let running = self.controller.is_running().await?;
        match (should_run, running) {
            (true, true) | (false, false) => Ok(LifecycleAction::Unchanged),
            (true, false) => {
                self.controller.start().await?;
                Ok(LifecycleAction::Started)
            }
            (false, true) => {
                self.controller.stop().await?;
                Ok(LifecycleAction::Stopped)
            }
        }
    }

    /// Bring the backend to the requested state. Never fails.
    pub async fn ensure(&self, should_run: bool) {
        match self.try_ensure(should_run).await {
            Ok(LifecycleAction::Unchanged) => {}
            Ok(LifecycleAction::Started) => info!("Backend started"),
            Ok(LifecycleAction::Stopped) => info!("Backend stopped"),
            Err(e) => warn!(should_run, error = %e, "Backend lifecycle control failed"),
        }
    }
}

/// Controller for deployments where something else owns the backend.
///
/// Remembers the requested state without touching any process.
#[derive(Debug)]
pub struct NoopLifecycle {
    intended: AtomicBool,
}

impl Default for NoopLifecycle {
    fn default() -> Self {
        Self {
            intended: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl LifecycleController for NoopLifecycle {
    async fn is_running(&self) -> Result<bool, LicenseGateError> {
        Ok(self.intended.load(Ordering::SeqCst))
    }

    async fn start(&self) -> Result<(), LicenseGateError> {
        self.intended.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), LicenseGateError> {
        self.intended.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory controller recording every operation.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    running: AtomicBool,
    starts: std::sync::atomic::AtomicUsize,
    stops: std::sync::atomic::AtomicUsize,
    failing: AtomicBool,
}

#[cfg(any(test, feature = "test-seams"))]
impl RecordingLifecycle {
    /// Create a controller whose backend starts in the given state.
    pub fn new(running: bool) -> Self {
        let lifecycle = Self::default();
        lifecycle.running.store(running, Ordering::SeqCst);
        lifecycle
    }

    /// Make every operation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Simulate an external start or stop.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Current simulated state.
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of start operations issued.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of stop operations issued.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), LicenseGateError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LicenseGateError::LifecycleControlFailed(
                "simulated failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-seams"))]
#[async_trait]
impl LifecycleController for RecordingLifecycle {
    async fn is_running(&self) -> Result<bool, LicenseGateError> {
        self.check()?;
        Ok(self.running())
    }

    async fn start(&self) -> Result<(), LicenseGateError> {
        self.check()?;
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.set_running(true);
        Ok(())
    }

    async fn stop(&self) -> Result<(), LicenseGateError> {
        self.check()?;
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.set_running(false);
        Ok(())
    }
}
