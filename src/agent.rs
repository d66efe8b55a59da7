//! Agent Loop.
//!
//! ```text
//! Startup --(startup delay)--> Checking --(license ok)--> Serving
//!                                 |   ^                      |
//!                                 |   +--(check interval)----+
//!                                 +--(license not proven)--> Terminated
//! ```
//!
//! A cycle reads the credential, confirms it with the authority, brings the
//! backend up, collects usage and reports it. Any failure to prove the
//! license stops the backend and ends the run; there is no retry on an
//! invalid license.

use crate::cache::verdict::key_fingerprint;
use crate::client::backend::BackendApiClient;
use crate::clock::{Clock, SystemClock};
use crate::config::{LicenseGateConfig, LifecycleKind};
use crate::lifecycle::{BackendLifecycle, DockerLifecycle, LifecycleController, NoopLifecycle};
use crate::protocol::models::UsageReport;
use crate::store::LicenseStore;
use crate::usage::{UsageCollector, UsageSource};
use crate::validator::{LicenseValidator, ValidationResult};
use crate::LicenseGateError;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Agent states.
#[derive(Debug)]
pub enum AgentState {
    /// Waiting for the backend to initialize.
    Startup,
    /// Running one validation cycle.
    Checking,
    /// License valid, sleeping until the next check.
    Serving,
    /// License could not be proven; the run is over.
    Terminated(LicenseGateError),
}

/// Periodic license validation, lifecycle control, and usage reporting.
pub struct Agent {
    store: LicenseStore,
    validator: LicenseValidator,
    lifecycle: BackendLifecycle,
    collector: UsageCollector,
    clock: Arc<dyn Clock>,
    startup_delay: Duration,
    check_interval: Duration,
}

impl Agent {
    /// Build an Agent with explicit collaborators.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(
        config: &LicenseGateConfig,
        controller: Arc<dyn LifecycleController>,
        usage_source: Arc<dyn UsageSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LicenseGateError> {
        config.validate()?;

        Ok(Self {
            store: LicenseStore::new(config.license_file_path.clone()),
            validator: LicenseValidator::new(config)?,
            lifecycle: BackendLifecycle::new(controller),
            collector: UsageCollector::new(
                usage_source,
                clock.clone(),
                config.retry_count,
                config.retry_delay(),
            ),
            clock,
            startup_delay: config.startup_delay(),
            check_interval: config.check_interval(),
        })
    }

    /// Build an Agent wired to the real backend API, lifecycle, and clock.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn from_config(config: &LicenseGateConfig) -> Result<Self, LicenseGateError> {
        let controller: Arc<dyn LifecycleController> = match config.lifecycle {
            LifecycleKind::Docker => Arc::new(DockerLifecycle::with_binary(
                config.docker_binary.clone(),
                config.backend_instance.clone(),
            )),
            LifecycleKind::None => Arc::new(NoopLifecycle::default()),
        };
        let usage_source = Arc::new(BackendApiClient::new(config)?);

        Self::new(config, controller, usage_source, Arc::new(SystemClock))
    }

    /// Run one `Checking` pass.
    ///
    /// On success the backend is running and the returned report has been
    /// offered to the authority (delivery is best-effort).
    ///
    /// # Errors
    /// Any license failure; the backend has been asked to stop.
    pub async fn run_cycle(&self) -> Result<UsageReport, LicenseGateError> {
        let credential = match self.store.read().await {
            Ok(credential) => credential,
            Err(e) => return Err(self.fail(e).await),
        };

        let verdict = match self.validator.confirm(&credential.license_key).await {
            Ok(verdict) => verdict,
            Err(e) => return Err(self.fail(e).await),
        };
        self.log_verdict(&credential.license_key, &verdict);

        self.lifecycle.ensure(true).await;

        let snapshot = self.collector.collect().await;
        info!(
            backend_version = %snapshot.backend_version,
            entity_count = snapshot.entity_count,
            "Usage collected"
        );

        let report = UsageReport {
            license_key: credential.license_key,
            instance_id: credential.instance_id,
            backend_version: snapshot.backend_version,
            entity_count: snapshot.entity_count,
        };
        match self.validator.report_usage(&report).await {
            Ok(()) => info!("Usage reported"),
            Err(e) => warn!(error = %e, "Failed to report usage"),
        }

        Ok(report)
    }

    /// Run until the license can no longer be proven valid.
    ///
    /// Only ever returns the terminal error.
    pub async fn run(&self) -> Result<Infallible, LicenseGateError> {
        info!(
            startup_delay_secs = self.startup_delay.as_secs(),
            check_interval_secs = self.check_interval.as_secs(),
            "License agent started"
        );

        let mut state = AgentState::Startup;
        loop {
            state = match state {
                AgentState::Startup => {
                    self.clock.sleep(self.startup_delay).await;
                    AgentState::Checking
                }
                AgentState::Checking => match self.run_cycle().await {
                    Ok(_) => AgentState::Serving,
                    Err(e) => AgentState::Terminated(e),
                },
                AgentState::Serving => {
                    self.clock.sleep(self.check_interval).await;
                    AgentState::Checking
                }
                AgentState::Terminated(e) => return Err(e),
            };
        }
    }

    async fn fail(&self, e: LicenseGateError) -> LicenseGateError {
        error!(error = %e, "License check failed, stopping backend");
        self.lifecycle.ensure(false).await;
        e
    }

    fn log_verdict(&self, license_key: &str, verdict: &ValidationResult) {
        let days_left = verdict
            .expiry
            .map(|expiry| (expiry - self.clock.now_utc()).num_days());
        info!(
            key = %key_fingerprint(license_key),
            client_id = verdict.client_id.as_deref().unwrap_or("-"),
            days_left,
            "License valid"
        );
    }
}
