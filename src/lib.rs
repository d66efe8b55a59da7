//! # Licensegate
//!
//! **License-compliance control plane for a self-hosted monitoring stack.**
//!
//! Two long-running components share one license verdict:
//!
//! - **Agent** - periodically proves the license with the remote authority,
//!   keeps the monitoring backend running only while it holds, and reports
//!   usage (backend version, monitored host count).
//! - **Gateway** - a reverse proxy in front of the web UI that confirms the
//!   license on every request and serves a denial page otherwise.
//!
//! ## Quickstart
//!
//! ```no_run
//! use licensegate::{Agent, LicenseGateConfig};
//!
//! # async fn run() -> Result<(), licensegate::LicenseGateError> {
//! let config = LicenseGateConfig {
//!     authority_base_url: "https://licensing.example.com/backend_api".to_string(),
//!     ..Default::default()
//! };
//!
//! let agent = Agent::from_config(&config)?;
//! // Only returns when the license can no longer be proven.
//! let err = agent.run().await.unwrap_err();
//! eprintln!("agent stopped: {}", err);
//! # Ok(())
//! # }
//! ```
//!
//! ## Fail-closed
//!
//! A license is valid only when the authority answers 2xx with
//! `"valid": true`. A missing or malformed license file, an unreachable
//! authority or any other answer stops the backend (Agent) or denies the
//! request (Gateway).
//!
//! See [`LicenseGateConfig`] for all settings.

#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Cache layer
pub mod cache;

// Licensing
pub mod store;
pub mod validator;

// Backend control and telemetry
pub mod lifecycle;
pub mod usage;

// Components
pub mod agent;
pub mod gateway;

#[cfg(test)]
mod testing;

// Re-exports for public API
pub use agent::{Agent, AgentState};
pub use clock::{Clock, SystemClock};
pub use config::{BackendCredentials, LicenseGateConfig, LifecycleKind, UsageFieldNames};
pub use errors::LicenseGateError;
pub use gateway::{DenialPage, Gateway, UpstreamProxy};
pub use lifecycle::{
    BackendLifecycle, DockerLifecycle, LifecycleAction, LifecycleController, NoopLifecycle,
};
pub use protocol::models::{UsageReport, UsageSnapshot};
pub use store::{parse_credential, Credential, LicenseStore};
pub use usage::{UsageCollector, UsageSource};
pub use validator::{LicenseValidator, ValidationResult};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
#[cfg(any(test, feature = "test-seams"))]
pub use lifecycle::RecordingLifecycle;
