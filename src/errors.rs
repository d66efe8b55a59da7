//! Licensegate error types.

use thiserror::Error;

/// Errors that can occur while validating, gating, or reporting.
#[derive(Debug, Error)]
pub enum LicenseGateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The license file does not exist or cannot be read.
    #[error("License file not found: {0}")]
    CredentialMissing(String),

    /// The license file does not hold a key and an instance id.
    #[error("License file malformed: {0}")]
    CredentialMalformed(String),

    /// The licensing authority could not be reached (connect, timeout, body read).
    #[error("Licensing authority unreachable: {0}")]
    AuthorityUnreachable(String),

    /// The licensing authority answered with something other than JSON.
    #[error("Licensing authority returned an invalid response: {0}")]
    AuthorityInvalidResponse(String),

    /// The authority did not confirm the license as valid.
    #[error("Invalid or expired license (status {status})")]
    LicenseInvalid {
        /// HTTP status returned by the authority.
        status: u16,
        /// Optional message from the authority.
        message: Option<String>,
    },

    /// Posting usage telemetry failed.
    #[error("Usage report failed: {0}")]
    UsageReportFailed(String),

    /// The monitored backend's query API could not be used.
    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    /// Starting, stopping, or querying the backend failed.
    #[error("Lifecycle control failed: {0}")]
    LifecycleControlFailed(String),

    /// Gateway listener or server I/O failed.
    #[error("Gateway I/O error: {0}")]
    GatewayIo(String),
}

impl LicenseGateError {
    /// Whether this error means the license could not be proven valid.
    ///
    /// Every such error is handled the same way: the Agent stops the backend
    /// and terminates, the Gateway denies the request.
    pub fn is_license_failure(&self) -> bool {
        matches!(
            self,
            Self::CredentialMissing(_)
                | Self::CredentialMalformed(_)
                | Self::AuthorityUnreachable(_)
                | Self::AuthorityInvalidResponse(_)
                | Self::LicenseInvalid { .. }
        )
    }
}
