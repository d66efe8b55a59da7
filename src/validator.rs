//! License Validator - the verdict shared by the Agent and the Gateway.
//!
//! A license is valid only when the authority answers 2xx AND the body says
//! `"valid": true`. Everything else, including transport and parse failures,
//! means "not confirmed". Nothing is retried here; the caller's own cadence
//! is the retry.

use crate::cache::verdict::{key_fingerprint, VerdictCache};
use crate::client::authority::AuthorityClient;
use crate::clock::Clock;
use crate::config::LicenseGateConfig;
use crate::protocol::models::{parse_check_license_response, CheckLicenseResponse, UsageReport};
use crate::LicenseGateError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// License validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the license is valid.
    pub valid: bool,

    /// License expiry reported by the authority.
    pub expiry: Option<DateTime<Utc>>,

    /// Customer id reported by the authority.
    pub client_id: Option<String>,

    /// Status message reported by the authority.
    pub message: Option<String>,

    /// HTTP status of the `check-license` call.
    pub raw_status: u16,
}

impl ValidationResult {
    fn from_body(status: u16, success: bool, body: CheckLicenseResponse) -> Self {
        if body.expiry_date.is_some() && body.expiry().is_none() {
            warn!(expiry = ?body.expiry_date, "Unrecognized expiry date from authority");
        }
        Self {
            valid: success && body.is_valid(),
            expiry: body.expiry(),
            client_id: body.client_id,
            message: body.message,
            raw_status: status,
        }
    }
}

/// Validates license keys against the licensing authority.
pub struct LicenseValidator {
    client: AuthorityClient,
    cache: Option<VerdictCache>,
}

impl LicenseValidator {
    /// Create a validator without a verdict cache.
    ///
    /// # Errors
    /// Returns `ConfigError` if the authority URL is unusable or the HTTP
    /// client cannot be built.
    pub fn new(config: &LicenseGateConfig) -> Result<Self, LicenseGateError> {
        Ok(Self {
            client: AuthorityClient::new(config)?,
            cache: None,
        })
    }

    /// Reuse confirmed-valid verdicts for `ttl`.
    pub fn with_cache(mut self, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        self.cache = Some(VerdictCache::new(ttl, clock));
        self
    }

    /// Ask the authority about `license_key`.
    ///
    /// # Errors
    /// - `AuthorityUnreachable` - connect, timeout, or body read failure
    /// - `AuthorityInvalidResponse` - 2xx answer that is not JSON
    pub async fn validate(&self, license_key: &str) -> Result<ValidationResult, LicenseGateError> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(license_key)) {
            debug!(key = %key_fingerprint(license_key), "Using cached license verdict");
            return Ok(cached);
        }

        let response = self.client.check_license(license_key).await?;

        let result = if response.is_success() {
            if !response.is_json() {
                return Err(LicenseGateError::AuthorityInvalidResponse(format!(
                    "unexpected content type {:?}",
                    response.content_type.unwrap_or_default()
                )));
            }
            let body = parse_check_license_response(&response.body)?;
            ValidationResult::from_body(response.status, true, body)
        } else {
            // Non-success is a plain "invalid"; the body is only read for its message.
            let body = parse_check_license_response(&response.body).unwrap_or_default();
            ValidationResult::from_body(response.status, false, body)
        };

        debug!(
            key = %key_fingerprint(license_key),
            valid = result.valid,
            status = result.raw_status,
            "License checked"
        );

        if let Some(cache) = &self.cache {
            if result.valid {
                cache.insert(license_key, &result);
            } else {
                cache.invalidate(license_key);
            }
        }

        Ok(result)
    }

    /// Validate and require a positive verdict.
    ///
    /// # Errors
    /// Any `validate` error, or `LicenseInvalid` when the verdict is negative.
    pub async fn confirm(&self, license_key: &str) -> Result<ValidationResult, LicenseGateError> {
        let result = self.validate(license_key).await?;
        if !result.valid {
            return Err(LicenseGateError::LicenseInvalid {
                status: result.raw_status,
                message: result.message,
            });
        }
        Ok(result)
    }

    /// Post usage telemetry.
    ///
    /// Best-effort: callers log the error and carry on.
    pub async fn report_usage(&self, report: &UsageReport) -> Result<(), LicenseGateError> {
        self.client.report_usage(report).await
    }
}
