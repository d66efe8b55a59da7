//! Reqwest-based HTTP client for the licensing authority.
//!
//! This module only moves bytes: it captures status, content type, and body
//! of `check-license`, and posts usage reports. Interpreting the verdict is
//! the validator's job.

use crate::client::user_agent;
use crate::config::{LicenseGateConfig, UsageFieldNames};
use crate::protocol::models::UsageReport;
use crate::LicenseGateError;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response, Url};
use std::time::Duration;

/// HTTP response with captured headers and body.
#[derive(Debug)]
pub struct AuthorityResponse {
    /// HTTP status code.
    pub status: u16,

    /// Content-Type header value.
    pub content_type: Option<String>,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl AuthorityResponse {
    async fn from_response(response: Response) -> Result<Self, LicenseGateError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                LicenseGateError::AuthorityUnreachable(format!("Failed to read body: {}", e))
            })?
            .to_vec();

        Ok(Self {
            status,
            content_type,
            body,
        })
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the content type is absent or some flavor of JSON.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("json"))
    }
}

/// Licensing authority HTTP client.
#[derive(Debug, Clone)]
pub struct AuthorityClient {
    client: Client,
    base_url: Url,
    usage_segments: Vec<String>,
    usage_field_names: UsageFieldNames,
}

impl AuthorityClient {
    /// Create a new authority client from config.
    pub fn new(config: &LicenseGateConfig) -> Result<Self, LicenseGateError> {
        let base_url = Url::parse(config.authority_base_url.trim()).map_err(|e| {
            LicenseGateError::ConfigError(format!(
                "authority_base_url {:?} is not a URL: {}",
                config.authority_base_url, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(LicenseGateError::ConfigError(format!(
                "authority_base_url {:?} cannot be a base URL",
                config.authority_base_url
            )));
        }

        let client = build_client(config.authority_timeout())?;

        let usage_segments = config
            .usage_path
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            client,
            base_url,
            usage_segments,
            usage_field_names: config.usage_field_names,
        })
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url, LicenseGateError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LicenseGateError::ConfigError("authority URL has no path".to_string()))?
            .pop_if_empty()
            .extend(segments.iter().map(AsRef::as_ref));
        Ok(url)
    }

    /// `GET {base}/check-license/{license_key}`.
    pub async fn check_license(
        &self,
        license_key: &str,
    ) -> Result<AuthorityResponse, LicenseGateError> {
        let url = self.endpoint(&["check-license", license_key])?;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| LicenseGateError::AuthorityUnreachable(format!("Request failed: {}", e)))?;

        AuthorityResponse::from_response(response).await
    }

    /// `POST {base}/{usage_path}` with the report as JSON.
    pub async fn report_usage(&self, report: &UsageReport) -> Result<(), LicenseGateError> {
        let url = self.endpoint(self.usage_segments.as_slice())?;

        let response = self
            .client
            .post(url)
            .header(USER_AGENT, user_agent())
            .json(&report.to_json(self.usage_field_names))
            .send()
            .await
            .map_err(|e| LicenseGateError::UsageReportFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LicenseGateError::UsageReportFailed(format!(
                "authority answered {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

/// Build a reqwest client with a bounded request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, LicenseGateError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LicenseGateError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}
