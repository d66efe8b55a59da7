//! Licensing authority request and response structs.

use crate::config::UsageFieldNames;
use crate::LicenseGateError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// Raw `check-license` response body.
///
/// `valid` stays optional so that a body without it decodes and is then
/// treated as not valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckLicenseResponse {
    /// Validity flag.
    #[serde(default)]
    pub valid: Option<bool>,
    /// Expiry date as sent by the authority.
    #[serde(default)]
    pub expiry_date: Option<String>,
    /// Customer identifier.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Human-readable status message.
    #[serde(default)]
    pub message: Option<String>,
}

impl CheckLicenseResponse {
    /// Whether the body literally says `"valid": true`.
    pub fn is_valid(&self) -> bool {
        self.valid == Some(true)
    }

    /// Parsed expiry date, if present and understood.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry_date.as_deref().and_then(parse_expiry)
    }
}

/// Parse raw JSON body into a `check-license` response.
pub fn parse_check_license_response(body: &[u8]) -> Result<CheckLicenseResponse, LicenseGateError> {
    serde_json::from_slice(body).map_err(|e| {
        LicenseGateError::AuthorityInvalidResponse(format!(
            "Failed to parse check-license response: {}",
            e
        ))
    })
}

/// Parse an authority expiry date: RFC 3339, or `YYYY-MM-DD` at midnight UTC.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Facts read from the monitored backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSnapshot {
    /// Backend version string.
    pub backend_version: String,

    /// Number of monitored entities.
    pub entity_count: u64,
}

impl Default for UsageSnapshot {
    fn default() -> Self {
        Self {
            backend_version: "unknown".to_string(),
            entity_count: 0,
        }
    }
}

/// Usage telemetry posted to the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    /// License key from the credential file.
    pub license_key: String,
    /// Instance id from the credential file.
    pub instance_id: String,
    /// Backend version from the latest snapshot.
    pub backend_version: String,
    /// Entity count from the latest snapshot.
    pub entity_count: u64,
}

impl UsageReport {
    /// JSON body using the requested field names.
    pub fn to_json(&self, names: UsageFieldNames) -> serde_json::Value {
        match names {
            UsageFieldNames::Generic => serde_json::json!({
                "licenseKey": self.license_key,
                "instanceId": self.instance_id,
                "backendVersion": self.backend_version,
                "entityCount": self.entity_count,
            }),
            UsageFieldNames::Zabbix => serde_json::json!({
                "licenseKey": self.license_key,
                "instanceId": self.instance_id,
                "zabbixVersion": self.backend_version,
                "totalHosts": self.entity_count,
            }),
        }
    }
}
