//! Licensegate configuration.
//!
//! One [`LicenseGateConfig`] is loaded per process (from TOML, every field
//! defaulted) and handed to each component at construction.

use crate::LicenseGateError;
use axum::http::Uri;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Login credentials for the monitored backend's query API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCredentials {
    /// Backend API user.
    pub username: String,
    /// Backend API password.
    pub password: String,
}

impl Default for BackendCredentials {
    fn default() -> Self {
        Self {
            username: "Admin".to_string(),
            password: "zabbix".to_string(),
        }
    }
}

/// Which lifecycle controller the Agent drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    /// Docker CLI, keyed by container name.
    #[default]
    Docker,
    /// Never start or stop anything.
    None,
}

/// Field names used in the usage report body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageFieldNames {
    /// `backendVersion` / `entityCount`
    #[default]
    Generic,
    /// `zabbixVersion` / `totalHosts`
    Zabbix,
}

/// Configuration shared by the Agent and the Gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LicenseGateConfig {
    /// Base URL of the licensing authority (no trailing `/check-license`).
    pub authority_base_url: String,

    /// Base URL of the monitored backend's query API host.
    pub backend_base_url: String,

    /// Path of the JSON-RPC endpoint under `backend_base_url`.
    pub backend_api_path: String,

    /// Credentials for the backend query API.
    pub backend_credentials: BackendCredentials,

    /// Two-line license credential file.
    pub license_file_path: PathBuf,

    /// Pause between Agent cycles.
    pub check_interval_ms: u64,

    /// Pause before the Agent's first check.
    pub startup_delay_ms: u64,

    /// Usage collection attempts per cycle.
    pub retry_count: u32,

    /// Pause between failed usage collection attempts.
    pub retry_delay_ms: u64,

    /// Request timeout for authority and backend API calls.
    pub authority_timeout_ms: u64,

    /// Where the Gateway forwards licensed traffic.
    pub upstream_url: String,

    /// Time allowed for the upstream to produce response headers.
    pub upstream_timeout_ms: u64,

    /// Gateway listen address.
    pub listen_addr: String,

    /// Lifecycle controller used by the Agent.
    pub lifecycle: LifecycleKind,

    /// Backend instance (container) name.
    pub backend_instance: String,

    /// Docker CLI binary.
    pub docker_binary: String,

    /// Optional HTML file served on denial instead of the built-in page.
    pub denial_page_path: Option<PathBuf>,

    /// Reuse confirmed-valid verdicts for this long (0 disables).
    pub validation_cache_ttl_ms: u64,

    /// Field naming in usage reports.
    pub usage_field_names: UsageFieldNames,

    /// Usage endpoint path under `authority_base_url`.
    pub usage_path: String,
}

impl Default for LicenseGateConfig {
    fn default() -> Self {
        Self {
            authority_base_url: "http://localhost:8000/backend_api".to_string(),
            backend_base_url: "http://zabbix-web:8080".to_string(),
            backend_api_path: "/api_jsonrpc.php".to_string(),
            backend_credentials: BackendCredentials::default(),
            license_file_path: PathBuf::from("/app/license.lic"),
            check_interval_ms: 10 * 60 * 1000,
            startup_delay_ms: 60 * 1000,
            retry_count: 5,
            retry_delay_ms: 15 * 1000,
            authority_timeout_ms: 10 * 1000,
            upstream_url: "http://zabbix-web:8080".to_string(),
            upstream_timeout_ms: 30 * 1000,
            listen_addr: "0.0.0.0:3333".to_string(),
            lifecycle: LifecycleKind::Docker,
            backend_instance: "zabbix-server".to_string(),
            docker_binary: "docker".to_string(),
            denial_page_path: None,
            validation_cache_ttl_ms: 0,
            usage_field_names: UsageFieldNames::Generic,
            usage_path: "usage".to_string(),
        }
    }
}

impl LicenseGateConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, LicenseGateError> {
        toml::from_str(text)
            .map_err(|e| LicenseGateError::ConfigError(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, LicenseGateError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LicenseGateError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LicenseGateError> {
        if self.authority_base_url.trim().is_empty() {
            return Err(LicenseGateError::ConfigError(
                "authority_base_url cannot be empty".to_string(),
            ));
        }
        if self.backend_base_url.trim().is_empty() {
            return Err(LicenseGateError::ConfigError(
                "backend_base_url cannot be empty".to_string(),
            ));
        }
        if self.license_file_path.as_os_str().is_empty() {
            return Err(LicenseGateError::ConfigError(
                "license_file_path cannot be empty".to_string(),
            ));
        }
        if self.usage_path.trim_matches('/').trim().is_empty() {
            return Err(LicenseGateError::ConfigError(
                "usage_path cannot be empty".to_string(),
            ));
        }
        if self.retry_count == 0 {
            return Err(LicenseGateError::ConfigError(
                "retry_count must be at least 1".to_string(),
            ));
        }
        if self.authority_timeout_ms == 0 || self.upstream_timeout_ms == 0 {
            return Err(LicenseGateError::ConfigError(
                "timeouts must be non-zero".to_string(),
            ));
        }
        if self.lifecycle == LifecycleKind::Docker && self.backend_instance.trim().is_empty() {
            return Err(LicenseGateError::ConfigError(
                "backend_instance cannot be empty with docker lifecycle".to_string(),
            ));
        }
        self.listen_socket_addr()?;
        self.upstream_uri()?;
        Ok(())
    }

    /// Parsed Gateway listen address.
    pub fn listen_socket_addr(&self) -> Result<SocketAddr, LicenseGateError> {
        self.listen_addr.parse().map_err(|e| {
            LicenseGateError::ConfigError(format!(
                "listen_addr {:?} is not a socket address: {}",
                self.listen_addr, e
            ))
        })
    }

    /// Parsed upstream URL. Only plain `http` upstreams are supported.
    pub fn upstream_uri(&self) -> Result<Uri, LicenseGateError> {
        let uri: Uri = self.upstream_url.parse().map_err(|e| {
            LicenseGateError::ConfigError(format!(
                "upstream_url {:?} is not a URL: {}",
                self.upstream_url, e
            ))
        })?;
        if uri.scheme_str() != Some("http") || uri.authority().is_none() {
            return Err(LicenseGateError::ConfigError(format!(
                "upstream_url must be an absolute http:// URL, got {:?}",
                self.upstream_url
            )));
        }
        Ok(uri)
    }

    /// Agent inter-cycle sleep.
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Agent startup delay.
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Pause between usage collection attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Outbound API request timeout.
    pub fn authority_timeout(&self) -> Duration {
        Duration::from_millis(self.authority_timeout_ms)
    }

    /// Upstream response-header timeout.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Verdict cache TTL, `None` when caching is disabled.
    pub fn validation_cache_ttl(&self) -> Option<Duration> {
        (self.validation_cache_ttl_ms > 0)
            .then(|| Duration::from_millis(self.validation_cache_ttl_ms))
    }
}
