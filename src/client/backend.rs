//! Client for the monitored backend's JSON-RPC query API.
//!
//! Only three calls are used: `user.login` for a bearer token,
//! `apiinfo.version`, and `host.get` for the entity count. The token lives
//! for one attempt and is never stored.

use crate::client::authority::build_client;
use crate::client::user_agent;
use crate::config::{BackendCredentials, LicenseGateConfig};
use crate::protocol::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::protocol::models::UsageSnapshot;
use crate::usage::UsageSource;
use crate::LicenseGateError;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde_json::{json, Value};

/// JSON-RPC client for the backend query API.
#[derive(Debug, Clone)]
pub struct BackendApiClient {
    client: Client,
    endpoint: String,
    credentials: BackendCredentials,
}

impl BackendApiClient {
    /// Create a backend client from config.
    pub fn new(config: &LicenseGateConfig) -> Result<Self, LicenseGateError> {
        let client = build_client(config.authority_timeout())?;
        let endpoint = format!(
            "{}/{}",
            config.backend_base_url.trim_end_matches('/'),
            config.backend_api_path.trim_start_matches('/')
        );

        Ok(Self {
            client,
            endpoint,
            credentials: config.backend_credentials.clone(),
        })
    }

    /// Full JSON-RPC endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        id: u64,
        token: Option<&str>,
    ) -> Result<Value, LicenseGateError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, user_agent())
            .json(&JsonRpcRequest::new(method, params, id));
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            LicenseGateError::BackendUnreachable(format!("{} request failed: {}", method, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LicenseGateError::BackendUnreachable(format!(
                "{} answered HTTP {}",
                method,
                status.as_u16()
            )));
        }

        let envelope: JsonRpcResponse = response.json().await.map_err(|e| {
            LicenseGateError::BackendUnreachable(format!("{} returned bad JSON: {}", method, e))
        })?;
        envelope.into_result(method)
    }

    /// Log in and return a bearer token.
    pub async fn login(&self) -> Result<String, LicenseGateError> {
        let result = self
            .call(
                "user.login",
                json!({
                    "username": self.credentials.username,
                    "password": self.credentials.password,
                }),
                1,
                None,
            )
            .await?;

        match result {
            Value::String(token) if !token.is_empty() => Ok(token),
            other => Err(LicenseGateError::BackendUnreachable(format!(
                "user.login returned no token: {}",
                other
            ))),
        }
    }

    /// Backend version string (no authentication required).
    pub async fn version(&self) -> Result<String, LicenseGateError> {
        match self.call("apiinfo.version", json!({}), 2, None).await? {
            Value::String(version) if !version.is_empty() => Ok(version),
            other => Err(LicenseGateError::BackendUnreachable(format!(
                "apiinfo.version returned {}",
                other
            ))),
        }
    }

    /// Number of monitored hosts.
    pub async fn entity_count(&self, token: &str) -> Result<u64, LicenseGateError> {
        let result = self
            .call("host.get", json!({ "output": ["hostid"] }), 3, Some(token))
            .await?;

        result
            .as_array()
            .map(|hosts| hosts.len() as u64)
            .ok_or_else(|| {
                LicenseGateError::BackendUnreachable("host.get did not return a list".to_string())
            })
    }
}

#[async_trait]
impl UsageSource for BackendApiClient {
    async fn query(&self) -> Result<UsageSnapshot, LicenseGateError> {
        let token = self.login().await?;
        let backend_version = self.version().await?;
        let entity_count = self.entity_count(&token).await?;

        Ok(UsageSnapshot {
            backend_version,
            entity_count,
        })
    }
}
