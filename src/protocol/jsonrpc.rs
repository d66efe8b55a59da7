//! JSON-RPC 2.0 envelope spoken by the backend query API.

use crate::LicenseGateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing JSON-RPC call.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Method name, e.g. `user.login`.
    pub method: &'a str,
    /// Method parameters.
    pub params: Value,
    /// Request id.
    pub id: u64,
}

impl<'a> JsonRpcRequest<'a> {
    /// Build a request for `method`.
    pub fn new(method: &'a str, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// Error member of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    #[serde(default)]
    pub code: i64,
    /// Short message.
    #[serde(default)]
    pub message: String,
    /// Extra detail, free-form.
    #[serde(default)]
    pub data: Option<Value>,
}

/// Incoming JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Call result on success.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Unwrap the result, turning an `error` member or a missing result into
    /// `BackendUnreachable`.
    pub fn into_result(self, method: &str) -> Result<Value, LicenseGateError> {
        if let Some(error) = self.error {
            let detail = error
                .data
                .as_ref()
                .and_then(Value::as_str)
                .map(|d| format!(" ({})", d))
                .unwrap_or_default();
            return Err(LicenseGateError::BackendUnreachable(format!(
                "{} failed: {} {}{}",
                method, error.code, error.message, detail
            )));
        }
        self.result.ok_or_else(|| {
            LicenseGateError::BackendUnreachable(format!("{} returned no result", method))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::new("apiinfo.version", serde_json::json!({}), 2);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "jsonrpc": "2.0",
                "method": "apiinfo.version",
                "params": {},
                "id": 2
            })
        );
    }

    #[test]
    fn test_result_extracted() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":"7.0.1","id":2}"#).unwrap();
        assert_eq!(
            response.into_result("apiinfo.version").unwrap(),
            Value::String("7.0.1".to_string())
        );
    }

    #[test]
    fn test_error_member_is_failure() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params.","data":"Incorrect user name or password."},"id":1}"#,
        )
        .unwrap();
        let err = response.into_result("user.login").unwrap_err();
        assert!(matches!(err, LicenseGateError::BackendUnreachable(_)));
        assert!(err.to_string().contains("Incorrect user name or password."));
    }

    #[test]
    fn test_missing_result_is_failure() {
        let response: JsonRpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":3}"#).unwrap();
        assert!(response.into_result("host.get").is_err());
    }
}
