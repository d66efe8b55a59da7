//! Stub licensing authority and backend servers for unit tests.
//!
//! Both bind `127.0.0.1:0` and run on the test's own runtime.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Canned `check-license` answer.
#[derive(Debug, Clone)]
pub struct AuthorityReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl AuthorityReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn html(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/html",
            body: body.to_string(),
        }
    }

    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

#[derive(Default)]
struct AuthorityRecord {
    checked_keys: Vec<String>,
    usage_reports: Vec<Value>,
    usage_paths: Vec<String>,
}

#[derive(Clone)]
struct AuthorityState {
    reply: Arc<Mutex<AuthorityReply>>,
    usage_status: Arc<Mutex<u16>>,
    record: Arc<Mutex<AuthorityRecord>>,
}

/// Handle for the stub authority.
pub struct AuthorityStub {
    /// Base URL to configure as `authority_base_url`.
    pub base_url: String,
    state: AuthorityState,
    join: tokio::task::JoinHandle<()>,
}

impl AuthorityStub {
    /// License keys seen by `check-license`, in order.
    pub fn checked_keys(&self) -> Vec<String> {
        self.state.record.lock().unwrap().checked_keys.clone()
    }

    /// Usage report bodies received, in order.
    pub fn usage_reports(&self) -> Vec<Value> {
        self.state.record.lock().unwrap().usage_reports.clone()
    }

    /// Paths usage reports were posted to, in order.
    pub fn usage_paths(&self) -> Vec<String> {
        self.state.record.lock().unwrap().usage_paths.clone()
    }

    /// Change the `check-license` answer.
    pub fn set_reply(&self, reply: AuthorityReply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    /// Change the status returned by `POST /usage`.
    pub fn set_usage_status(&self, status: u16) {
        *self.state.usage_status.lock().unwrap() = status;
    }
}

impl Drop for AuthorityStub {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn handle_check(State(state): State<AuthorityState>, Path(key): Path<String>) -> Response {
    state.record.lock().unwrap().checked_keys.push(key);
    let reply = state.reply.lock().unwrap().clone();
    reply.into_response()
}

async fn handle_usage(State(state): State<AuthorityState>, uri: Uri, body: Bytes) -> StatusCode {
    let report = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut record = state.record.lock().unwrap();
    record.usage_reports.push(report);
    record.usage_paths.push(uri.path().to_string());
    drop(record);
    let status = *state.usage_status.lock().unwrap();
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

/// Spawn a stub authority serving `{base}/check-license/{key}` and usage at
/// both `{base}/usage` and `{base}/check-license/usage`.
pub async fn spawn_authority_stub(reply: AuthorityReply) -> AuthorityStub {
    let state = AuthorityState {
        reply: Arc::new(Mutex::new(reply)),
        usage_status: Arc::new(Mutex::new(200)),
        record: Arc::new(Mutex::new(AuthorityRecord::default())),
    };
    let app = Router::new()
        .route("/backend_api/check-license/{key}", get(handle_check))
        .route("/backend_api/usage", post(handle_usage))
        .route("/backend_api/check-license/usage", post(handle_usage))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/backend_api", listener.local_addr().unwrap());
    let join = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    AuthorityStub {
        base_url,
        state,
        join,
    }
}

#[derive(Default)]
struct BackendRecord {
    calls: Vec<String>,
    bearer_tokens: Vec<String>,
    requests: usize,
}

#[derive(Clone)]
struct BackendState {
    version: String,
    hosts: u64,
    unavailable_for: Arc<Mutex<usize>>,
    record: Arc<Mutex<BackendRecord>>,
}

/// Handle for the stub backend query API.
pub struct BackendStub {
    /// Base URL to configure as `backend_base_url`.
    pub base_url: String,
    state: BackendState,
    join: tokio::task::JoinHandle<()>,
}

impl BackendStub {
    /// JSON-RPC methods answered, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.record.lock().unwrap().calls.clone()
    }

    /// Bearer tokens presented, in order.
    pub fn bearer_tokens(&self) -> Vec<String> {
        self.state.record.lock().unwrap().bearer_tokens.clone()
    }

    /// Every request received, including ones answered with 503.
    pub fn requests(&self) -> usize {
        self.state.record.lock().unwrap().requests
    }
}

impl Drop for BackendStub {
    fn drop(&mut self) {
        self.join.abort();
    }
}

fn rpc_error(id: Value, data: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": { "code": -32602, "message": "Invalid params.", "data": data },
        "id": id
    })
}

async fn handle_rpc(State(state): State<BackendState>, headers: HeaderMap, body: Bytes) -> Response {
    {
        let mut record = state.record.lock().unwrap();
        record.requests += 1;
    }
    {
        let mut unavailable = state.unavailable_for.lock().unwrap();
        if *unavailable > 0 {
            *unavailable -= 1;
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from);

    let mut record = state.record.lock().unwrap();
    record.calls.push(method.clone());
    if let Some(token) = &bearer {
        record.bearer_tokens.push(token.clone());
    }
    drop(record);

    let reply = match method.as_str() {
        "user.login" => {
            let password = request
                .pointer("/params/password")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if password == "zabbix" {
                json!({ "jsonrpc": "2.0", "result": "stub-token", "id": id })
            } else {
                rpc_error(id, "Incorrect user name or password or account is temporarily blocked.")
            }
        }
        "apiinfo.version" => json!({ "jsonrpc": "2.0", "result": state.version, "id": id }),
        "host.get" if bearer.as_deref() == Some("stub-token") => {
            let hosts: Vec<Value> = (0..state.hosts)
                .map(|i| json!({ "hostid": (10_000 + i).to_string() }))
                .collect();
            json!({ "jsonrpc": "2.0", "result": hosts, "id": id })
        }
        "host.get" => rpc_error(id, "Not authorized."),
        _ => rpc_error(id, "Unknown method."),
    };
    axum::Json(reply).into_response()
}

/// Spawn a stub backend JSON-RPC API at `{base}/api_jsonrpc.php`.
///
/// The first `unavailable_for` requests are answered with 503.
pub async fn spawn_backend_stub(version: &str, hosts: u64, unavailable_for: usize) -> BackendStub {
    let state = BackendState {
        version: version.to_string(),
        hosts,
        unavailable_for: Arc::new(Mutex::new(unavailable_for)),
        record: Arc::new(Mutex::new(BackendRecord::default())),
    };
    let app = Router::new()
        .route("/api_jsonrpc.php", post(handle_rpc))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let join = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    BackendStub {
        base_url,
        state,
        join,
    }
}
