//! Reverse-proxy passthrough to the backend.
//!
//! Plain requests are forwarded with hop-by-hop headers removed. Requests
//! asking for a protocol upgrade keep `Connection`/`Upgrade`; if the backend
//! answers `101`, both connections are taken over and spliced.

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{
    CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING,
    UPGRADE,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use hyper::upgrade::OnUpgrade;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::time::Duration;
use tracing::{debug, warn};

type HttpClient = Client<HttpConnector, Body>;

/// Forwards requests to one upstream base URL.
#[derive(Clone)]
pub struct UpstreamProxy {
    client: HttpClient,
    upstream: Uri,
    timeout: Duration,
}

impl UpstreamProxy {
    /// Create a proxy for an absolute `http://` upstream.
    pub fn new(upstream: Uri, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            upstream,
            timeout,
        }
    }

    /// Upstream base URL.
    pub fn upstream(&self) -> &Uri {
        &self.upstream
    }

    /// Forward `request` and return the upstream's response.
    ///
    /// Unreachable upstream is `502`, no response headers within the timeout
    /// is `504`.
    pub async fn forward(&self, mut request: Request) -> Response {
        let upgrading = is_upgrade_request(request.headers());
        let client_upgrade = upgrading.then(|| hyper::upgrade::on(&mut request));

        let outbound = match self.rewrite(request, upgrading) {
            Some(outbound) => outbound,
            None => return StatusCode::BAD_GATEWAY.into_response(),
        };
        debug!(method = %outbound.method(), uri = %outbound.uri(), upgrading, "Forwarding request");

        let mut response =
            match tokio::time::timeout(self.timeout, self.client.request(outbound)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!(error = %e, upstream = %self.upstream, "Upstream request failed");
                    return StatusCode::BAD_GATEWAY.into_response();
                }
                Err(_) => {
                    warn!(upstream = %self.upstream, timeout_ms = self.timeout.as_millis() as u64, "Upstream timed out");
                    return StatusCode::GATEWAY_TIMEOUT.into_response();
                }
            };

        match client_upgrade {
            Some(client_upgrade) if response.status() == StatusCode::SWITCHING_PROTOCOLS => {
                let upstream_upgrade = hyper::upgrade::on(&mut response);
                tokio::spawn(splice(client_upgrade, upstream_upgrade));
            }
            _ => strip_hop_by_hop(response.headers_mut()),
        }

        response.map(Body::new)
    }

    /// Point the request at the upstream, keeping method, path, query,
    /// headers and body.
    fn rewrite(&self, request: Request, upgrading: bool) -> Option<Request> {
        let (mut parts, body) = request.into_parts();

        let base_path = self.upstream.path().trim_end_matches('/');
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let authority = self.upstream.authority()?.clone();

        parts.uri = Uri::builder()
            .scheme("http")
            .authority(authority.clone())
            .path_and_query(format!("{}{}", base_path, path_and_query))
            .build()
            .ok()?;
        parts.version = Version::HTTP_11;

        if !upgrading {
            strip_hop_by_hop(&mut parts.headers);
        }
        parts
            .headers
            .insert(HOST, HeaderValue::from_str(authority.as_str()).ok()?);

        Some(Request::from_parts(parts, body))
    }
}

/// Whether the request asks to switch protocols (WebSocket and friends).
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers.contains_key(UPGRADE)
        && headers
            .get_all(CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }

    for name in [
        CONNECTION,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRAILER,
        TRANSFER_ENCODING,
        UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

async fn splice(client: OnUpgrade, upstream: OnUpgrade) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "Connection upgrade failed");
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut upstream = TokioIo::new(upstream);
    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((from_client, from_upstream)) => {
            debug!(from_client, from_upstream, "Upgraded connection closed");
        }
        Err(e) => debug!(error = %e, "Upgraded connection ended with error"),
    }
}
