//! License Gateway - an HTTP front door for the monitoring UI.
//!
//! Every request re-reads the license file and asks the validator. Only a
//! confirmed license is proxied to the upstream; anything else, including an
//! unreachable authority, gets the denial page. The gateway has no routes of
//! its own.

pub mod denial;
pub mod proxy;


use crate::clock::SystemClock;
use crate::config::LicenseGateConfig;
use crate::store::LicenseStore;
use crate::validator::{LicenseValidator, ValidationResult};
use crate::LicenseGateError;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub use denial::{DenialPage, DEFAULT_DENIAL_PAGE};
pub use proxy::UpstreamProxy;

struct GatewayInner {
    store: LicenseStore,
    validator: LicenseValidator,
    proxy: UpstreamProxy,
    denial_page: DenialPage,
}

/// Request gate in front of the upstream UI.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Build a gateway from configuration.
    ///
    /// Loads the custom denial page, if configured, and enables the verdict
    /// cache when `validation_cache_ttl_ms` is non-zero.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid configuration or an unreadable
    /// denial page.
    pub fn new(config: &LicenseGateConfig) -> Result<Self, LicenseGateError> {
        config.validate()?;

        let mut validator = LicenseValidator::new(config)?;
        if let Some(ttl) = config.validation_cache_ttl() {
            validator = validator.with_cache(ttl, Arc::new(SystemClock));
        }

        let denial_page = match &config.denial_page_path {
            Some(path) => DenialPage::from_file(path)?,
            None => DenialPage::default(),
        };

        Ok(Self::from_parts(
            LicenseStore::new(&config.license_file_path),
            validator,
            UpstreamProxy::new(config.upstream_uri()?, config.upstream_timeout()),
            denial_page,
        ))
    }

    /// Assemble a gateway from its parts.
    pub fn from_parts(
        store: LicenseStore,
        validator: LicenseValidator,
        proxy: UpstreamProxy,
        denial_page: DenialPage,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                store,
                validator,
                proxy,
                denial_page,
            }),
        }
    }

    /// Router sending every path through the gate.
    pub fn router(&self) -> Router {
        Router::new().fallback(gate).with_state(self.clone())
    }

    /// Read the credential and confirm it with the authority.
    ///
    /// # Errors
    ///
    /// Any credential, authority or verdict failure.
    pub async fn check_license(&self) -> Result<ValidationResult, LicenseGateError> {
        let credential = self.inner.store.read().await?;
        self.inner.validator.confirm(&credential.license_key).await
    }

    /// Gate one request: forward it on a confirmed license, deny otherwise.
    pub async fn handle(&self, request: Request) -> Response {
        match self.check_license().await {
            Ok(_) => self.inner.proxy.forward(request).await,
            Err(e) => {
                info!(
                    method = %request.method(),
                    path = %request.uri().path(),
                    reason = %e,
                    "Request denied"
                );
                self.inner.denial_page.response()
            }
        }
    }
}

async fn gate(State(gateway): State<Gateway>, request: Request) -> Response {
    gateway.handle(request).await
}

/// Serve the gateway on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns `GatewayIo` if the server fails.
pub async fn serve<F>(
    listener: TcpListener,
    gateway: Gateway,
    shutdown: F,
) -> Result<(), LicenseGateError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| LicenseGateError::GatewayIo(e.to_string()))?;
    info!(%addr, upstream = %gateway.inner.proxy.upstream(), "Gateway listening");

    axum::serve(listener, gateway.router())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| LicenseGateError::GatewayIo(e.to_string()))?;

    debug!("Gateway stopped");
    Ok(())
}

/// Bind `listen_addr` and serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns `ConfigError` for invalid configuration and `GatewayIo` if the
/// address cannot be bound or the server fails.
pub async fn run<F>(config: &LicenseGateConfig, shutdown: F) -> Result<(), LicenseGateError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let gateway = Gateway::new(config)?;
    let addr = config.listen_socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| LicenseGateError::GatewayIo(format!("Failed to bind {}: {}", addr, e)))?;
    serve(listener, gateway, shutdown).await
}
