//! Page served when a request is denied.

use crate::LicenseGateError;
use axum::body::Bytes;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::Path;

/// Built-in denial page.
pub const DEFAULT_DENIAL_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>License required</title>
<style>
body { font-family: sans-serif; background: #f4f4f4; color: #333; }
main { max-width: 32rem; margin: 10vh auto; padding: 2rem; background: #fff; border-top: 4px solid #c0392b; }
</style>
</head>
<body>
<main>
<h1>License required</h1>
<p>This monitoring instance does not have a valid license.</p>
<p>Contact your administrator to install or renew the license.</p>
</main>
</body>
</html>
"#;

/// Body of every `403` the gateway returns.
#[derive(Debug, Clone)]
pub struct DenialPage {
    body: Bytes,
}

impl Default for DenialPage {
    fn default() -> Self {
        Self {
            body: Bytes::from_static(DEFAULT_DENIAL_PAGE.as_bytes()),
        }
    }
}

impl DenialPage {
    /// Use `body` as the page.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Read the page from a file once.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, LicenseGateError> {
        let body = std::fs::read(path).map_err(|e| {
            LicenseGateError::ConfigError(format!(
                "Failed to read denial page {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::new(body))
    }

    /// Page bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// `403` response carrying the page.
    pub fn response(&self) -> Response {
        (
            StatusCode::FORBIDDEN,
            [
                (CONTENT_TYPE, "text/html; charset=utf-8"),
                (CACHE_CONTROL, "no-store"),
            ],
            self.body.clone(),
        )
            .into_response()
    }
}
