//! Reqwest-based HTTP clients for the licensing authority and the backend.

pub mod authority;
pub mod backend;

/// User-Agent sent on every outbound call.
///
/// Format: `licensegate/<version>`
pub fn user_agent() -> String {
    format!("licensegate/{}", env!("CARGO_PKG_VERSION"))
}
