//! Wire formats for the licensing authority and the backend query API.

pub mod jsonrpc;
pub mod models;
