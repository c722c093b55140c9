//! Runtime environment for the HTTP server.

use std::net::SocketAddr;

use crate::errors::{Error, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Address the HTTP listener binds to, from `BIND_ADDR`.
pub fn bind_addr() -> Result<SocketAddr> {
    let raw = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    raw.parse().map_err(|e| Error::Config {
        message: format!("Invalid BIND_ADDR {raw:?}: {e}"),
    })
}

/// Path of the shop seed configuration, from `CHAIRSIDE_CONFIG`.
#[must_use]
pub fn config_path() -> String {
    std::env::var("CHAIRSIDE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
