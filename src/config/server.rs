//! Demo server configuration.

use std::net::SocketAddr;

use super::parse::{env_parse, Vars};
use super::ConfigError;

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (LISTEN_ADDR).
    pub listen_addr: SocketAddr,
}

impl ServerConfig {
    /// Load configuration from variables.
    pub fn from_vars(vars: &dyn Vars) -> Result<Self, ConfigError> {
        let default_addr = SocketAddr::from(([0, 0, 0, 0], 8080));
        Ok(Self {
            listen_addr: env_parse(vars, "LISTEN_ADDR", default_addr)?,
        })
    }
}
