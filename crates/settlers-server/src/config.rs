//! Server configuration read from the environment at startup.

use anyhow::Context;
use std::net::SocketAddr;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address (`SERVER_ADDR`)
    pub addr: SocketAddr,
    /// `tracing` filter directive (`RUST_LOG`)
    pub log_filter: String,
    /// Base seed for boards and dice (`GAME_SEED`). Each room adds its
    /// creation ordinal, so games replay identically across runs.
    pub game_seed: Option<u64>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.into())
            .parse()
            .context("SERVER_ADDR is not a socket address")?;

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into());

        let game_seed = lookup("GAME_SEED")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .context("GAME_SEED is not an unsigned integer")?;

        Ok(Self {
            addr,
            log_filter,
            game_seed,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_filter: DEFAULT_LOG_FILTER.into(),
            game_seed: None,
        }
    }
}
