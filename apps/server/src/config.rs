//! Server-level configuration (bind address, database path, webhook secrets).
//!
//! Provider credentials live in `ledgerlink_connect::ConnectConfig`; this
//! struct only carries what the HTTP process itself needs.

use std::env;
use std::net::SocketAddr;

use ledgerlink_core::errors::{Error, Result};

const DEFAULT_LISTEN: &str = "127.0.0.1:8091";
const DEFAULT_DB_PATH: &str = "ledgerlink.db";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub database_path: String,
    /// Shared secret expected in SnapTrade webhook payloads. When unset,
    /// SnapTrade webhooks are rejected.
    pub snaptrade_webhook_secret: Option<String>,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let listen = optional("LEDGERLINK_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen: SocketAddr = listen.parse().map_err(|_| {
            Error::InvalidConfigValue(format!("LEDGERLINK_LISTEN is not a socket address: {}", listen))
        })?;

        Ok(Self {
            listen,
            database_path: optional("DATABASE_URL").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            snaptrade_webhook_secret: optional("SNAPTRADE_WEBHOOK_SECRET"),
        })
    }
}
