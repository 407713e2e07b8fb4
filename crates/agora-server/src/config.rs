use std::net::SocketAddr;
use std::path::PathBuf;

use agora_visibility::{EngineConfig, SenderLookupFailure};
use anyhow::{Context, Result};

/// Server settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub message_limit: u32,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = var("AGORA_JWT_SECRET", "dev-secret-change-me");
        let db_path = PathBuf::from(var("AGORA_DB_PATH", "agora.db"));
        let host = var("AGORA_HOST", "0.0.0.0");
        let port: u16 = var("AGORA_PORT", "3000")
            .parse()
            .context("AGORA_PORT must be a port number")?;
        let message_limit: u32 = var("AGORA_MESSAGE_LIMIT", "200")
            .parse()
            .context("AGORA_MESSAGE_LIMIT must be a positive integer")?;
        let sender_lookup_failure: SenderLookupFailure =
            var("AGORA_SENDER_LOOKUP_FAILURE", "degrade").parse()?;

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            message_limit: message_limit.max(1),
            engine: EngineConfig {
                sender_lookup_failure,
            },
        })
    }
}
