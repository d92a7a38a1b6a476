use anyhow::Context;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub db_path: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source, falling back to
    /// defaults for anything unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            port: var("PHOTO_SHARE_PORT", "8000")
                .parse()
                .context("PHOTO_SHARE_PORT must be a port number")?,
            host: var("PHOTO_SHARE_HOST", "0.0.0.0"),
            db_path: var("PHOTO_SHARE_DB_PATH", "./data/database/photo-share.db"),
            max_connections: var("PHOTO_SHARE_MAX_CONNECTIONS", "10")
                .parse()
                .context("PHOTO_SHARE_MAX_CONNECTIONS must be a positive integer")?,
        })
    }
}
