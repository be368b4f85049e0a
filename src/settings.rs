//! Process settings read from the environment.

use crate::error::ConfigError;
use crate::hub::{DEFAULT_BODY_LIMIT, DEFAULT_SERVER_URL};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubSettings {
    pub database_url: String,
    pub bind: String,
    pub server_url: String,
    /// JSON file holding collection definitions.
    pub collections_path: String,
    pub body_limit: usize,
    pub max_connections: u32,
}

impl Default for HubSettings {
    fn default() -> Self {
        HubSettings {
            database_url: "postgres://localhost/honohub".into(),
            bind: "127.0.0.1:3000".into(),
            server_url: DEFAULT_SERVER_URL.into(),
            collections_path: "collections.json".into(),
            body_limit: DEFAULT_BODY_LIMIT,
            max_connections: 5,
        }
    }
}

impl HubSettings {
    /// `DATABASE_URL`, `HONOHUB_BIND`, `HONOHUB_SERVER_URL`, `HONOHUB_COLLECTIONS`,
    /// `HONOHUB_BODY_LIMIT`, `HONOHUB_MAX_CONNECTIONS`; unset variables keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = HubSettings::default();
        Ok(HubSettings {
            database_url: lookup("DATABASE_URL").unwrap_or(d.database_url),
            bind: lookup("HONOHUB_BIND").unwrap_or(d.bind),
            server_url: lookup("HONOHUB_SERVER_URL").unwrap_or(d.server_url),
            collections_path: lookup("HONOHUB_COLLECTIONS").unwrap_or(d.collections_path),
            body_limit: parsed(&lookup, "HONOHUB_BODY_LIMIT", d.body_limit)?,
            max_connections: parsed(&lookup, "HONOHUB_MAX_CONNECTIONS", d.max_connections)?,
        })
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} must be a number, got '{}'", key, raw))),
    }
}
