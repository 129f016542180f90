//! Server configuration from the environment.

use std::fmt;
use std::str::FromStr;

use docket_core::defaults;
use docket_core::{Error, Result};

/// Where stored files, uploads and jobs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local; everything is lost on exit.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(Error::Config(format!(
                "STORAGE_BACKEND must be postgres or memory, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Postgres => f.write_str("postgres"),
            StorageBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Process-level settings for the API binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub backend: StorageBackend,
    /// Run a parse worker inside the API process.
    pub embedded_worker: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            database_url: defaults::DATABASE_URL.to_string(),
            backend: StorageBackend::Postgres,
            embedded_worker: false,
        }
    }
}

impl ServerConfig {
    /// Read `HOST`, `PORT`, `DATABASE_URL`, `STORAGE_BACKEND` and
    /// `EMBEDDED_WORKER`. Malformed values are a configuration error rather
    /// than silently defaulted.
    pub fn from_env() -> Result<Self> {
        let base = Self::default();

        let port = match std::env::var("PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", v)))?,
            Err(_) => base.port,
        };

        let backend = match std::env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => base.backend,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or(base.host),
            port,
            database_url: std::env::var("DATABASE_URL").unwrap_or(base.database_url),
            backend,
            embedded_worker: std::env::var("EMBEDDED_WORKER")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(base.embedded_worker),
        })
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
