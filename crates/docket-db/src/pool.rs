//! Postgres pool settings and construction.
//!
//! Every knob can be set from the environment so the API binary and the test
//! fixtures size their pools the same way:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_MAX_CONNECTIONS` | `10` |
//! | `DATABASE_MIN_CONNECTIONS` | `1` |
//! | `DATABASE_CONNECT_TIMEOUT_SECS` | `30` |
//! | `DATABASE_IDLE_TIMEOUT_SECS` | `600` |
//! | `DATABASE_MAX_LIFETIME_SECS` | `1800`, `0` disables recycling |

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use docket_core::defaults;
use docket_core::{Error, Result};

/// Sizing and timeouts for the Postgres pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection.
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// `None` keeps connections until they fail.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::POOL_MAX_CONNECTIONS,
            min_connections: defaults::POOL_MIN_CONNECTIONS,
            connect_timeout: Duration::from_secs(defaults::POOL_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(defaults::POOL_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(defaults::POOL_MAX_LIFETIME_SECS)),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `DATABASE_*` pool variables, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        let mut config = Self::default();
        if let Some(n) = number("DATABASE_MAX_CONNECTIONS").filter(|n| *n > 0) {
            config = config.max_connections(u32::try_from(n).unwrap_or(u32::MAX));
        }
        if let Some(n) = number("DATABASE_MIN_CONNECTIONS") {
            config = config.min_connections(u32::try_from(n).unwrap_or(u32::MAX));
        }
        if let Some(secs) = number("DATABASE_CONNECT_TIMEOUT_SECS").filter(|n| *n > 0) {
            config = config.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = number("DATABASE_IDLE_TIMEOUT_SECS").filter(|n| *n > 0) {
            config = config.idle_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = number("DATABASE_MAX_LIFETIME_SECS") {
            config = config.max_lifetime((secs > 0).then(|| Duration::from_secs(secs)));
        }

        // A floor above the ceiling would make sqlx reject the options.
        if config.min_connections > config.max_connections {
            warn!(
                subsystem = "db",
                component = "pool",
                min_connections = config.min_connections,
                max_connections = config.max_connections,
                "DATABASE_MIN_CONNECTIONS exceeds the maximum, clamping"
            );
            config.min_connections = config.max_connections;
        }
        config
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// sqlx options carrying these settings.
    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }
}

/// Open a pool against `database_url`.
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let pool = config
        .options()
        .connect(database_url)
        .await
        .map_err(|e| Error::StorageFault(format!("Failed to connect to database: {}", e)))?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        max_lifetime = ?config.max_lifetime,
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

/// Log pool occupancy; warns when every connection is checked out.
pub fn log_pool_metrics(pool: &PgPool) {
    let (size, idle) = (pool.size(), pool.num_idle());
    debug!(
        subsystem = "db",
        component = "pool",
        pool_size = size,
        pool_idle = idle,
        "Pool occupancy"
    );
    if size > 0 && idle == 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "Database pool exhausted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_unset_variables_keep_defaults() {
        assert_eq!(PoolConfig::from_lookup(lookup(&[])), PoolConfig::default());
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_lifetime, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_every_variable_is_applied() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("DATABASE_MAX_CONNECTIONS", "25"),
            ("DATABASE_MIN_CONNECTIONS", "4"),
            ("DATABASE_CONNECT_TIMEOUT_SECS", "5"),
            ("DATABASE_IDLE_TIMEOUT_SECS", "120"),
            ("DATABASE_MAX_LIFETIME_SECS", "900"),
        ]));

        assert_eq!(
            config,
            PoolConfig::new()
                .max_connections(25)
                .min_connections(4)
                .connect_timeout(Duration::from_secs(5))
                .idle_timeout(Duration::from_secs(120))
                .max_lifetime(Some(Duration::from_secs(900)))
        );
    }

    #[test]
    fn test_zero_lifetime_disables_recycling() {
        let config = PoolConfig::from_lookup(lookup(&[("DATABASE_MAX_LIFETIME_SECS", "0")]));
        assert_eq!(config.max_lifetime, None);
    }

    #[test]
    fn test_malformed_and_zero_values_fall_back() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("DATABASE_CONNECT_TIMEOUT_SECS", "soon"),
            ("DATABASE_IDLE_TIMEOUT_SECS", "-3"),
        ]));
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn test_min_connections_clamped_to_max() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("DATABASE_MAX_CONNECTIONS", "3"),
            ("DATABASE_MIN_CONNECTIONS", "8"),
        ]));
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.min_connections, 3);
    }

    #[test]
    fn test_options_carry_settings() {
        let config = PoolConfig::new()
            .max_connections(7)
            .min_connections(2)
            .connect_timeout(Duration::from_secs(9))
            .max_lifetime(None);
        let options = config.options();

        assert_eq!(options.get_max_connections(), 7);
        assert_eq!(options.get_min_connections(), 2);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(9));
        assert_eq!(options.get_max_lifetime(), None);
        assert_eq!(options.get_idle_timeout(), Some(Duration::from_secs(600)));
    }
}
