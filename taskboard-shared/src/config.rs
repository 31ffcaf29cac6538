//! Store configuration shared by the API server and the scanner binary
//!
//! # Environment Variables
//!
//! - `STORE_BACKEND`: `memory` (default) or `postgres`
//! - `DATABASE_URL`: PostgreSQL connection string (required for `postgres`)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
//! - `STORE_WRITE_TIMEOUT_SECS`: budget for single-document calls (default: 5)
//! - `STORE_QUERY_TIMEOUT_SECS`: budget for aggregations (default: 10)
//! - `STORE_DUMP_TIMEOUT_SECS`: budget for full dumps (default: 15)
//!
//! Configuration is read through a lookup function so tests can supply
//! values without touching the process environment.

use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::db::migrations::run_migrations;
use crate::db::pool::{create_pool, PoolConfig};
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgDocumentStore;
use crate::store::repository::Timeouts;
use crate::store::DocumentStore;

/// Which [`DocumentStore`] implementation to run on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => anyhow::bail!("unknown STORE_BACKEND {other:?}, expected memory or postgres"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Pool settings; present for the postgres backend
    pub database: Option<PoolConfig>,

    pub timeouts: Timeouts,
}

impl StoreConfig {
    /// Reads the store settings through `lookup`
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable values, or a postgres backend
    /// without `DATABASE_URL`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend: StoreBackend = parse_or(&lookup, "STORE_BACKEND", StoreBackend::Memory)?;

        let database = match backend {
            StoreBackend::Memory => None,
            StoreBackend::Postgres => {
                let url = lookup("DATABASE_URL")
                    .filter(|url| !url.is_empty())
                    .context("DATABASE_URL is required when STORE_BACKEND=postgres")?;
                Some(PoolConfig {
                    url,
                    max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                    ..PoolConfig::default()
                })
            }
        };

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            write: secs_or(&lookup, "STORE_WRITE_TIMEOUT_SECS", defaults.write)?,
            query: secs_or(&lookup, "STORE_QUERY_TIMEOUT_SECS", defaults.query)?,
            dump: secs_or(&lookup, "STORE_DUMP_TIMEOUT_SECS", defaults.dump)?,
        };

        Ok(Self {
            backend,
            database,
            timeouts,
        })
    }

    /// Opens the configured store, applying migrations for postgres
    pub async fn connect(&self) -> anyhow::Result<Arc<dyn DocumentStore>> {
        match (&self.backend, &self.database) {
            (StoreBackend::Postgres, Some(pool_config)) => {
                let pool = create_pool(pool_config)
                    .await
                    .context("failed to connect to PostgreSQL")?;
                run_migrations(&pool)
                    .await
                    .context("failed to apply migrations")?;
                info!(backend = "postgres", "Document store ready");
                Ok(Arc::new(PgDocumentStore::new(pool)))
            }
            (StoreBackend::Postgres, None) => {
                anyhow::bail!("postgres backend selected without database settings")
            }
            (StoreBackend::Memory, _) => {
                info!(backend = "memory", "Document store ready; data is not persisted");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

/// Parses `key` if set and non-empty, otherwise returns `default`
pub fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        None => Ok(default),
    }
}

/// Parses a whole number of seconds; zero is rejected
pub fn secs_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> anyhow::Result<Duration> {
    let secs: u64 = parse_or(lookup, key, default.as_secs())?;
    if secs == 0 {
        anyhow::bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_memory() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert!(config.database.is_none());
        assert_eq!(config.timeouts, Timeouts::default());
    }

    #[test]
    fn test_postgres_requires_url() {
        assert!(StoreConfig::from_lookup(lookup(&[("STORE_BACKEND", "postgres")])).is_err());

        let config = StoreConfig::from_lookup(lookup(&[
            ("STORE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgresql://localhost/taskboard"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ]))
        .unwrap();
        let database = config.database.unwrap();
        assert_eq!(database.max_connections, 4);
        assert_eq!(database.url, "postgresql://localhost/taskboard");
    }

    #[test]
    fn test_timeouts_and_invalid_values() {
        let config = StoreConfig::from_lookup(lookup(&[("STORE_QUERY_TIMEOUT_SECS", "20")])).unwrap();
        assert_eq!(config.timeouts.query, Duration::from_secs(20));

        assert!(StoreConfig::from_lookup(lookup(&[("STORE_WRITE_TIMEOUT_SECS", "0")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[("STORE_WRITE_TIMEOUT_SECS", "soon")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[("STORE_BACKEND", "mongo")])).is_err());
    }

    #[tokio::test]
    async fn test_memory_backend_connects() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        let store = config.connect().await.unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
