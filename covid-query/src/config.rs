use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the query service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Document store configuration
    pub store: StoreConfig,

    /// Query limits and settings
    pub query: QueryLimitsConfig,

    /// Caching configuration
    pub cache: CacheConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Deployment environment name, reported by `/health`
    pub environment: String,

    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

/// Document store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of `<collection>.json` exports; an empty store when unset
    pub data_dir: Option<PathBuf>,
}

/// Query limits and configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLimitsConfig {
    /// Per-call query timeout in milliseconds
    pub query_timeout_ms: u64,
}

/// Caching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable response caching
    pub enable_caching: bool,

    /// Time to live of a cached response in seconds
    pub ttl_seconds: u64,

    /// Maximum number of cached responses
    pub max_entries: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for QueryLimitsConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 30000, // 30 seconds
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_caching: true,
            ttl_seconds: 900, // 15 minutes
            max_entries: 10_000,
        }
    }
}

impl QueryLimitsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl QueryConfig {
    /// Load configuration from environment variables and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Override with variables if present
        if let Some(bind_addr) = lookup("COVID_BIND_ADDRESS") {
            config.server.bind_address = bind_addr;
        }

        if let Some(environment) = lookup("COVID_ENV") {
            config.server.environment = environment;
        }

        if let Some(log_level) = lookup("COVID_LOG_LEVEL") {
            config.server.log_level = log_level;
        }

        if let Some(data_dir) = lookup("COVID_DATA_DIR") {
            if !data_dir.trim().is_empty() {
                config.store.data_dir = Some(PathBuf::from(data_dir));
            }
        }

        if let Some(query_timeout) = lookup("COVID_QUERY_TIMEOUT_MS") {
            config.query.query_timeout_ms = query_timeout
                .parse()
                .context("COVID_QUERY_TIMEOUT_MS must be an integer")?;
        }

        if let Some(enable_caching) = lookup("COVID_CACHE_ENABLE") {
            config.cache.enable_caching = enable_caching
                .parse()
                .context("COVID_CACHE_ENABLE must be true or false")?;
        }

        if let Some(ttl) = lookup("COVID_CACHE_TTL_SECONDS") {
            config.cache.ttl_seconds = ttl
                .parse()
                .context("COVID_CACHE_TTL_SECONDS must be an integer")?;
        }

        if let Some(max_entries) = lookup("COVID_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = max_entries
                .parse()
                .context("COVID_CACHE_MAX_ENTRIES must be an integer")?;
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address '{}'", self.server.bind_address))?;

        if self.query.query_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Query timeout must be greater than 0"));
        }

        if let Some(dir) = &self.store.data_dir {
            if !dir.is_dir() {
                return Err(anyhow::anyhow!(
                    "Data directory '{}' does not exist",
                    dir.display()
                ));
            }
        }

        if self.cache.enable_caching {
            if self.cache.ttl_seconds == 0 {
                return Err(anyhow::anyhow!("Cache TTL must be greater than 0"));
            }

            if self.cache.max_entries == 0 {
                return Err(anyhow::anyhow!("Cache size must be greater than 0"));
            }
        }

        Ok(())
    }
}
