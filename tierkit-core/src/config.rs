//! Configuration types
//!
//! Values can be built in code or loaded from environment variables with
//! fallback to defaults. Every config type exposes `validate()`.

use crate::{ConfigError, TierError, TierResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default byte budget of the memory tier.
pub const DEFAULT_MEMORY_COST_LIMIT: usize = 100_000_000;

/// Default per-request network timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// STORAGE CONFIGURATION
// ============================================================================

/// Configuration for the storage tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Total byte cost the memory tier may hold before evicting.
    pub memory_cost_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memory_cost_limit: DEFAULT_MEMORY_COST_LIMIT,
        }
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory tier byte budget.
    pub fn with_memory_cost_limit(mut self, limit: usize) -> Self {
        self.memory_cost_limit = limit;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `TIERKIT_MEMORY_COST_LIMIT`: memory tier byte budget (default: 100000000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            memory_cost_limit: std::env::var("TIERKIT_MEMORY_COST_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.memory_cost_limit),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> TierResult<()> {
        if self.memory_cost_limit == 0 {
            return Err(TierError::Config(ConfigError::InvalidValue {
                field: "memory_cost_limit".to_string(),
                value: self.memory_cost_limit.to_string(),
                reason: "memory_cost_limit must be greater than 0".to_string(),
            }));
        }
        Ok(())
    }
}

// ============================================================================
// FETCH CONFIGURATION
// ============================================================================

/// Caching behavior requested from the transport for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Defer to the protocol's own caching rules.
    UseProtocolCachePolicy,
    /// Always go to the origin.
    ReloadIgnoringLocalCacheData,
    /// Accept cached data of any age, load otherwise.
    #[default]
    ReturnCacheDataElseLoad,
    /// Accept only cached data.
    ReturnCacheDataDontLoad,
}

impl CachePolicy {
    /// `Cache-Control` request header value for this policy, if any.
    pub fn cache_control(&self) -> Option<&'static str> {
        match self {
            CachePolicy::UseProtocolCachePolicy => None,
            CachePolicy::ReloadIgnoringLocalCacheData => Some("no-cache"),
            CachePolicy::ReturnCacheDataElseLoad => Some("max-stale"),
            CachePolicy::ReturnCacheDataDontLoad => Some("only-if-cached"),
        }
    }
}

/// Where requests are sent and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub timeout: Duration,
    pub cache_policy: CachePolicy,
}

impl DomainInfo {
    /// Domain with the default timeout and cache policy.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_policy: CachePolicy::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }

    /// Create from environment variables.
    ///
    /// Environment variables:
    /// - `TIERKIT_API_HOST`: host name (required)
    /// - `TIERKIT_API_SCHEME`: URL scheme (default: https)
    /// - `TIERKIT_API_PORT`: port (default: none)
    /// - `TIERKIT_API_TIMEOUT_SECS`: request timeout (default: 10)
    pub fn from_env() -> TierResult<Self> {
        let host = std::env::var("TIERKIT_API_HOST").map_err(|_| {
            TierError::Config(ConfigError::MissingRequired {
                field: "TIERKIT_API_HOST".to_string(),
            })
        })?;

        let scheme = std::env::var("TIERKIT_API_SCHEME").unwrap_or_else(|_| "https".to_string());

        let port = match std::env::var("TIERKIT_API_PORT") {
            Ok(raw) => Some(raw.parse::<u16>().map_err(|e| {
                TierError::Config(ConfigError::InvalidValue {
                    field: "TIERKIT_API_PORT".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })
            })?),
            Err(_) => None,
        };

        let timeout = std::env::var("TIERKIT_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let domain = Self {
            scheme,
            host,
            port,
            timeout,
            cache_policy: CachePolicy::default(),
        };
        domain.validate()?;
        Ok(domain)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - scheme and host are non-empty
    /// - timeout is positive
    pub fn validate(&self) -> TierResult<()> {
        if self.scheme.trim().is_empty() {
            return Err(TierError::Config(ConfigError::InvalidValue {
                field: "scheme".to_string(),
                value: self.scheme.clone(),
                reason: "scheme must not be empty".to_string(),
            }));
        }

        if self.host.trim().is_empty() {
            return Err(TierError::Config(ConfigError::InvalidValue {
                field: "host".to_string(),
                value: self.host.clone(),
                reason: "host must not be empty".to_string(),
            }));
        }

        if self.timeout.is_zero() {
            return Err(TierError::Config(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                value: format!("{:?}", self.timeout),
                reason: "timeout must be positive".to_string(),
            }));
        }

        Ok(())
    }
}
