//! Redis token store backend for tokenauth.
//!
//! Tokens are stored as JSON strings with a native TTL, next to a hash per
//! principal listing that principal's token values. Connections come from a
//! `deadpool-redis` pool. The configured `timeout` bounds waiting for,
//! creating and recycling connections as well as every Redis command.
//!
//! The backend is registered as `"redis"` and as `"default"`:
//!
//! ```ignore
//! let mut registry = StoreRegistry::new();
//! tokenauth_store_redis::register(&mut registry)?;
//! let store = registry
//!     .open("default", r#"{"host":"127.0.0.1:6379","pool_size":"10","timeout":"1"}"#)
//!     .await?;
//! ```

pub mod config;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use tokenauth_storage::{
    DynClock, DynTokenStore, StorageResult, StoreFactory, StoreRegistry, system_clock,
};

pub use config::RedisStoreConfig;
pub use store::RedisTokenStore;

/// Name the backend is registered under.
pub const BACKEND_NAME: &str = "redis";

/// Alias registered alongside [`BACKEND_NAME`].
pub const DEFAULT_BACKEND_NAME: &str = "default";

/// Opens [`RedisTokenStore`] instances for a [`StoreRegistry`].
#[derive(Debug, Clone)]
pub struct RedisStoreFactory {
    clock: DynClock,
}

impl RedisStoreFactory {
    pub fn new() -> Self {
        Self {
            clock: system_clock(),
        }
    }

    pub fn with_clock(clock: DynClock) -> Self {
        Self { clock }
    }
}

impl Default for RedisStoreFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreFactory for RedisStoreFactory {
    async fn open(&self, config: &str) -> StorageResult<DynTokenStore> {
        // Parsing fails before any connection is attempted.
        let config = RedisStoreConfig::parse(config)?;
        let store = RedisTokenStore::connect_with_clock(config, Arc::clone(&self.clock)).await?;
        Ok(Arc::new(store))
    }
}

/// Registers the Redis backend under `"redis"` and `"default"`.
///
/// # Errors
///
/// Returns `StorageError::DuplicateBackend` if either name is taken.
pub fn register(registry: &mut StoreRegistry) -> StorageResult<()> {
    let factory = Arc::new(RedisStoreFactory::new());
    registry.register(BACKEND_NAME, factory.clone())?;
    registry.register(DEFAULT_BACKEND_NAME, factory)
}

#[cfg(test)]
mod tests {
    use tokenauth_storage::StorageError;

    use super::*;

    #[test]
    fn test_register_both_names() {
        let mut registry = StoreRegistry::new();
        register(&mut registry).unwrap();
        assert_eq!(registry.names(), vec!["default", "redis"]);
    }

    #[tokio::test]
    async fn test_open_without_host_fails_before_connecting() {
        let factory = RedisStoreFactory::new();
        let err = factory.open(r#"{"pool_size":"5"}"#).await.err().unwrap();
        assert!(matches!(err, StorageError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_open_unreachable_host_is_connection_error() {
        // Port 1 is reserved and refuses connections.
        let factory = RedisStoreFactory::new();
        let err = factory
            .open(r#"{"host":"127.0.0.1:1","timeout":"1"}"#)
            .await
            .err()
            .unwrap();
        assert!(err.is_connection(), "unexpected error: {err}");
    }
}
