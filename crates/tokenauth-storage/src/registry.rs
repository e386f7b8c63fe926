//! Named store backends assembled by the application at startup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::StorageResult;
use crate::error::StorageError;
use crate::traits::{DynTokenStore, StoreFactory};

/// Maps backend names to the factories that open them.
///
/// Registration is append-only: a name can be registered once.
///
/// ```ignore
/// let mut registry = StoreRegistry::new();
/// tokenauth_store_memory::register(&mut registry)?;
/// tokenauth_store_redis::register(&mut registry)?;
///
/// let store = registry.open("redis", r#"{"host":"127.0.0.1:6379"}"#).await?;
/// ```
#[derive(Default, Clone)]
pub struct StoreRegistry {
    factories: BTreeMap<String, Arc<dyn StoreFactory>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` for an empty name and
    /// `StorageError::DuplicateBackend` if the name is already taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn StoreFactory>,
    ) -> StorageResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(StorageError::invalid_input("backend name is empty"));
        }
        if self.factories.contains_key(&name) {
            return Err(StorageError::duplicate_backend(name));
        }
        tracing::debug!(backend = %name, "Registered token store backend");
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Opens the backend registered under `name` with its configuration
    /// string.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnknownBackend` if nothing is registered under
    /// `name`, otherwise whatever the backend's factory returns.
    pub async fn open(&self, name: &str, config: &str) -> StorageResult<DynTokenStore> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| StorageError::unknown_backend(name))?;
        let store = factory.open(config).await?;
        tracing::info!(
            backend = %name,
            implementation = store.backend_name(),
            consistency = %store.consistency(),
            "Opened token store"
        );
        Ok(store)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct RejectingFactory;

    #[async_trait]
    impl StoreFactory for RejectingFactory {
        async fn open(&self, config: &str) -> StorageResult<DynTokenStore> {
            Err(StorageError::configuration(format!("rejected `{config}`")))
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = StoreRegistry::new();
        registry
            .register("memory", Arc::new(RejectingFactory))
            .unwrap();

        let err = registry
            .register("memory", Arc::new(RejectingFactory))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateBackend { name } if name == "memory"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = StoreRegistry::new();
        assert!(
            registry
                .register("", Arc::new(RejectingFactory))
                .unwrap_err()
                .is_invalid_input()
        );
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = StoreRegistry::new();
        registry.register("redis", Arc::new(RejectingFactory)).unwrap();
        registry.register("default", Arc::new(RejectingFactory)).unwrap();
        assert_eq!(registry.names(), vec!["default", "redis"]);
        assert!(registry.contains("redis"));
        assert!(!registry.contains("etcd"));
    }

    #[tokio::test]
    async fn test_open_unknown_backend() {
        let registry = StoreRegistry::new();
        let err = registry.open("etcd", "").await.err().unwrap();
        assert!(matches!(err, StorageError::UnknownBackend { name } if name == "etcd"));
    }

    #[tokio::test]
    async fn test_open_delegates_to_factory() {
        let mut registry = StoreRegistry::new();
        registry.register("x", Arc::new(RejectingFactory)).unwrap();
        let err = registry.open("x", "cfg").await.err().unwrap();
        assert_eq!(err.to_string(), "Configuration error: rejected `cfg`");
    }
}
