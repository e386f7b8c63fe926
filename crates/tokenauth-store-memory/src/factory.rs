use std::sync::Arc;

use async_trait::async_trait;
use tokenauth_storage::{
    DynClock, DynTokenStore, FlatConfig, StorageError, StorageResult, StoreFactory,
    StoreRegistry, system_clock,
};

use crate::MemoryTokenStore;

/// Name the backend is registered under.
pub const BACKEND_NAME: &str = "memory";

/// Storage-specific configuration options.
///
/// Parsed from the store configuration string. An empty string selects the
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStoreOptions {
    /// Initial capacity of the token map.
    pub preallocate_tokens: Option<usize>,
}

impl MemoryStoreOptions {
    /// Parses a configuration string such as `{"capacity":"1024"}`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` if the string is not a JSON
    /// object or `capacity` is not a non-negative integer.
    pub fn parse(config: &str) -> StorageResult<Self> {
        let flat = FlatConfig::parse(BACKEND_NAME, config)?;

        let preallocate_tokens = match flat.non_empty("capacity") {
            None => None,
            Some(raw) => Some(raw.trim().parse::<usize>().map_err(|_| {
                StorageError::configuration(format!(
                    "memory store `capacity` must be a non-negative integer, got `{raw}`"
                ))
            })?),
        };

        Ok(Self { preallocate_tokens })
    }
}

/// Opens [`MemoryTokenStore`] instances for a [`StoreRegistry`].
#[derive(Debug, Clone)]
pub struct MemoryStoreFactory {
    clock: DynClock,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self {
            clock: system_clock(),
        }
    }

    /// Stores opened by this factory read time from `clock`.
    pub fn with_clock(clock: DynClock) -> Self {
        Self { clock }
    }
}

impl Default for MemoryStoreFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreFactory for MemoryStoreFactory {
    async fn open(&self, config: &str) -> StorageResult<DynTokenStore> {
        let options = MemoryStoreOptions::parse(config)?;
        Ok(Arc::new(MemoryTokenStore::with_options(
            options,
            Arc::clone(&self.clock),
        )))
    }
}

/// Registers the in-memory backend under `"memory"`.
///
/// # Errors
///
/// Returns `StorageError::DuplicateBackend` if the name is taken.
pub fn register(registry: &mut StoreRegistry) -> StorageResult<()> {
    registry.register(BACKEND_NAME, Arc::new(MemoryStoreFactory::new()))
}
