//! In-process serialization of token writes per principal.

use std::sync::Arc;

use dashmap::DashMap;
use tokenauth_storage::Principal;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per principal, created on demand and dropped once nobody
/// holds or waits for it.
#[derive(Debug, Default, Clone)]
pub struct PrincipalLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Holds the lock of one principal until dropped.
#[derive(Debug)]
pub struct PrincipalGuard {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PrincipalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds the lock of `principal`.
    pub async fn lock(&self, principal: &Principal) -> PrincipalGuard {
        let key = principal.index_key();
        let mutex = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = mutex.lock_owned().await;
        PrincipalGuard {
            key,
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of principals with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for PrincipalGuard {
    fn drop(&mut self) {
        // Release first so the strong count reflects only the map and waiters.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
