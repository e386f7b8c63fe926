//! In-memory token store backend for tokenauth.
//!
//! This crate provides an in-memory implementation of the `TokenStore` trait
//! from `tokenauth-storage`. Supersession is atomic; expired tokens are kept
//! until swept.
//!
//! # Example
//!
//! ```ignore
//! use tokenauth_store_memory::MemoryTokenStore;
//! use tokenauth_storage::{Principal, Token, TokenStore};
//!
//! let store = MemoryTokenStore::new();
//! store.save_token(&Token::new("opaque", Principal::single("u1"), 0)).await?;
//! ```

pub mod factory;
pub mod storage;

pub use factory::{BACKEND_NAME, MemoryStoreFactory, MemoryStoreOptions, register};
pub use storage::MemoryTokenStore;

/// Creates a new shareable in-memory store using the wall clock.
pub fn create_token_store() -> tokenauth_storage::DynTokenStore {
    std::sync::Arc::new(MemoryTokenStore::new())
}
