//! # tokenauth-storage
//!
//! Storage abstraction layer for tokenauth.
//!
//! This crate defines the contract every token store backend implements,
//! the audience and token records they persist, and a registry that maps
//! backend names to factories. It contains no backend itself; those live in
//! separate crates.
//!
//! ## Overview
//!
//! The main trait is [`TokenStore`], which defines:
//! - audience CRUD keyed by id
//! - token save/get/delete with per-principal supersession
//! - an optional sweep of expired tokens
//!
//! ## Example
//!
//! ```ignore
//! use tokenauth_storage::{Principal, Token, TokenStore};
//!
//! async fn replace_session(store: &dyn TokenStore, now: i64) -> StorageResult<()> {
//!     let token = Token::new("opaque", Principal::single("u1"), now + 3600);
//!     // Any token previously saved for `u1` is gone after this call.
//!     store.save_token(&token).await
//! }
//! ```

mod clock;
mod error;
mod flat_config;
pub mod registry;
mod traits;
mod types;

#[cfg(feature = "testutil")]
pub mod conformance;

pub use clock::{Clock, DynClock, SystemClock, system_clock};
#[cfg(any(test, feature = "testutil"))]
pub use clock::ManualClock;
pub use error::{ErrorCategory, StorageError};
pub use flat_config::FlatConfig;
pub use registry::StoreRegistry;
pub use traits::{
    DynTokenStore, StoreFactory, TokenStore, validate_audience_for_save, validate_audience_id,
    validate_token_for_save,
};
pub use types::{Audience, Consistency, Principal, Token, log_prefix};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokenauth_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Audience, Clock, Consistency, DynTokenStore, Principal, StorageError, StorageResult,
        StoreFactory, StoreRegistry, Token, TokenStore,
    };
}
