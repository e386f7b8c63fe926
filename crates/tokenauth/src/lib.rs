//! # tokenauth
//!
//! Opaque bearer tokens for multi-audience services.
//!
//! An *audience* is a trust domain with its own secret and token lifetime.
//! Tokens are issued to a *principal* (an API client, a single end-user
//! session, or both) under an audience. Issuing a new token for a principal
//! supersedes every older one, so each principal holds at most one active
//! token.
//!
//! ## Modules
//!
//! - [`manager`] - Issue, validate, refresh and revoke tokens
//! - [`audience`] - Audience registration
//! - [`signing`] - Token value and secret generation
//! - [`request_signing`] - Signed request parameters
//! - [`http`] - Token extraction, token headers and error responses for axum
//! - [`sweeper`] - Background removal of expired tokens
//! - [`config`] - File and environment configuration
//! - [`error`] - Error types and client-visible error codes
//!
//! Storage backends live in their own crates and plug in through
//! [`StoreRegistry`].
//!
//! ```ignore
//! let mut registry = StoreRegistry::new();
//! tokenauth_store_memory::register(&mut registry)?;
//!
//! let config = TokenAuthConfig::load(None)?;
//! let auth = TokenAuth::open(&registry, &config, Arc::new(DefaultScheme)).await?;
//!
//! let audience = auth.audiences().create("mobile", 3600).await?;
//! let token = auth.manager().new_single_token("user-42", &audience).await?;
//! auth.manager().validate_token(&token.value).await?;
//! ```

pub mod audience;
pub mod config;
pub mod error;
pub mod http;
pub mod lock;
pub mod manager;
pub mod request_signing;
pub mod service;
pub mod signing;
pub mod sweeper;

pub use audience::AudienceService;
pub use config::{ConfigError, SerializationMode, StoreSettings, TokenAuthConfig};
pub use error::{AuthError, AuthResult, ErrorCategory, ValidationError, codes};
pub use http::{
    AuthRejection, AuthenticatedToken, HttpOptions, TOKEN_FIELD_NAME, TokenAuthState,
    error_response, extract_and_validate, extract_token, issue_and_serialize, write_token_headers,
};
pub use lock::{PrincipalGuard, PrincipalLocks};
pub use manager::{ManagerConfig, TokenManager, manager_from_config};
pub use request_signing::{RequestSigner, SignableParams};
pub use service::TokenAuth;
pub use signing::{DefaultScheme, DynSigningScheme, FnScheme, SigningScheme};
pub use sweeper::{Sweeper, SweeperHandle};

pub use tokenauth_storage::{
    Audience, Clock, Consistency, DynClock, DynTokenStore, Principal, StorageError, StoreFactory,
    StoreRegistry, SystemClock, Token, TokenStore,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokenauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::audience::AudienceService;
    pub use crate::config::{SerializationMode, TokenAuthConfig};
    pub use crate::error::{AuthError, AuthResult, ValidationError};
    pub use crate::http::{AuthenticatedToken, HttpOptions, TokenAuthState};
    pub use crate::manager::{ManagerConfig, TokenManager};
    pub use crate::service::TokenAuth;
    pub use crate::signing::{DefaultScheme, SigningScheme};
    pub use tokenauth_storage::{Audience, Principal, StoreRegistry, Token, TokenStore};
}
