//! The token store contract implemented by every backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::StorageResult;
use crate::error::StorageError;
use crate::types::{Audience, Consistency, Token};

/// Persistence contract for audiences and tokens.
///
/// Backends keep a per-principal index so that saving a token removes every
/// other token previously saved for the same principal. All methods may be
/// called concurrently from many tasks.
///
/// Expiry is never decided by the contract itself: `get_token` may return a
/// token whose deadline has passed, and callers check
/// [`Token::is_expired_at`].
#[async_trait]
pub trait TokenStore: Send + Sync {
    // ==================== Audiences ====================

    /// Persists an audience, replacing any existing audience with the same ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if the audience ID is empty.
    async fn save_audience(&self, audience: &Audience) -> StorageResult<()>;

    /// Reads an audience by ID.
    ///
    /// Returns `Ok(None)` when no audience is stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if `id` is empty.
    async fn get_audience(&self, id: &str) -> StorageResult<Option<Audience>>;

    /// Removes an audience. Deleting a missing audience succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if `id` is empty.
    async fn delete_audience(&self, id: &str) -> StorageResult<()>;

    // ==================== Tokens ====================

    /// Persists a token, superseding every other token of its principal.
    ///
    /// After a successful save, looking up any token previously saved for the
    /// same principal returns `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if the token has an empty value,
    /// no principal, or a deadline in the past.
    async fn save_token(&self, token: &Token) -> StorageResult<()>;

    /// Reads a token by value, including tokens that are already expired.
    async fn get_token(&self, value: &str) -> StorageResult<Option<Token>>;

    /// Removes a token. Deleting a missing token succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if `value` is empty.
    async fn delete_token(&self, value: &str) -> StorageResult<()>;

    /// Rewrites a token in place and drops every other token of its
    /// principal.
    ///
    /// Unlike [`save_token`](Self::save_token) the flushed token itself is
    /// never removed from the index, so refreshing the deadline of a live
    /// token cannot invalidate it even briefly.
    async fn flush_token(&self, token: &Token) -> StorageResult<()>;

    /// Moves the deadline of the stored token `value` to `deadline`.
    ///
    /// Returns `Ok(None)` when the token is no longer stored, for example
    /// because a newer token of the same principal superseded it. The default
    /// reads the token and flushes it back; backends that can do both under
    /// one lock override it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if `deadline` is in the past.
    async fn refresh_token(&self, value: &str, deadline: i64) -> StorageResult<Option<Token>> {
        let Some(mut token) = self.get_token(value).await? else {
            return Ok(None);
        };
        token.deadline = deadline;
        self.flush_token(&token).await?;
        Ok(Some(token))
    }

    /// Removes tokens whose deadline has passed.
    ///
    /// Returns the number of removed tokens. Backends that expire entries
    /// natively return `0`.
    async fn delete_expired(&self) -> StorageResult<u64>;

    // ==================== Lifecycle ====================

    /// Releases backend resources. Calling it more than once is harmless.
    async fn close(&self) -> StorageResult<()>;

    /// Concurrency guarantee of [`save_token`](Self::save_token).
    fn consistency(&self) -> Consistency;

    /// Backend name used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Type alias for a shareable token store.
pub type DynTokenStore = Arc<dyn TokenStore>;

/// Opens a configured token store from a backend specific configuration
/// string.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Parses `config` and connects.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` if `config` cannot be parsed,
    /// or `StorageError::Connection` if the backend is unreachable.
    async fn open(&self, config: &str) -> StorageResult<DynTokenStore>;
}

/// Checks the invariants every backend enforces before persisting a token.
///
/// # Errors
///
/// Returns `StorageError::InvalidInput` for an empty value, a token bound to
/// no principal, or a deadline at or before `now`.
pub fn validate_token_for_save(token: &Token, now: i64) -> StorageResult<()> {
    if token.value.is_empty() {
        return Err(StorageError::invalid_input("token value is empty"));
    }
    if token.client_id.is_empty() && token.single_id.is_empty() {
        return Err(StorageError::invalid_input(
            "token is bound to no client or single id",
        ));
    }
    if token.is_expired_at(now) {
        return Err(StorageError::invalid_input(format!(
            "token deadline {} is not after {now}",
            token.deadline
        )));
    }
    Ok(())
}

/// Checks an audience before persisting it.
///
/// # Errors
///
/// Returns `StorageError::InvalidInput` if the audience ID is empty.
pub fn validate_audience_for_save(audience: &Audience) -> StorageResult<()> {
    validate_audience_id(&audience.id)
}

/// Checks the id passed to audience lookups and deletes.
///
/// # Errors
///
/// Returns `StorageError::InvalidInput` if `id` is empty.
pub fn validate_audience_id(id: &str) -> StorageResult<()> {
    if id.is_empty() {
        return Err(StorageError::invalid_input("audience id is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Principal;

    #[test]
    fn test_validate_token_for_save() {
        let now = 1_000;
        let ok = Token::new("v", Principal::client("c1"), now + 10);
        assert!(validate_token_for_save(&ok, now).is_ok());

        let forever = Token::new("v", Principal::single("u1"), 0);
        assert!(validate_token_for_save(&forever, now).is_ok());

        let empty = Token::new("", Principal::client("c1"), 0);
        assert!(
            validate_token_for_save(&empty, now)
                .unwrap_err()
                .is_invalid_input()
        );

        let orphan = Token::new("v", Principal::new("", ""), 0);
        assert!(validate_token_for_save(&orphan, now).is_err());

        let stale = Token::new("v", Principal::client("c1"), now);
        assert!(validate_token_for_save(&stale, now).is_err());
    }

    #[test]
    fn test_validate_audience_for_save() {
        assert!(validate_audience_for_save(&Audience::new("a1", "", "", 0)).is_ok());
        assert!(validate_audience_for_save(&Audience::new("", "app", "", 0)).is_err());
        assert!(validate_audience_id("a1").is_ok());
        assert!(validate_audience_id("").unwrap_err().is_invalid_input());
    }
}
