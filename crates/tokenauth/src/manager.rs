//! Token lifecycle: issue, validate, refresh and revoke.
//!
//! Per principal a token moves from *absent* to *active* when issued, to
//! *expired* once its deadline passes, and back to *absent* when it is
//! revoked, superseded by a newer token, or swept.

use std::fmt;

use tokenauth_storage::{
    Audience, Consistency, DynClock, DynTokenStore, Principal, Token, log_prefix, system_clock,
};

use crate::config::{SerializationMode, TokenAuthConfig};
use crate::error::{AuthError, AuthResult};
use crate::lock::PrincipalLocks;
use crate::signing::DynSigningScheme;

/// Settings of a [`TokenManager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    pub serialization: SerializationMode,
}

impl From<&TokenAuthConfig> for ManagerConfig {
    fn from(config: &TokenAuthConfig) -> Self {
        Self {
            serialization: config.serialization,
        }
    }
}

/// Issues, validates, refreshes and revokes tokens against a token store.
///
/// The manager holds no per-request state; everything durable lives in the
/// store. It is cheap to clone and share across tasks.
#[derive(Clone)]
pub struct TokenManager {
    store: DynTokenStore,
    scheme: DynSigningScheme,
    clock: DynClock,
    locks: Option<PrincipalLocks>,
}

impl TokenManager {
    pub fn new(store: DynTokenStore, scheme: DynSigningScheme, config: ManagerConfig) -> Self {
        let serialize = match config.serialization {
            SerializationMode::Always => true,
            SerializationMode::Never => false,
            SerializationMode::Auto => store.consistency() == Consistency::BestEffort,
        };
        if serialize {
            tracing::debug!(
                backend = store.backend_name(),
                "Serializing token writes per principal"
            );
        }
        Self {
            store,
            scheme,
            clock: system_clock(),
            locks: serialize.then(PrincipalLocks::new),
        }
    }

    /// Reads time from `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: DynClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &DynTokenStore {
        &self.store
    }

    /// Current unix time as seen by this manager.
    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    /// Returns `true` if token writes are serialized per principal.
    pub fn serializes_writes(&self) -> bool {
        self.locks.is_some()
    }

    // ==================== Issue ====================

    /// Issues a token for an API client, superseding its previous token.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty `client_id` or audience id,
    /// and `AuthError::Storage` if the store fails.
    pub async fn new_token(&self, client_id: &str, audience: &Audience) -> AuthResult<Token> {
        if client_id.is_empty() {
            return Err(AuthError::principal_empty());
        }
        self.issue(Principal::client(client_id), audience).await
    }

    /// Issues a token for a single end-user session, superseding the
    /// previous session of that user.
    ///
    /// # Errors
    ///
    /// Same as [`new_token`](Self::new_token).
    pub async fn new_single_token(&self, single_id: &str, audience: &Audience) -> AuthResult<Token> {
        if single_id.is_empty() {
            return Err(AuthError::principal_empty());
        }
        self.issue(Principal::single(single_id), audience).await
    }

    /// Issues a token for `principal` under `audience`.
    ///
    /// The deadline is `now + audience.token_period`, or `0` (never) when the
    /// period is zero. Every earlier token of the principal is deleted.
    #[tracing::instrument(skip(self, audience), fields(audience_id = %audience.id, principal = %principal))]
    pub async fn issue(&self, principal: Principal, audience: &Audience) -> AuthResult<Token> {
        if principal.is_empty() {
            return Err(AuthError::principal_empty());
        }
        if audience.id.is_empty() {
            return Err(AuthError::audience_id_empty());
        }

        let value = self.scheme.generate_token_string(&audience.id);
        if value.is_empty() {
            return Err(AuthError::internal("signing scheme produced an empty token"));
        }

        let _guard = self.lock(&principal).await;
        let token = Token::new(value, principal, audience.deadline_from(self.now()));
        self.store
            .save_token(&token)
            .await
            .map_err(AuthError::from_storage("save_token"))?;

        tracing::debug!(
            token = token.log_prefix(),
            deadline = token.deadline,
            "Issued token"
        );
        Ok(token)
    }

    /// Resolves the audience by id, then issues a token for `principal`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AudienceNotFound` if no audience is stored under
    /// `audience_id`, plus the errors of [`issue`](Self::issue).
    pub async fn issue_for_audience_id(
        &self,
        principal: Principal,
        audience_id: &str,
    ) -> AuthResult<Token> {
        let audience = self.audience(audience_id).await?;
        self.issue(principal, &audience).await
    }

    // ==================== Validate ====================

    /// Looks a token up and checks that it has not expired.
    ///
    /// An expired token is reported as expired and left in the store.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty value,
    /// `AuthError::TokenNotFound` for unknown values and
    /// `AuthError::TokenExpired` once the deadline has passed.
    pub async fn validate_token(&self, value: &str) -> AuthResult<Token> {
        if value.is_empty() {
            return Err(AuthError::token_empty());
        }
        let token = self
            .store
            .get_token(value)
            .await
            .map_err(AuthError::from_storage("get_token"))?
            .ok_or_else(|| {
                tracing::debug!(token = log_prefix(value), "Token not found");
                AuthError::TokenNotFound
            })?;

        if token.is_expired_at(self.now()) {
            tracing::debug!(
                token = token.log_prefix(),
                deadline = token.deadline,
                "Token expired"
            );
            return Err(AuthError::TokenExpired);
        }
        Ok(token)
    }

    // ==================== Refresh ====================

    /// Writes `token` back to the store, dropping every other token of its
    /// principal.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty value or principal, and
    /// `AuthError::Storage` if the store rejects the token, for example
    /// because it is already expired.
    #[tracing::instrument(skip(self, token), fields(token = token.log_prefix()))]
    pub async fn flush_token(&self, token: &Token) -> AuthResult<()> {
        if token.value.is_empty() {
            return Err(AuthError::token_empty());
        }
        let principal = token.principal();
        if principal.is_empty() {
            return Err(AuthError::principal_empty());
        }

        let _guard = self.lock(&principal).await;
        self.store
            .flush_token(token)
            .await
            .map_err(AuthError::from_storage("flush_token"))
    }

    /// Pushes the deadline of an active token to `now + audience.token_period`.
    ///
    /// The deadline is written under the principal's lock and only if the
    /// token is still stored, so a token superseded after it was read is never
    /// brought back.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`validate_token`](Self::validate_token); an
    /// expired token cannot be extended. A token superseded while extending
    /// yields `AuthError::TokenNotFound`.
    #[tracing::instrument(skip(self, value, audience), fields(token = log_prefix(value)))]
    pub async fn extend_token(&self, value: &str, audience: &Audience) -> AuthResult<Token> {
        let current = self.validate_token(value).await?;
        let deadline = audience.deadline_from(self.now());

        let _guard = self.lock(&current.principal()).await;
        let token = self
            .store
            .refresh_token(value, deadline)
            .await
            .map_err(AuthError::from_storage("refresh_token"))?
            .ok_or_else(|| {
                tracing::debug!("Token superseded before it could be extended");
                AuthError::TokenNotFound
            })?;

        tracing::debug!(deadline = token.deadline, "Extended token");
        Ok(token)
    }

    // ==================== Revoke ====================

    /// Deletes a token. Deleting an unknown token succeeds.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty value and
    /// `AuthError::Storage` if the store fails.
    pub async fn delete_token(&self, value: &str) -> AuthResult<()> {
        if value.is_empty() {
            return Err(AuthError::token_empty());
        }
        self.store
            .delete_token(value)
            .await
            .map_err(AuthError::from_storage("delete_token"))?;
        tracing::debug!(token = log_prefix(value), "Revoked token");
        Ok(())
    }

    /// Removes expired tokens from the store.
    pub async fn delete_expired(&self) -> AuthResult<u64> {
        self.store
            .delete_expired()
            .await
            .map_err(AuthError::from_storage("delete_expired"))
    }

    // ==================== Helpers ====================

    async fn audience(&self, audience_id: &str) -> AuthResult<Audience> {
        if audience_id.is_empty() {
            return Err(AuthError::audience_id_empty());
        }
        self.store
            .get_audience(audience_id)
            .await
            .map_err(AuthError::from_storage("get_audience"))?
            .ok_or_else(|| AuthError::audience_not_found(audience_id))
    }

    async fn lock(&self, principal: &Principal) -> Option<crate::lock::PrincipalGuard> {
        match &self.locks {
            Some(locks) => Some(locks.lock(principal).await),
            None => None,
        }
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("store", &self.store.backend_name())
            .field("clock", &self.clock)
            .field("serializes_writes", &self.serializes_writes())
            .finish_non_exhaustive()
    }
}

/// Builds a manager from loaded settings.
pub fn manager_from_config(
    store: DynTokenStore,
    scheme: DynSigningScheme,
    config: &TokenAuthConfig,
) -> TokenManager {
    TokenManager::new(store, scheme, ManagerConfig::from(config))
}
