//! Audience registration.

use std::fmt;

use tokenauth_storage::{Audience, DynTokenStore, StorageError};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::signing::DynSigningScheme;

/// Creates, reads, updates and deletes audiences.
#[derive(Clone)]
pub struct AudienceService {
    store: DynTokenStore,
    scheme: DynSigningScheme,
}

impl AudienceService {
    pub fn new(store: DynTokenStore, scheme: DynSigningScheme) -> Self {
        Self { store, scheme }
    }

    /// Registers a new audience with a generated id and secret.
    ///
    /// Ids are time-ordered UUIDv7 values in simple (hex) form.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store fails or, with negligible
    /// probability, the generated id is already taken.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, name: &str, token_period: u64) -> AuthResult<Audience> {
        let id = Uuid::now_v7().simple().to_string();

        let existing = self
            .store
            .get_audience(&id)
            .await
            .map_err(AuthError::from_storage("create_audience"))?;
        if existing.is_some() {
            return Err(AuthError::storage(
                "create_audience",
                StorageError::conflict(format!("audience id {id} already exists")),
            ));
        }

        let secret = self.scheme.generate_secret_string(&id);
        let audience = Audience::new(id, name, secret, token_period);
        self.store
            .save_audience(&audience)
            .await
            .map_err(AuthError::from_storage("create_audience"))?;

        tracing::info!(audience_id = %audience.id, "Created audience");
        Ok(audience)
    }

    /// Reads the audience stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty id and
    /// `AuthError::AudienceNotFound` if nothing is stored under it.
    pub async fn get(&self, id: &str) -> AuthResult<Audience> {
        if id.is_empty() {
            return Err(AuthError::audience_id_empty());
        }
        self.store
            .get_audience(id)
            .await
            .map_err(AuthError::from_storage("get_audience"))?
            .ok_or_else(|| AuthError::audience_not_found(id))
    }

    /// Updates the name and token period of an existing audience.
    ///
    /// The stored secret is kept unless `audience.secret` is non-empty.
    /// Returns the audience as stored.
    #[tracing::instrument(skip(self, audience), fields(audience_id = %audience.id))]
    pub async fn update(&self, audience: &Audience) -> AuthResult<Audience> {
        let current = self.get(&audience.id).await?;

        let updated = Audience {
            id: current.id,
            name: audience.name.clone(),
            secret: if audience.secret.is_empty() {
                current.secret
            } else {
                audience.secret.clone()
            },
            token_period: audience.token_period,
        };
        self.store
            .save_audience(&updated)
            .await
            .map_err(AuthError::from_storage("update_audience"))?;

        tracing::info!("Updated audience");
        Ok(updated)
    }

    /// Deletes an audience. Deleting a missing audience succeeds.
    ///
    /// Tokens already issued for the audience stay valid until they expire
    /// or are revoked.
    pub async fn delete(&self, id: &str) -> AuthResult<()> {
        if id.is_empty() {
            return Err(AuthError::audience_id_empty());
        }
        self.store
            .delete_audience(id)
            .await
            .map_err(AuthError::from_storage("delete_audience"))?;
        tracing::info!(audience_id = %id, "Deleted audience");
        Ok(())
    }
}

impl fmt::Debug for AudienceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudienceService")
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}
