//! Assembly of store, managers and HTTP options from configuration.

use std::fmt;

use tokenauth_storage::{DynClock, DynTokenStore, StoreRegistry};

use crate::audience::AudienceService;
use crate::config::TokenAuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::http::{HttpOptions, TokenAuthState};
use crate::manager::{ManagerConfig, TokenManager};
use crate::signing::DynSigningScheme;
use crate::sweeper::{Sweeper, SweeperHandle};

/// Everything an application needs to issue and check tokens.
#[derive(Clone)]
pub struct TokenAuth {
    store: DynTokenStore,
    manager: TokenManager,
    audiences: AudienceService,
    http: HttpOptions,
    config: TokenAuthConfig,
}

impl TokenAuth {
    /// Opens the configured store through `registry` and wires the services.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend is unknown or fails to open.
    #[tracing::instrument(skip_all, fields(backend = %config.store.name))]
    pub async fn open(
        registry: &StoreRegistry,
        config: &TokenAuthConfig,
        scheme: DynSigningScheme,
    ) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let store = registry
            .open(&config.store.name, &config.store.config_string())
            .await
            .map_err(AuthError::from_storage("open_store"))?;

        Ok(Self::with_store(store, config, scheme))
    }

    /// Wires the services around an already opened store.
    pub fn with_store(
        store: DynTokenStore,
        config: &TokenAuthConfig,
        scheme: DynSigningScheme,
    ) -> Self {
        let manager = TokenManager::new(store.clone(), scheme.clone(), ManagerConfig::from(config));
        Self {
            audiences: AudienceService::new(store.clone(), scheme),
            store,
            manager,
            http: HttpOptions::from(config),
            config: config.clone(),
        }
    }

    /// Reads time from `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: DynClock) -> Self {
        self.manager = self.manager.with_clock(clock);
        self
    }

    pub fn store(&self) -> &DynTokenStore {
        &self.store
    }

    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    pub fn audiences(&self) -> &AudienceService {
        &self.audiences
    }

    pub fn http_options(&self) -> &HttpOptions {
        &self.http
    }

    /// State for the [`AuthenticatedToken`](crate::http::AuthenticatedToken)
    /// extractor.
    pub fn http_state(&self) -> TokenAuthState {
        TokenAuthState {
            manager: self.manager.clone(),
            options: self.http.clone(),
        }
    }

    /// Starts the expired token sweeper with the configured interval.
    pub fn spawn_sweeper(&self) -> Option<SweeperHandle> {
        Sweeper::spawn(self.store.clone(), self.config.sweep_interval)
    }

    /// Releases the store's resources.
    pub async fn close(&self) -> AuthResult<()> {
        self.store
            .close()
            .await
            .map_err(AuthError::from_storage("close_store"))
    }
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("store", &self.store.backend_name())
            .field("manager", &self.manager)
            .field("http", &self.http)
            .finish_non_exhaustive()
    }
}
