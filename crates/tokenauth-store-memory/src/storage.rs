use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokenauth_storage::{
    Audience, Consistency, DynClock, StorageError, StorageResult, Token, TokenStore,
    system_clock, validate_audience_for_save, validate_audience_id, validate_token_for_save,
};
use tokio::sync::RwLock;

use crate::factory::MemoryStoreOptions;

/// In-memory token store.
///
/// All state sits behind one write lock, so reading the principal index,
/// removing superseded tokens and inserting the new token happen as a single
/// step. Expired tokens stay in memory until [`TokenStore::delete_expired`]
/// runs.
#[derive(Debug)]
pub struct MemoryTokenStore {
    state: RwLock<MemoryState>,
    clock: DynClock,
    closed: AtomicBool,
}

#[derive(Debug, Default)]
struct MemoryState {
    audiences: HashMap<String, Audience>,
    /// Token value -> token
    tokens: HashMap<String, Token>,
    /// Principal index key -> token values
    principals: HashMap<String, HashSet<String>>,
}

impl MemoryState {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            audiences: HashMap::new(),
            tokens: HashMap::with_capacity(capacity),
            principals: HashMap::with_capacity(capacity),
        }
    }

    /// Removes every token indexed under `index_key` except `keep`.
    fn drop_principal_tokens(&mut self, index_key: &str, keep: Option<&str>) -> usize {
        let Some(values) = self.principals.get_mut(index_key) else {
            return 0;
        };
        let stale: Vec<String> = values
            .iter()
            .filter(|value| Some(value.as_str()) != keep)
            .cloned()
            .collect();
        for value in &stale {
            values.remove(value);
            self.tokens.remove(value);
        }
        if values.is_empty() {
            self.principals.remove(index_key);
        }
        stale.len()
    }

    fn insert_token(&mut self, token: &Token) {
        let rebound = self
            .tokens
            .get(&token.value)
            .is_some_and(|previous| previous.principal() != token.principal());
        if rebound {
            self.remove_token(&token.value);
        }
        self.principals
            .entry(token.principal().index_key())
            .or_default()
            .insert(token.value.clone());
        self.tokens.insert(token.value.clone(), token.clone());
    }

    fn remove_token(&mut self, value: &str) -> Option<Token> {
        let token = self.tokens.remove(value)?;
        let index_key = token.principal().index_key();
        if let Some(values) = self.principals.get_mut(&index_key) {
            values.remove(value);
            if values.is_empty() {
                self.principals.remove(&index_key);
            }
        }
        Some(token)
    }
}

impl MemoryTokenStore {
    /// Creates a new in-memory store with default options.
    pub fn new() -> Self {
        Self::with_options(MemoryStoreOptions::default(), system_clock())
    }

    /// Creates a store that reads time from `clock`.
    pub fn with_clock(clock: DynClock) -> Self {
        Self::with_options(MemoryStoreOptions::default(), clock)
    }

    pub fn with_options(options: MemoryStoreOptions, clock: DynClock) -> Self {
        let state = options
            .preallocate_tokens
            .map_or_else(MemoryState::default, MemoryState::with_capacity);
        Self {
            state: RwLock::new(state),
            clock,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of tokens held, including expired ones not yet swept.
    pub async fn token_count(&self) -> usize {
        self.state.read().await.tokens.len()
    }

    /// Number of principals with at least one stored token.
    pub async fn principal_count(&self) -> usize {
        self.state.read().await.principals.len()
    }

    fn ensure_open(&self, operation: &'static str) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::connection(operation, "memory store is closed"));
        }
        Ok(())
    }

    async fn write_token(
        &self,
        token: &Token,
        operation: &'static str,
        keep_self: bool,
    ) -> StorageResult<()> {
        self.ensure_open(operation)?;
        validate_token_for_save(token, self.clock.now_unix())?;

        let index_key = token.principal().index_key();
        let keep = keep_self.then_some(token.value.as_str());

        let mut state = self.state.write().await;
        let superseded = state.drop_principal_tokens(&index_key, keep);
        state.insert_token(token);
        drop(state);

        tracing::debug!(
            operation,
            token = token.log_prefix(),
            superseded,
            "Stored token"
        );
        Ok(())
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save_audience(&self, audience: &Audience) -> StorageResult<()> {
        self.ensure_open("save_audience")?;
        validate_audience_for_save(audience)?;
        self.state
            .write()
            .await
            .audiences
            .insert(audience.id.clone(), audience.clone());
        Ok(())
    }

    async fn get_audience(&self, id: &str) -> StorageResult<Option<Audience>> {
        self.ensure_open("get_audience")?;
        validate_audience_id(id)?;
        Ok(self.state.read().await.audiences.get(id).cloned())
    }

    async fn delete_audience(&self, id: &str) -> StorageResult<()> {
        self.ensure_open("delete_audience")?;
        validate_audience_id(id)?;
        self.state.write().await.audiences.remove(id);
        Ok(())
    }

    async fn save_token(&self, token: &Token) -> StorageResult<()> {
        self.write_token(token, "save_token", false).await
    }

    async fn get_token(&self, value: &str) -> StorageResult<Option<Token>> {
        self.ensure_open("get_token")?;
        Ok(self.state.read().await.tokens.get(value).cloned())
    }

    async fn delete_token(&self, value: &str) -> StorageResult<()> {
        self.ensure_open("delete_token")?;
        if value.is_empty() {
            return Err(StorageError::invalid_input("token value is empty"));
        }
        self.state.write().await.remove_token(value);
        Ok(())
    }

    async fn flush_token(&self, token: &Token) -> StorageResult<()> {
        self.write_token(token, "flush_token", true).await
    }

    async fn refresh_token(&self, value: &str, deadline: i64) -> StorageResult<Option<Token>> {
        self.ensure_open("refresh_token")?;
        let now = self.clock.now_unix();

        let mut state = self.state.write().await;
        let Some(stored) = state.tokens.get_mut(value) else {
            return Ok(None);
        };
        let mut refreshed = stored.clone();
        refreshed.deadline = deadline;
        validate_token_for_save(&refreshed, now)?;
        *stored = refreshed.clone();
        drop(state);

        tracing::debug!(token = refreshed.log_prefix(), deadline, "Refreshed token");
        Ok(Some(refreshed))
    }

    async fn delete_expired(&self) -> StorageResult<u64> {
        self.ensure_open("delete_expired")?;
        let now = self.clock.now_unix();

        let mut state = self.state.write().await;
        let expired: Vec<String> = state
            .tokens
            .values()
            .filter(|token| token.is_expired_at(now))
            .map(|token| token.value.clone())
            .collect();
        for value in &expired {
            state.remove_token(value);
        }
        drop(state);

        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "Swept expired tokens");
        }
        Ok(expired.len() as u64)
    }

    async fn close(&self) -> StorageResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Closed memory token store");
        }
        Ok(())
    }

    fn consistency(&self) -> Consistency {
        Consistency::Atomic
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
