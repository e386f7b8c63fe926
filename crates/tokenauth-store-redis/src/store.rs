//! Redis implementation of the token store.
//!
//! ## Key layout
//!
//! | Key | Type | Content |
//! |-----|------|---------|
//! | `{prefix}token:{value}` | string | token JSON, TTL = `deadline - now` |
//! | `{prefix}principal:{index}` | hash | token value -> issue time |
//! | `{prefix}audience:{id}` | string | audience JSON, no TTL |
//!
//! Every command, including the `MULTI`/`EXEC` pipeline, is bounded by the
//! configured `timeout`. The pool applies the same value to waiting for,
//! creating and recycling connections.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolConfig, Runtime};
use redis::{AsyncCommands, RedisError, RedisResult};
use tokenauth_storage::{
    Audience, Consistency, DynClock, StorageError, StorageResult, Token, TokenStore,
    system_clock, validate_audience_for_save, validate_audience_id, validate_token_for_save,
};

use crate::config::RedisStoreConfig;

/// Token store backed by a Redis connection pool.
///
/// Expiry is native: token keys carry a TTL and disappear on their own, so
/// [`TokenStore::delete_expired`] has nothing to do.
///
/// Saving reads the principal index first and then replaces it inside one
/// `MULTI`/`EXEC` pipeline. Two saves racing for the same principal can both
/// read the old index and leave two live tokens, hence
/// [`Consistency::BestEffort`].
pub struct RedisTokenStore {
    pool: Pool,
    config: RedisStoreConfig,
    clock: DynClock,
    closed: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Drop every indexed token, then write.
    Replace,
    /// Drop every indexed token except the one being written.
    Flush,
}

impl WriteMode {
    fn operation(self) -> &'static str {
        match self {
            Self::Replace => "save_token",
            Self::Flush => "flush_token",
        }
    }
}

impl RedisTokenStore {
    /// Creates the pool and verifies connectivity with `PING`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` if the pool cannot be built and
    /// `StorageError::Connection` if Redis does not answer.
    pub async fn connect(config: RedisStoreConfig) -> StorageResult<Self> {
        Self::connect_with_clock(config, system_clock()).await
    }

    pub async fn connect_with_clock(
        config: RedisStoreConfig,
        clock: DynClock,
    ) -> StorageResult<Self> {
        tracing::info!(
            host = %config.host,
            pool_size = config.pool_size,
            timeout_ms = config.timeout.as_millis() as u64,
            "Connecting to Redis token store"
        );

        let mut redis_config = deadpool_redis::Config::from_url(config.connection_url()?);
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(config.timeout);
        pool_config.timeouts.create = Some(config.timeout);
        pool_config.timeouts.recycle = Some(config.timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::configuration(format!("failed to create redis pool: {e}")))?;

        let store = Self {
            pool,
            config,
            clock,
            closed: AtomicBool::new(false),
        };

        let mut conn = store.connection("connect").await?;
        let _: String = store
            .bounded("connect", redis::cmd("PING").query_async(&mut conn))
            .await?;

        tracing::info!("Connected to Redis token store");
        Ok(store)
    }

    pub fn config(&self) -> &RedisStoreConfig {
        &self.config
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        command: impl Future<Output = RedisResult<T>>,
    ) -> StorageResult<T> {
        bounded(self.config.timeout, operation, command).await
    }

    async fn connection(&self, operation: &'static str) -> StorageResult<Connection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::connection(operation, "redis store is closed"));
        }
        self.pool.get().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "Failed to get Redis connection");
            StorageError::connection(operation, e.to_string())
        })
    }

    async fn write_token(&self, token: &Token, mode: WriteMode) -> StorageResult<()> {
        let operation = mode.operation();
        let now = self.clock.now_unix();
        validate_token_for_save(token, now)?;

        let payload = serde_json::to_string(token)?;
        let token_key = self.config.token_key(&token.value);
        let index_key = self.config.principal_key(&token.principal().index_key());

        let mut conn = self.connection(operation).await?;
        let indexed: Vec<String> = self.bounded(operation, conn.hkeys(&index_key)).await?;

        let superseded: Vec<&String> = indexed
            .iter()
            .filter(|value| mode == WriteMode::Replace || **value != token.value)
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for value in &superseded {
            if **value != token.value {
                pipe.del(self.config.token_key(value)).ignore();
            }
        }
        match mode {
            WriteMode::Replace => {
                pipe.del(&index_key).ignore();
            }
            WriteMode::Flush => {
                for value in &superseded {
                    pipe.hdel(&index_key, value.as_str()).ignore();
                }
            }
        }
        pipe.hset(&index_key, &token.value, now).ignore();

        match token.ttl_at(now) {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                pipe.set_ex(&token_key, payload, secs).ignore();
                pipe.expire(&index_key, i64::try_from(secs).unwrap_or(i64::MAX))
                    .ignore();
            }
            None => {
                pipe.set(&token_key, payload).ignore();
                pipe.persist(&index_key).ignore();
            }
        }

        let _: () = self
            .bounded(operation, pipe.query_async(&mut conn))
            .await?;

        tracing::debug!(
            operation,
            token = token.log_prefix(),
            superseded = superseded.len(),
            "Stored token"
        );
        Ok(())
    }
}

impl std::fmt::Debug for RedisTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTokenStore")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn save_audience(&self, audience: &Audience) -> StorageResult<()> {
        validate_audience_for_save(audience)?;
        let payload = serde_json::to_string(audience)?;
        let mut conn = self.connection("save_audience").await?;
        let key = self.config.audience_key(&audience.id);
        let _: () = self
            .bounded("save_audience", conn.set(key, payload))
            .await?;
        Ok(())
    }

    async fn get_audience(&self, id: &str) -> StorageResult<Option<Audience>> {
        validate_audience_id(id)?;
        let mut conn = self.connection("get_audience").await?;
        let key = self.config.audience_key(id);
        let raw: Option<String> = self.bounded("get_audience", conn.get(key)).await?;
        Ok(raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?)
    }

    async fn delete_audience(&self, id: &str) -> StorageResult<()> {
        validate_audience_id(id)?;
        let mut conn = self.connection("delete_audience").await?;
        let key = self.config.audience_key(id);
        let _: () = self.bounded("delete_audience", conn.del(key)).await?;
        Ok(())
    }

    async fn save_token(&self, token: &Token) -> StorageResult<()> {
        self.write_token(token, WriteMode::Replace).await
    }

    async fn get_token(&self, value: &str) -> StorageResult<Option<Token>> {
        let mut conn = self.connection("get_token").await?;
        let key = self.config.token_key(value);
        let raw: Option<String> = self.bounded("get_token", conn.get(key)).await?;
        Ok(raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?)
    }

    async fn delete_token(&self, value: &str) -> StorageResult<()> {
        if value.is_empty() {
            return Err(StorageError::invalid_input("token value is empty"));
        }
        let Some(token) = self.get_token(value).await? else {
            return Ok(());
        };

        let mut conn = self.connection("delete_token").await?;
        let index_key = self.config.principal_key(&token.principal().index_key());
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.config.token_key(value))
            .ignore()
            .hdel(&index_key, value)
            .ignore();
        let _: () = self
            .bounded("delete_token", pipe.query_async(&mut conn))
            .await?;

        tracing::debug!(token = token.log_prefix(), "Deleted token");
        Ok(())
    }

    async fn flush_token(&self, token: &Token) -> StorageResult<()> {
        self.write_token(token, WriteMode::Flush).await
    }

    async fn delete_expired(&self) -> StorageResult<u64> {
        Ok(0)
    }

    async fn close(&self) -> StorageResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.pool.close();
            tracing::info!("Closed Redis token store");
        }
        Ok(())
    }

    fn consistency(&self) -> Consistency {
        Consistency::BestEffort
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Runs one Redis command, failing with a connection error once `timeout`
/// elapses.
async fn bounded<T>(
    timeout: Duration,
    operation: &'static str,
    command: impl Future<Output = RedisResult<T>>,
) -> StorageResult<T> {
    match tokio::time::timeout(timeout, command).await {
        Ok(result) => result.map_err(redis_error(operation)),
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Redis command timed out"
            );
            Err(StorageError::connection(operation, "timed out"))
        }
    }
}

/// Maps a Redis error to a storage error for `operation`.
fn redis_error(operation: &'static str) -> impl Fn(RedisError) -> StorageError {
    move |e| {
        tracing::warn!(operation, error = %e, "Redis command failed");
        if e.is_io_error() || e.is_connection_refusal() || e.is_timeout() || e.is_connection_dropped()
        {
            StorageError::connection(operation, e.to_string())
        } else {
            StorageError::internal(operation, e.to_string())
        }
    }
}
