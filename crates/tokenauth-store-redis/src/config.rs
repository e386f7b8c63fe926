//! Redis store configuration.

use std::time::Duration;

use tokenauth_storage::{FlatConfig, StorageError, StorageResult};
use url::Url;

/// Pool size used when `pool_size` is missing or not positive.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Pool timeout used when `timeout` is missing or not positive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Key prefix used when `prefix` is missing.
pub const DEFAULT_PREFIX: &str = "tokenauth:";

/// Connection settings for [`RedisTokenStore`](crate::RedisTokenStore).
///
/// Parsed from a flat JSON object:
///
/// ```json
/// {"host": "127.0.0.1:6379", "auth": "secret", "pool_size": "10", "timeout": "1", "db": "0"}
/// ```
///
/// `host` is required. `timeout` is in seconds and bounds every Redis command
/// as well as waiting for, creating and recycling pooled connections.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisStoreConfig {
    pub host: String,
    pub auth: Option<String>,
    pub pool_size: usize,
    pub timeout: Duration,
    pub db: Option<u32>,
    pub prefix: String,
}

impl RedisStoreConfig {
    /// Creates a config for `host` with every other setting at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            auth: None,
            pool_size: DEFAULT_POOL_SIZE,
            timeout: DEFAULT_TIMEOUT,
            db: None,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Parses the store configuration string.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` if the string is empty, not a
    /// JSON object, lacks `host`, or has a `db` that is not a database index.
    pub fn parse(config: &str) -> StorageResult<Self> {
        if config.trim().is_empty() {
            return Err(StorageError::configuration("redis store config is empty"));
        }
        let flat = FlatConfig::parse("redis", config)?;

        let host = flat
            .non_empty("host")
            .ok_or_else(|| StorageError::configuration("redis store config is missing `host`"))?;

        let mut parsed = Self::new(host.trim());
        parsed.auth = flat.non_empty("auth").map(str::to_string);

        if let Some(size) = flat.integer("pool_size").filter(|size| *size > 0) {
            parsed.pool_size = usize::try_from(size).unwrap_or(DEFAULT_POOL_SIZE);
        }
        if let Some(secs) = flat.integer("timeout").filter(|secs| *secs > 0) {
            parsed.timeout = Duration::from_secs(secs.unsigned_abs());
        }
        if let Some(raw) = flat.non_empty("db") {
            let db = raw.trim().parse::<u32>().map_err(|_| {
                StorageError::configuration(format!(
                    "redis store `db` must be a database index, got `{raw}`"
                ))
            })?;
            parsed.db = Some(db);
        }
        if let Some(prefix) = flat.get("prefix") {
            parsed.prefix = prefix.to_string();
        }

        Ok(parsed)
    }

    /// Builds the connection URL handed to the pool.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` if `host` does not form a valid
    /// URL.
    pub fn connection_url(&self) -> StorageResult<String> {
        let raw = if self.host.starts_with("redis://") || self.host.starts_with("rediss://") {
            self.host.clone()
        } else {
            format!("redis://{}", self.host)
        };
        let mut url = Url::parse(&raw).map_err(|e| {
            StorageError::configuration(format!("invalid redis host `{}`: {e}", self.host))
        })?;

        if let Some(auth) = &self.auth {
            url.set_password(Some(auth)).map_err(|()| {
                StorageError::configuration(format!(
                    "redis host `{}` cannot carry a password",
                    self.host
                ))
            })?;
        }
        if let Some(db) = self.db {
            url.set_path(&format!("/{db}"));
        }
        Ok(url.to_string())
    }

    pub(crate) fn token_key(&self, value: &str) -> String {
        format!("{}token:{value}", self.prefix)
    }

    pub(crate) fn principal_key(&self, index_key: &str) -> String {
        format!("{}principal:{index_key}", self.prefix)
    }

    pub(crate) fn audience_key(&self, id: &str) -> String {
        format!("{}audience:{id}", self.prefix)
    }
}

impl std::fmt::Debug for RedisStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStoreConfig")
            .field("host", &self.host)
            .field("auth", &self.auth.as_ref().map(|_| "[REDACTED]"))
            .field("pool_size", &self.pool_size)
            .field("timeout", &self.timeout)
            .field("db", &self.db)
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_host_is_configuration_error() {
        let err = RedisStoreConfig::parse(r#"{"auth":"pw"}"#).unwrap_err();
        assert!(matches!(err, StorageError::Configuration { .. }));
        assert!(err.to_string().contains("host"));

        let err = RedisStoreConfig::parse("").unwrap_err();
        assert!(matches!(err, StorageError::Configuration { .. }));
    }

    #[test]
    fn test_defaults() {
        let config = RedisStoreConfig::parse(r#"{"host":"127.0.0.1:6379"}"#).unwrap();
        assert_eq!(config.host, "127.0.0.1:6379");
        assert_eq!(config.auth, None);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.db, None);
        assert_eq!(config.prefix, DEFAULT_PREFIX);
    }

    #[test]
    fn test_non_positive_values_fall_back_to_defaults() {
        let config = RedisStoreConfig::parse(
            r#"{"host":"h:1","pool_size":"0","timeout":"-3"}"#,
        )
        .unwrap();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        let config =
            RedisStoreConfig::parse(r#"{"host":"h:1","pool_size":"abc","timeout":""}"#).unwrap();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_explicit_values() {
        let config = RedisStoreConfig::parse(
            r#"{"host":"cache:6380","auth":"pw","pool_size":"25","timeout":"2","db":"3","prefix":"app:"}"#,
        )
        .unwrap();
        assert_eq!(config.auth.as_deref(), Some("pw"));
        assert_eq!(config.pool_size, 25);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.db, Some(3));
        assert_eq!(config.token_key("abc"), "app:token:abc");
        assert_eq!(config.audience_key("a1"), "app:audience:a1");
    }

    #[test]
    fn test_invalid_db_rejected() {
        let err = RedisStoreConfig::parse(r#"{"host":"h:1","db":"first"}"#).unwrap_err();
        assert!(matches!(err, StorageError::Configuration { .. }));
    }

    #[test]
    fn test_connection_url() {
        let mut config = RedisStoreConfig::new("127.0.0.1:6379");
        assert_eq!(config.connection_url().unwrap(), "redis://127.0.0.1:6379");

        config.auth = Some("pw".to_string());
        config.db = Some(2);
        assert_eq!(config.connection_url().unwrap(), "redis://:pw@127.0.0.1:6379/2");

        let config = RedisStoreConfig::new("redis://cache:6379");
        assert_eq!(config.connection_url().unwrap(), "redis://cache:6379");
    }

    #[test]
    fn test_debug_redacts_auth() {
        let mut config = RedisStoreConfig::new("h:1");
        config.auth = Some("hunter2".to_string());
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
