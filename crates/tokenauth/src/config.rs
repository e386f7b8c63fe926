//! Token auth configuration.
//!
//! Settings come from an optional TOML file and `TOKENAUTH__`-prefixed
//! environment variables, the latter taking precedence.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// File read by [`TokenAuthConfig::load`] when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tokenauth.toml";

/// Environment variable prefix, e.g. `TOKENAUTH__STORE__NAME=redis`.
pub const ENV_PREFIX: &str = "TOKENAUTH";

/// Root configuration.
///
/// # Example (TOML)
///
/// ```toml
/// token_period = 7200
/// enable_cookie = true
/// cookie_domain = "example.com"
/// sweep_interval = "5m"
///
/// [store]
/// name = "redis"
/// config = { host = "127.0.0.1:6379", pool_size = "20", timeout = "1" }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TokenAuthConfig {
    /// Token store backend selection.
    pub store: StoreSettings,

    /// Lifetime in seconds of tokens for audiences created without an
    /// explicit period. `0` issues tokens that never expire.
    pub token_period: u64,

    /// Also carry tokens in an `access_token` cookie.
    pub enable_cookie: bool,

    /// Domain attribute of the token cookie.
    pub cookie_domain: Option<String>,

    /// When token issuance is serialized per principal.
    pub serialization: SerializationMode,

    /// How often expired tokens are swept. Zero disables the sweeper.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Include internal error details in error bodies sent to clients.
    /// Meant for development only.
    pub expose_internal_errors: bool,
}

impl Default for TokenAuthConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            token_period: 3600,
            enable_cookie: false,
            cookie_domain: None,
            serialization: SerializationMode::Auto,
            sweep_interval: Duration::from_secs(60),
            expose_internal_errors: false,
        }
    }
}

/// Backend name plus its backend specific configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    /// Registry name of the backend, e.g. `memory`, `redis`, `default`.
    pub name: String,

    /// Backend configuration, either a JSON string or an inline table.
    pub config: serde_json::Value,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            config: serde_json::Value::Null,
        }
    }
}

impl StoreSettings {
    /// The configuration string handed to the backend factory.
    #[must_use]
    pub fn config_string(&self) -> String {
        match &self.config {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// When [`TokenManager`](crate::TokenManager) serializes issuance for a
/// single principal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationMode {
    /// Only when the backend's supersession is best-effort.
    #[default]
    Auto,
    /// Always.
    Always,
    /// Never.
    Never,
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The sources could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl TokenAuthConfig {
    /// Loads the configuration from `path` (or `tokenauth.toml` if present)
    /// and the process environment, then validates it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if an explicit `path` does not exist,
    /// `ConfigError::Load` if a source cannot be parsed, and the errors of
    /// [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Same as [`load`](Self::load) with the environment replaced by `env`
    /// when it is `Some`.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::Missing(format!(
                        "config file {} does not exist",
                        p.display()
                    )));
                }
                builder = builder.add_source(File::from(p));
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g. TOKENAUTH__STORE__NAME=redis
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__")
                .source(env),
        );

        let merged: Self = builder.build()?.try_deserialize()?;
        merged.validate()?;
        tracing::debug!(
            store = %merged.store.name,
            token_period = merged.token_period,
            "Loaded token auth configuration"
        );
        Ok(merged)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no store backend is named, and
    /// `ConfigError::InvalidValue` for a blank cookie domain or a store config
    /// that is neither a string nor a table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.name.trim().is_empty() {
            return Err(ConfigError::Missing("store.name".to_string()));
        }
        match &self.store.config {
            serde_json::Value::Null
            | serde_json::Value::String(_)
            | serde_json::Value::Object(_) => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "store.config must be a string or a table, got {other}"
                )));
            }
        }
        if matches!(&self.cookie_domain, Some(domain) if domain.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "cookie_domain cannot be blank".to_string(),
            ));
        }
        if self.token_period == 0 {
            tracing::warn!("token_period is 0, tokens of new audiences never expire");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = TokenAuthConfig::default();
        assert_eq!(config.store.name, "memory");
        assert_eq!(config.store.config_string(), "");
        assert_eq!(config.token_period, 3600);
        assert_eq!(config.serialization, SerializationMode::Auto);
        assert!(!config.enable_cookie);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_toml(
            r#"
token_period = 120
enable_cookie = true
cookie_domain = "example.com"
serialization = "always"
sweep_interval = "5m"

[store]
name = "redis"
config = '{"host":"127.0.0.1:6379"}'
"#,
        );
        let config =
            TokenAuthConfig::load_with_env(Some(file.path()), Some(HashMap::new())).unwrap();
        assert_eq!(config.store.name, "redis");
        assert_eq!(config.store.config_string(), r#"{"host":"127.0.0.1:6379"}"#);
        assert_eq!(config.token_period, 120);
        assert!(config.enable_cookie);
        assert_eq!(config.cookie_domain.as_deref(), Some("example.com"));
        assert_eq!(config.serialization, SerializationMode::Always);
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_inline_table_store_config() {
        let file = write_toml(
            r#"
[store]
name = "redis"
config = { host = "cache:6379", pool_size = "4" }
"#,
        );
        let config =
            TokenAuthConfig::load_with_env(Some(file.path()), Some(HashMap::new())).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&config.store.config_string()).unwrap();
        assert_eq!(parsed["host"], "cache:6379");
        assert_eq!(parsed["pool_size"], "4");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_toml("token_period = 120\n");
        let env = HashMap::from([
            ("TOKENAUTH__TOKEN_PERIOD".to_string(), "60".to_string()),
            ("TOKENAUTH__STORE__NAME".to_string(), "default".to_string()),
        ]);
        let config = TokenAuthConfig::load_with_env(Some(file.path()), Some(env)).unwrap();
        assert_eq!(config.token_period, 60);
        assert_eq!(config.store.name, "default");
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = TokenAuthConfig::load_with_env(
            Some(Path::new("/definitely/not/here/tokenauth.toml")),
            Some(HashMap::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_validate_rejects_blank_values() {
        let mut config = TokenAuthConfig::default();
        config.store.name = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        let mut config = TokenAuthConfig::default();
        config.cookie_domain = Some(String::new());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let mut config = TokenAuthConfig::default();
        config.store.config = serde_json::json!([1, 2]);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }
}
