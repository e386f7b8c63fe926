//! Backend configuration strings.
//!
//! Backends receive their configuration as one opaque string. The bundled
//! backends use a flat JSON object whose values are strings; bare numbers and
//! booleans are accepted and kept in their JSON text form.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::StorageResult;
use crate::error::StorageError;

/// Parsed `key -> value` pairs of a backend configuration string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatConfig {
    entries: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlatValue {
    Text(String),
    Other(serde_json::Value),
}

impl FlatConfig {
    /// Parses `config` for the backend called `backend`.
    ///
    /// An empty or blank string yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` if `config` is not a JSON object
    /// or holds nested arrays/objects.
    pub fn parse(backend: &str, config: &str) -> StorageResult<Self> {
        if config.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: BTreeMap<String, FlatValue> = serde_json::from_str(config).map_err(|e| {
            StorageError::configuration(format!(
                "{backend} store config is not a JSON object: {e}"
            ))
        })?;

        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            let text = match value {
                FlatValue::Text(text) => text,
                FlatValue::Other(serde_json::Value::Null) => continue,
                FlatValue::Other(v @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                    return Err(StorageError::configuration(format!(
                        "{backend} store config key `{key}` must be a scalar, got {v}"
                    )));
                }
                FlatValue::Other(v) => v.to_string(),
            };
            entries.insert(key, text);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the value of `key` if it is present and not blank.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    /// Parses `key` as an integer, returning `None` when it is absent or not
    /// a number.
    pub fn integer(&self, key: &str) -> Option<i64> {
        self.non_empty(key)?.trim().parse().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_config_is_empty() {
        assert!(FlatConfig::parse("redis", "").unwrap().is_empty());
        assert!(FlatConfig::parse("redis", " \n").unwrap().is_empty());
    }

    #[test]
    fn test_scalars_become_text() {
        let config = FlatConfig::parse(
            "redis",
            r#"{"host":"127.0.0.1:6379","pool_size":20,"tls":true,"auth":null}"#,
        )
        .unwrap();
        assert_eq!(config.get("host"), Some("127.0.0.1:6379"));
        assert_eq!(config.integer("pool_size"), Some(20));
        assert_eq!(config.get("tls"), Some("true"));
        assert_eq!(config.get("auth"), None);
    }

    #[test]
    fn test_non_numeric_integer_is_none() {
        let config = FlatConfig::parse("redis", r#"{"timeout":"soon","db":""}"#).unwrap();
        assert_eq!(config.integer("timeout"), None);
        assert_eq!(config.non_empty("db"), None);
    }

    #[test]
    fn test_rejects_non_objects_and_nesting() {
        let err = FlatConfig::parse("redis", "host=127.0.0.1").unwrap_err();
        assert!(err.to_string().contains("redis store config is not a JSON object"));

        let err = FlatConfig::parse("redis", r#"{"host":["a","b"]}"#).unwrap_err();
        assert!(matches!(err, StorageError::Configuration { .. }));
    }
}
