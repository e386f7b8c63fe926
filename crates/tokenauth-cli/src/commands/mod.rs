pub mod audience;
pub mod sign;
pub mod token;

use anyhow::Result;
use serde_json::{Value, json};
use tokenauth::{Audience, Token, TokenAuth, TokenAuthConfig};

use crate::cli::OutputFormat;
use crate::output::{print_success, print_value};

const REDACTED: &str = "[REDACTED]";

/// Store config keys that carry credentials.
const SECRET_KEYS: [&str; 2] = ["auth", "password"];

fn audience_json(audience: &Audience, reveal_secret: bool) -> Value {
    let secret = if reveal_secret {
        audience.secret.as_str()
    } else {
        REDACTED
    };
    json!({
        "id": audience.id,
        "name": audience.name,
        "secret": secret,
        "token_period": audience.token_period,
    })
}

fn token_json(token: &Token, now: i64) -> Value {
    json!({
        "value": token.value,
        "client_id": token.client_id,
        "single_id": token.single_id,
        "deadline": token.deadline,
        "expires_in": token.ttl_at(now).map(|ttl| ttl.as_secs()),
    })
}

/// Effective configuration with store credentials redacted.
pub fn config_json(config: &TokenAuthConfig) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(store_config) = value.pointer_mut("/store/config") {
        redact_store_config(store_config);
    }
    Ok(value)
}

fn redact_store_config(store_config: &mut Value) {
    match store_config {
        Value::Object(fields) => {
            for key in SECRET_KEYS {
                if let Some(secret) = fields.get_mut(key)
                    && !secret.is_null()
                {
                    *secret = Value::from(REDACTED);
                }
            }
        }
        Value::String(raw) if !raw.is_empty() => {
            *store_config = match serde_json::from_str::<Value>(raw) {
                Ok(mut parsed) if parsed.is_object() => {
                    redact_store_config(&mut parsed);
                    Value::String(parsed.to_string())
                }
                _ => Value::from(REDACTED),
            };
        }
        _ => {}
    }
}

fn sweep_json(removed: u64) -> Value {
    json!({ "removed": removed })
}

pub async fn sweep(auth: &TokenAuth, format: OutputFormat) -> Result<()> {
    let removed = auth.manager().delete_expired().await?;
    print_success(&format!("Removed {removed} expired token(s)"));
    print_value(&sweep_json(removed), format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokenauth::Principal;

    use super::*;
    use crate::output::{render_table, to_toml};

    #[test]
    fn test_audience_secret_is_redacted() {
        let audience = Audience::new("a1", "app", "sk_secret", 60);
        assert_eq!(audience_json(&audience, false)["secret"], REDACTED);
        assert_eq!(audience_json(&audience, true)["secret"], "sk_secret");
    }

    #[test]
    fn test_token_expires_in() {
        let token = Token::new("v", Principal::single("u1"), 1_000);
        assert_eq!(token_json(&token, 900)["expires_in"], 100);

        let forever = Token::new("v", Principal::single("u1"), 0);
        assert!(token_json(&forever, 900)["expires_in"].is_null());
    }

    #[test]
    fn test_config_hides_store_password() {
        let mut config = TokenAuthConfig::default();
        config.store.config = json!({ "host": "cache:6379", "auth": "hunter2" });
        let value = config_json(&config).unwrap();
        assert_eq!(value["store"]["config"]["auth"], REDACTED);
        assert_eq!(value["store"]["config"]["host"], "cache:6379");

        config.store.config = Value::from(r#"{"host":"cache:6379","auth":"hunter2"}"#);
        let value = config_json(&config).unwrap();
        let rendered = value["store"]["config"].as_str().unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("cache:6379"));

        config.store.config = Value::from("not json hunter2");
        let value = config_json(&config).unwrap();
        assert_eq!(value["store"]["config"], REDACTED);
    }

    #[test]
    fn test_sweep_output_in_every_format() {
        let value = sweep_json(3);
        assert_eq!(value, json!({ "removed": 3 }));
        assert!(to_toml(&value).contains("removed = 3"));

        let table = render_table(&value);
        assert!(table.contains("removed"));
        assert!(table.contains('3'));
    }
}
