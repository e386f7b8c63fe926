//! Shared data types persisted by every token store.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of characters of a token value that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

/// A registered client application that tokens are issued for.
///
/// The `token_period` is the lifetime in seconds of every token issued for
/// this audience. A period of `0` means issued tokens never expire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    /// Unique, non-empty identifier.
    pub id: String,
    /// Human readable name.
    #[serde(default)]
    pub name: String,
    /// Shared secret used for request signing.
    #[serde(default)]
    pub secret: String,
    /// Token lifetime in seconds, `0` for tokens that never expire.
    #[serde(default)]
    pub token_period: u64,
}

impl Audience {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        secret: impl Into<String>,
        token_period: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            secret: secret.into(),
            token_period,
        }
    }

    /// Returns `true` when tokens issued for this audience never expire.
    #[must_use]
    pub fn never_expires(&self) -> bool {
        self.token_period == 0
    }

    /// Computes the deadline of a token issued at `now`.
    ///
    /// Returns `0` (no deadline) for audiences with a zero token period.
    #[must_use]
    pub fn deadline_from(&self, now: i64) -> i64 {
        if self.never_expires() {
            return 0;
        }
        let period = i64::try_from(self.token_period).unwrap_or(i64::MAX);
        now.saturating_add(period)
    }
}

impl fmt::Debug for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audience")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("secret", &"[REDACTED]")
            .field("token_period", &self.token_period)
            .finish()
    }
}

/// The identity a token is bound to.
///
/// A principal is either a client (`client_id` set, `single_id` empty) or a
/// single user (`single_id` set). At most one live token exists per
/// principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub client_id: String,
    pub single_id: String,
}

impl Principal {
    pub fn new(client_id: impl Into<String>, single_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            single_id: single_id.into(),
        }
    }

    /// A principal identified by a client ID only.
    pub fn client(client_id: impl Into<String>) -> Self {
        Self::new(client_id, String::new())
    }

    /// A principal identified by a single (user) ID only.
    pub fn single(single_id: impl Into<String>) -> Self {
        Self::new(String::new(), single_id)
    }

    /// Returns `true` if neither identifier is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.client_id.is_empty() && self.single_id.is_empty()
    }

    /// Stable key identifying this principal inside a backend index.
    ///
    /// The client ID is length prefixed so that no two distinct principals
    /// map to the same key.
    #[must_use]
    pub fn index_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.client_id.len(),
            self.client_id,
            self.single_id
        )
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.client_id.is_empty(), self.single_id.is_empty()) {
            (false, true) => write!(f, "client:{}", self.client_id),
            (true, false) => write!(f, "single:{}", self.single_id),
            _ => write!(f, "client:{}/single:{}", self.client_id, self.single_id),
        }
    }
}

/// A bearer token bound to a principal.
///
/// `deadline` is a unix timestamp in seconds; `0` means the token never
/// expires.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The opaque bearer string, unique and non-empty.
    pub value: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub single_id: String,
    /// Expiry as unix seconds, `0` for tokens that never expire.
    #[serde(default)]
    pub deadline: i64,
}

impl Token {
    pub fn new(value: impl Into<String>, principal: Principal, deadline: i64) -> Self {
        Self {
            value: value.into(),
            client_id: principal.client_id,
            single_id: principal.single_id,
            deadline,
        }
    }

    /// The principal this token is bound to.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal::new(self.client_id.clone(), self.single_id.clone())
    }

    /// Returns `true` if the token never expires.
    #[must_use]
    pub fn never_expires(&self) -> bool {
        self.deadline == 0
    }

    /// Returns `true` if the token is expired at the given unix time.
    ///
    /// A token whose deadline equals `now` is already expired.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.deadline != 0 && self.deadline <= now
    }

    /// Remaining lifetime at `now`.
    ///
    /// Returns `None` for tokens that never expire and `Duration::ZERO` for
    /// tokens that are already expired.
    #[must_use]
    pub fn ttl_at(&self, now: i64) -> Option<Duration> {
        if self.never_expires() {
            return None;
        }
        let remaining = self.deadline.saturating_sub(now).max(0);
        Some(Duration::from_secs(remaining.unsigned_abs()))
    }

    /// A short prefix of the token value, safe to emit in logs.
    #[must_use]
    pub fn log_prefix(&self) -> &str {
        log_prefix(&self.value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &format_args!("{}...", self.log_prefix()))
            .field("client_id", &self.client_id)
            .field("single_id", &self.single_id)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Returns a short prefix of a raw token value for logging.
#[must_use]
pub fn log_prefix(value: &str) -> &str {
    let end = value
        .char_indices()
        .nth(LOG_PREFIX_LEN)
        .map_or(value.len(), |(idx, _)| idx);
    &value[..end]
}

/// How strongly a backend guarantees single-token-per-principal under
/// concurrent saves for the same principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    /// Supersession and write happen as one indivisible step.
    Atomic,
    /// Concurrent saves for one principal may leave more than one live token.
    BestEffort,
}

impl Consistency {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::BestEffort => "best_effort",
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let token = Token::new("abc", Principal::client("c1"), 100);
        assert!(!token.is_expired_at(99));
        assert!(token.is_expired_at(100));
        assert!(token.is_expired_at(101));
    }

    #[test]
    fn test_zero_deadline_never_expires() {
        let token = Token::new("abc", Principal::single("u1"), 0);
        assert!(token.never_expires());
        assert!(!token.is_expired_at(i64::MAX));
        assert_eq!(token.ttl_at(1_000), None);
    }

    #[test]
    fn test_ttl() {
        let token = Token::new("abc", Principal::client("c1"), 1_060);
        assert_eq!(token.ttl_at(1_000), Some(Duration::from_secs(60)));
        assert_eq!(token.ttl_at(2_000), Some(Duration::ZERO));
    }

    #[test]
    fn test_audience_deadline() {
        let audience = Audience::new("a1", "app", "sk_x", 3600);
        assert_eq!(audience.deadline_from(1_000), 4_600);

        let forever = Audience::new("a2", "app", "sk_x", 0);
        assert!(forever.never_expires());
        assert_eq!(forever.deadline_from(1_000), 0);
    }

    #[test]
    fn test_principal_index_key_is_unambiguous() {
        let a = Principal::new("a:b", "");
        let b = Principal::new("a", "b:");
        assert_ne!(a.index_key(), b.index_key());
        assert_ne!(
            Principal::client("u1").index_key(),
            Principal::single("u1").index_key()
        );
    }

    #[test]
    fn test_principal_display() {
        assert_eq!(Principal::client("c1").to_string(), "client:c1");
        assert_eq!(Principal::single("u1").to_string(), "single:u1");
        assert!(Principal::new("", "").is_empty());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let audience = Audience::new("a1", "app", "sk_supersecret", 60);
        let rendered = format!("{audience:?}");
        assert!(!rendered.contains("supersecret"));

        let token = Token::new("0123456789abcdef", Principal::client("c1"), 0);
        let rendered = format!("{token:?}");
        assert!(rendered.contains("01234567..."));
        assert!(!rendered.contains("0123456789abcdef"));
    }

    #[test]
    fn test_token_json_shape() {
        let token = Token::new("v", Principal::client("c1"), 42);
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"value": "v", "client_id": "c1", "single_id": "", "deadline": 42})
        );
    }
}
