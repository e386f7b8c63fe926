//! Token value and audience secret generation.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

/// Prefix of secrets produced by [`DefaultScheme`].
pub const SECRET_PREFIX: &str = "sk_";

/// Random bytes behind every generated token and secret.
const RANDOM_BYTES: usize = 32;

/// Produces token values and audience secrets.
///
/// Both functions must be safe to call from many tasks at once, and token
/// values must be unique with overwhelming probability.
pub trait SigningScheme: Send + Sync {
    /// Generates a new opaque token value for a token of `audience_id`.
    fn generate_token_string(&self, audience_id: &str) -> String;

    /// Generates a new shared secret for the audience `audience_id`.
    fn generate_secret_string(&self, audience_id: &str) -> String;
}

/// Shareable signing scheme handle.
pub type DynSigningScheme = Arc<dyn SigningScheme>;

/// Random tokens and secrets from the thread-local CSPRNG.
///
/// Tokens are 256-bit values encoded as base64url without padding
/// (43 characters). Secrets are 256-bit values, hex encoded and prefixed
/// with `sk_`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultScheme;

impl SigningScheme for DefaultScheme {
    fn generate_token_string(&self, _audience_id: &str) -> String {
        generate_token()
    }

    fn generate_secret_string(&self, _audience_id: &str) -> String {
        generate_secret()
    }
}

/// Generate a cryptographically secure random token.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a cryptographically secure audience secret.
#[must_use]
pub fn generate_secret() -> String {
    let bytes: [u8; RANDOM_BYTES] = rand::thread_rng().r#gen();
    format!("{SECRET_PREFIX}{}", hex::encode(bytes))
}

/// A scheme built from two closures.
///
/// ```ignore
/// let scheme = FnScheme::new(
///     |aud| format!("{aud}.{}", tokenauth::signing::generate_token()),
///     |_| tokenauth::signing::generate_secret(),
/// );
/// ```
pub struct FnScheme<T, S> {
    token: T,
    secret: S,
}

impl<T, S> FnScheme<T, S>
where
    T: Fn(&str) -> String + Send + Sync,
    S: Fn(&str) -> String + Send + Sync,
{
    pub fn new(token: T, secret: S) -> Self {
        Self { token, secret }
    }
}

impl<T, S> SigningScheme for FnScheme<T, S>
where
    T: Fn(&str) -> String + Send + Sync,
    S: Fn(&str) -> String + Send + Sync,
{
    fn generate_token_string(&self, audience_id: &str) -> String {
        (self.token)(audience_id)
    }

    fn generate_secret_string(&self, audience_id: &str) -> String {
        (self.secret)(audience_id)
    }
}

impl<T, S> fmt::Debug for FnScheme<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnScheme").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_default_token_shape() {
        let token = DefaultScheme.generate_token_string("aud");
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_default_secret_shape() {
        let secret = DefaultScheme.generate_secret_string("aud");
        let hex_part = secret.strip_prefix(SECRET_PREFIX).unwrap();
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_fn_scheme_receives_audience_id() {
        let scheme = FnScheme::new(|aud: &str| format!("tok-{aud}"), |aud: &str| format!("sec-{aud}"));
        assert_eq!(scheme.generate_token_string("a1"), "tok-a1");
        assert_eq!(scheme.generate_secret_string("a1"), "sec-a1");

        let shared: DynSigningScheme = Arc::new(scheme);
        assert_eq!(shared.generate_token_string("a2"), "tok-a2");
    }
}
