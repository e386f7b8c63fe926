//! Request signatures keyed by an audience secret.
//!
//! A signed request carries its parameters plus a `sign` field. The
//! signature is computed over the canonical form of the parameters:
//!
//! 1. drop the signature field (and `sign_type` when configured) and every
//!    parameter with an empty value
//! 2. sort the remaining pairs by key, byte-wise
//! 3. join them as `key=value` with `&`
//! 4. append the audience secret and hash with SHA-256
//!
//! The digest is sent as lowercase hex and compared in constant time.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tokenauth_storage::Audience;

use crate::error::{AuthError, AuthResult, codes};

/// Default name of the parameter holding the signature.
pub const SIGN_FIELD: &str = "sign";

/// Name of the optional parameter naming the signature algorithm.
pub const SIGN_TYPE_FIELD: &str = "sign_type";

/// Request parameters in canonical (sorted) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignableParams {
    params: BTreeMap<String, String>,
}

impl SignableParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `application/x-www-form-urlencoded` query or form body.
    ///
    /// When a key repeats, the last value wins.
    pub fn from_query(query: &str) -> Self {
        url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .into_owned()
            .collect()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for SignableParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Signs and verifies request parameters.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    signature_field: String,
    exclude_sign_type: bool,
}

impl Default for RequestSigner {
    fn default() -> Self {
        Self {
            signature_field: SIGN_FIELD.to_string(),
            exclude_sign_type: false,
        }
    }
}

impl RequestSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the signature from `field` instead of `sign`.
    #[must_use]
    pub fn with_signature_field(mut self, field: impl Into<String>) -> Self {
        self.signature_field = field.into();
        self
    }

    /// Leaves `sign_type` out of the canonical string.
    #[must_use]
    pub fn exclude_sign_type(mut self, exclude: bool) -> Self {
        self.exclude_sign_type = exclude;
        self
    }

    pub fn signature_field(&self) -> &str {
        &self.signature_field
    }

    fn is_signable(&self, key: &str, value: &str) -> bool {
        !value.is_empty()
            && key != self.signature_field
            && !(self.exclude_sign_type && key == SIGN_TYPE_FIELD)
    }

    /// Builds the canonical `k1=v1&k2=v2` string of the signable parameters.
    pub fn canonicalize(&self, params: &SignableParams) -> String {
        params
            .iter()
            .filter(|(k, v)| self.is_signable(k, v))
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Computes the lowercase hex signature of `params` under `secret`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signature` if `secret` is empty or no parameter
    /// is signable.
    pub fn sign(&self, params: &SignableParams, secret: &str) -> AuthResult<String> {
        if secret.is_empty() {
            return Err(AuthError::signature(
                codes::SECRET_MISSING,
                "Audience secret is empty",
            ));
        }
        let canonical = self.canonicalize(params);
        if canonical.is_empty() {
            return Err(AuthError::signature(
                codes::NO_SIGNABLE_PARAMS,
                "No parameters to sign",
            ));
        }
        Ok(digest(&canonical, secret))
    }

    /// Checks the signature carried in `params` against `secret`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signature` if the signature is missing or does
    /// not match, and the errors of [`sign`](Self::sign).
    pub fn verify(&self, params: &SignableParams, secret: &str) -> AuthResult<()> {
        let supplied = params
            .get(&self.signature_field)
            .filter(|sig| !sig.is_empty())
            .ok_or_else(|| AuthError::signature(codes::SIGNATURE_MISSING, "Signature is missing"))?;

        let expected = self.sign(params, secret)?;
        if constant_time_eq(
            expected.as_bytes(),
            supplied.to_ascii_lowercase().as_bytes(),
        ) {
            Ok(())
        } else {
            tracing::debug!(params = params.len(), "Request signature mismatch");
            Err(AuthError::signature(
                codes::SIGNATURE_MISMATCH,
                "Signature mismatch",
            ))
        }
    }

    /// Verifies `params` with the secret of `audience`.
    pub fn verify_for_audience(&self, params: &SignableParams, audience: &Audience) -> AuthResult<()> {
        self.verify(params, &audience.secret)
    }
}

/// SHA-256 of `canonical` followed by `secret`, as lowercase hex.
fn digest(canonical: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares two byte slices without exiting at the first difference.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
