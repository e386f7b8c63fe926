//! Token lifecycle error types.
//!
//! [`AuthError`] is what every fallible operation in this crate returns.
//! Clients never see it directly: [`AuthError::validation_error`] reduces it to
//! a [`ValidationError`], the stable `{code, msg}` pair sent over the wire.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokenauth_storage::StorageError;

/// Stable error codes carried by [`ValidationError`].
pub mod codes {
    /// Any failure on the server side.
    pub const SERVER_ERROR: i32 = 10001;
    pub const TOKEN_EMPTY: i32 = 41001;
    pub const TOKEN_NOT_FOUND: i32 = 41002;
    pub const TOKEN_EXPIRED: i32 = 41003;
    pub const AUDIENCE_ID_EMPTY: i32 = 41010;
    pub const AUDIENCE_NOT_FOUND: i32 = 41011;
    /// Neither a client id nor a single (user) id was given.
    pub const PRINCIPAL_EMPTY: i32 = 41020;
    pub const SIGNATURE_MISSING: i32 = 41030;
    pub const SIGNATURE_MISMATCH: i32 = 41031;
    pub const SECRET_MISSING: i32 = 41032;
    pub const NO_SIGNABLE_PARAMS: i32 = 41033;
}

/// Message sent for every server side failure.
pub const SERVER_ERROR_MSG: &str = "System error, please retry";

/// A client-visible failure, serialized as `{"code": 41002, "msg": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] {msg}")]
pub struct ValidationError {
    pub code: i32,
    pub msg: String,
}

impl ValidationError {
    pub fn new(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    #[must_use]
    pub fn server_error() -> Self {
        Self::new(codes::SERVER_ERROR, SERVER_ERROR_MSG)
    }

    #[must_use]
    pub fn token_empty() -> Self {
        Self::new(codes::TOKEN_EMPTY, "Token is empty")
    }

    #[must_use]
    pub fn token_not_found() -> Self {
        Self::new(codes::TOKEN_NOT_FOUND, "Token not found")
    }

    #[must_use]
    pub fn token_expired() -> Self {
        Self::new(codes::TOKEN_EXPIRED, "Token expired")
    }

    #[must_use]
    pub fn audience_id_empty() -> Self {
        Self::new(codes::AUDIENCE_ID_EMPTY, "Audience id is empty")
    }

    #[must_use]
    pub fn audience_not_found() -> Self {
        Self::new(codes::AUDIENCE_NOT_FOUND, "Audience not found")
    }

    #[must_use]
    pub fn principal_empty() -> Self {
        Self::new(codes::PRINCIPAL_EMPTY, "Client id and user id are both empty")
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.code == codes::SERVER_ERROR
    }
}

/// Errors that can occur while issuing, validating or revoking tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The caller supplied invalid input.
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    /// No audience is stored under the given id.
    #[error("Audience not found: {id}")]
    AudienceNotFound { id: String },

    /// The token was never issued, was revoked or was superseded.
    #[error("Token not found")]
    TokenNotFound,

    /// The token's deadline has passed.
    #[error("Token expired")]
    TokenExpired,

    /// A signed request failed verification.
    #[error("Signature verification failed: {0}")]
    Signature(ValidationError),

    /// The token store failed.
    #[error("Storage error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageError,
    },

    /// Settings are missing or malformed.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    #[must_use]
    pub fn token_empty() -> Self {
        Self::Validation(ValidationError::token_empty())
    }

    #[must_use]
    pub fn principal_empty() -> Self {
        Self::Validation(ValidationError::principal_empty())
    }

    #[must_use]
    pub fn audience_id_empty() -> Self {
        Self::Validation(ValidationError::audience_id_empty())
    }

    #[must_use]
    pub fn audience_not_found(id: impl Into<String>) -> Self {
        Self::AudienceNotFound { id: id.into() }
    }

    #[must_use]
    pub fn signature(code: i32, msg: impl Into<String>) -> Self {
        Self::Signature(ValidationError::new(code, msg))
    }

    #[must_use]
    pub fn storage(operation: &'static str, source: StorageError) -> Self {
        Self::Storage { operation, source }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wraps a storage error with the operation that hit it.
    pub(crate) fn from_storage(operation: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| Self::storage(operation, source)
    }

    /// The `{code, msg}` pair to send to the client.
    ///
    /// Server side failures collapse to code `10001` with a generic message.
    #[must_use]
    pub fn validation_error(&self) -> ValidationError {
        match self {
            Self::Validation(err) | Self::Signature(err) => err.clone(),
            Self::AudienceNotFound { .. } => ValidationError::audience_not_found(),
            Self::TokenNotFound => ValidationError::token_not_found(),
            Self::TokenExpired => ValidationError::token_expired(),
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                ValidationError::server_error()
            }
        }
    }

    /// Like [`validation_error`](Self::validation_error), but server side
    /// failures carry the underlying error text.
    #[must_use]
    pub fn detailed_validation_error(&self) -> ValidationError {
        let mut err = self.validation_error();
        if self.is_server_error() {
            err.msg = format!("{}: {self}", err.msg);
        }
        err
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::AudienceNotFound { .. }
                | Self::TokenNotFound
                | Self::TokenExpired
                | Self::Signature(_)
        )
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if retrying the same call later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { source, .. } if source.is_transient())
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::AudienceNotFound { .. } | Self::TokenNotFound => ErrorCategory::NotFound,
            Self::TokenExpired => ErrorCategory::Token,
            Self::Signature(_) => ErrorCategory::Signature,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

/// Categories of auth errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    /// Token lifetime errors.
    Token,
    Signature,
    Infrastructure,
    Configuration,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Token => write!(f, "token"),
            Self::Signature => write!(f, "signature"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Result type for token lifecycle operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_json_shape() {
        let json = serde_json::to_string(&ValidationError::token_not_found()).unwrap();
        assert_eq!(json, r#"{"code":41002,"msg":"Token not found"}"#);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::TokenExpired.to_string(), "Token expired");
        assert_eq!(
            AuthError::audience_not_found("a1").to_string(),
            "Audience not found: a1"
        );
        assert_eq!(
            AuthError::token_empty().to_string(),
            "Validation failed: [41001] Token is empty"
        );
    }

    #[test]
    fn test_validation_error_codes() {
        assert_eq!(
            AuthError::TokenNotFound.validation_error().code,
            codes::TOKEN_NOT_FOUND
        );
        assert_eq!(
            AuthError::TokenExpired.validation_error().code,
            codes::TOKEN_EXPIRED
        );
        assert_eq!(
            AuthError::audience_not_found("x").validation_error().code,
            codes::AUDIENCE_NOT_FOUND
        );
        assert_eq!(
            AuthError::principal_empty().validation_error().code,
            codes::PRINCIPAL_EMPTY
        );
        assert_eq!(
            AuthError::signature(codes::SIGNATURE_MISMATCH, "bad")
                .validation_error()
                .code,
            codes::SIGNATURE_MISMATCH
        );
    }

    #[test]
    fn test_server_errors_are_generic() {
        let err = AuthError::storage(
            "get_token",
            StorageError::connection("get_token", "connection refused"),
        );
        let body = err.validation_error();
        assert_eq!(body, ValidationError::server_error());
        assert!(!body.msg.contains("refused"));

        let detailed = err.detailed_validation_error();
        assert_eq!(detailed.code, codes::SERVER_ERROR);
        assert!(detailed.msg.contains("connection refused"));

        let client = AuthError::TokenExpired.detailed_validation_error();
        assert_eq!(client, ValidationError::token_expired());
    }

    #[test]
    fn test_error_predicates() {
        assert!(AuthError::TokenNotFound.is_client_error());
        assert!(!AuthError::TokenNotFound.is_server_error());
        assert!(AuthError::configuration("x").is_server_error());

        let transient =
            AuthError::storage("save_token", StorageError::connection("save_token", "down"));
        assert!(transient.is_retryable());
        let permanent =
            AuthError::storage("save_token", StorageError::invalid_input("empty value"));
        assert!(!permanent.is_retryable());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(AuthError::TokenNotFound.category(), ErrorCategory::NotFound);
        assert_eq!(AuthError::TokenExpired.category(), ErrorCategory::Token);
        assert_eq!(
            AuthError::signature(codes::SIGNATURE_MISSING, "x").category(),
            ErrorCategory::Signature
        );
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
    }
}
