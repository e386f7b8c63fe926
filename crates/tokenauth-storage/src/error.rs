//! Storage error types shared by all token store backends.

use std::fmt;

/// Errors that can occur during token store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The caller supplied data the store refuses to persist.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of why the input is invalid.
        message: String,
    },

    /// An entry with the same identity already exists.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The backend configuration string could not be used.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The backend is unreachable or has been closed.
    #[error("Connection error during {operation}: {message}")]
    Connection {
        /// The store operation that failed.
        operation: &'static str,
        message: String,
    },

    /// A persisted value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No backend is registered under the requested name.
    #[error("Unknown store backend: {name}")]
    UnknownBackend { name: String },

    /// A backend with the same name was registered twice.
    #[error("Store backend registered twice: {name}")]
    DuplicateBackend { name: String },

    /// The backend reported an error that fits no other category.
    #[error("Internal error during {operation}: {message}")]
    Internal {
        operation: &'static str,
        message: String,
    },
}

impl StorageError {
    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Connection {
            operation,
            message: message.into(),
        }
    }

    /// Creates a new `UnknownBackend` error.
    #[must_use]
    pub fn unknown_backend(name: impl Into<String>) -> Self {
        Self::UnknownBackend { name: name.into() }
    }

    /// Creates a new `DuplicateBackend` error.
    #[must_use]
    pub fn duplicate_backend(name: impl Into<String>) -> Self {
        Self::DuplicateBackend { name: name.into() }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            operation,
            message: message.into(),
        }
    }

    /// Returns `true` if the caller supplied invalid data.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Returns `true` if the backend could not be reached.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` if retrying the same operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Internal { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } => ErrorCategory::Validation,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Configuration { .. }
            | Self::UnknownBackend { .. }
            | Self::DuplicateBackend { .. } => ErrorCategory::Configuration,
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Serialization(_) | Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    Configuration,
    /// Network or connection failure.
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::Configuration => write!(f, "configuration"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::invalid_input("token value is empty");
        assert_eq!(err.to_string(), "Invalid input: token value is empty");

        let err = StorageError::connection("get_token", "connection refused");
        assert_eq!(
            err.to_string(),
            "Connection error during get_token: connection refused"
        );

        let err = StorageError::unknown_backend("etcd");
        assert_eq!(err.to_string(), "Unknown store backend: etcd");
    }

    #[test]
    fn test_error_predicates() {
        assert!(StorageError::invalid_input("x").is_invalid_input());
        assert!(StorageError::connection("save_token", "x").is_connection());
        assert!(StorageError::connection("save_token", "x").is_transient());
        assert!(StorageError::internal("save_token", "x").is_transient());
        assert!(!StorageError::configuration("x").is_transient());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::invalid_input("x").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            StorageError::duplicate_backend("redis").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            StorageError::connection("get_token", "x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
