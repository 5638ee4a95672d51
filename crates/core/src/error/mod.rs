//! Shared error vocabulary and classification for RelayGuard services
//!
//! Services across the fleet raise the same handful of request-level
//! failures; [`ServiceError`] standardizes them (code, HTTP status, title)
//! so edge layers can map any of them to a problem response without
//! per-service tables.
//!
//! The [`ErrorClassification`] trait is the crate-wide interface for retry
//! and alerting decisions. Every error type in this crate implements it:
//! - [`ServiceError`] (this module)
//! - [`ResilienceError`](crate::resilience::ResilienceError)
//! - [`StoreError`](crate::cache::StoreError)
//! - [`EventBusError`](crate::messaging::EventBusError)
//!
//! Module-specific errors elsewhere should implement the trait rather than
//! invent their own severity scales.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Boxed error type for erased failures crossing trait-object boundaries
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Standard result type using ServiceError
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Request-level errors shared by every service in the fleet
///
/// Each variant carries the canonical error code, HTTP status, and title via
/// [`error_code`](Self::error_code), [`status_code`](Self::status_code), and
/// [`title`](Self::title), so edge layers render them uniformly.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// A requested entity does not exist
    #[error("{entity} with key '{key}' was not found")]
    NotFound { entity: String, key: String },

    /// Input failed validation; `errors` maps field name to its failures
    #[error("One or more validation errors occurred")]
    Validation { errors: HashMap<String, Vec<String>> },

    /// Caller is not authenticated
    #[error("{message}")]
    Unauthorized { message: String },

    /// Caller is authenticated but lacks permission
    #[error("{message}")]
    Forbidden { message: String },

    /// Request conflicts with current resource state
    #[error("{message}")]
    Conflict { message: String },
}

impl ServiceError {
    /// Create a not-found error for an entity/key pair
    pub fn not_found<E: Into<String>, K: Into<String>>(entity: E, key: K) -> Self {
        Self::NotFound { entity: entity.into(), key: key.into() }
    }

    /// Create a validation error from a field → failures map
    pub fn validation(errors: HashMap<String, Vec<String>>) -> Self {
        Self::Validation { errors }
    }

    /// Create a validation error for a single field
    pub fn validation_field<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.into(), vec![message.into()]);
        Self::Validation { errors }
    }

    /// Create an unauthorized error with the default message
    pub fn unauthorized() -> Self {
        Self::Unauthorized { message: "You are not authorized to perform this action".to_string() }
    }

    /// Create an unauthorized error with a custom message
    pub fn unauthorized_with<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    /// Create a forbidden error with the default message
    pub fn forbidden() -> Self {
        Self::Forbidden { message: "You are not allowed to perform this action".to_string() }
    }

    /// Create a forbidden error with a custom message
    pub fn forbidden_with<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict { message: message.into() }
    }

    /// Canonical machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Conflict { .. } => "CONFLICT",
        }
    }

    /// HTTP status code edge layers should respond with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::Conflict { .. } => 409,
        }
    }

    /// Human-readable title for problem responses
    pub fn title(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Not Found",
            Self::Validation { .. } => "Validation Error",
            Self::Unauthorized { .. } => "Unauthorized",
            Self::Forbidden { .. } => "Forbidden",
            Self::Conflict { .. } => "Conflict",
        }
    }
}

impl ErrorClassification for ServiceError {
    /// Request-level errors are caller mistakes; retrying the same request
    /// does not help
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::Validation { .. } => ErrorSeverity::Error,
            Self::Unauthorized { .. } | Self::Forbidden { .. } | Self::Conflict { .. } => {
                ErrorSeverity::Warning
            }
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error classification trait for consistent error handling across modules
///
/// Provides a standard interface for classifying errors by their
/// characteristics, so retry loops, monitoring, and alerting treat every
/// error type in the system the same way.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient conditions that may succeed on a later
    /// attempt: open circuits, rate limiting, backend hiccups.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// `Some(Duration)` when the error knows how long the condition lasts
    /// (e.g. an open circuit's remaining cool-down), `None` otherwise.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
