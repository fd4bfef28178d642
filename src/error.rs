//! Error Handling Module
//!
//! Every fallible operation in the crate returns [`CourierError`]. Nothing is
//! recovered locally: setup errors surface at registration time, interceptor
//! and transport errors surface verbatim from `send`, and codec errors surface
//! from the JSON helpers.
//!
//! # Example
//!
//! ```rust
//! use courier::error::{CourierError, ErrorCategory};
//!
//! let error = CourierError::interceptor("auth", "token expired");
//! assert_eq!(error.category(), ErrorCategory::Interceptor);
//! assert!(!error.is_cancelled());
//! ```

use thiserror::Error;

/// Coarse grouping of [`CourierError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Registration or configuration problems, raised before any request.
    Setup,
    /// A before-send callback rejected the request.
    Interceptor,
    /// The underlying HTTP stack failed.
    Transport,
    /// JSON encoding or decoding failed.
    Codec,
    /// The cancellation token fired.
    Cancelled,
}

/// Errors produced by client registration, the interceptor chain, the
/// transport and the JSON helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CourierError {
    /// Missing or malformed registration input (empty or duplicate client
    /// name, unparsable base address, unknown client).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A before-send callback failed. The request was not sent.
    #[error("Interceptor '{interceptor}' failed: {message}")]
    InterceptorFailure {
        /// Name of the interceptor that raised the error.
        interceptor: String,
        /// Human-readable reason.
        message: String,
    },

    /// Network or transport error reported by the HTTP stack.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request value could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The response body is not valid JSON or does not match the target type.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The cancellation token fired while the operation was suspended.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid HTTP or crate configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CourierError {
    /// Build an [`CourierError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Build an [`CourierError::InterceptorFailure`]. Callbacks use this to
    /// abort a request.
    pub fn interceptor(interceptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InterceptorFailure {
            interceptor: interceptor.into(),
            message: message.into(),
        }
    }

    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument(_) | Self::Configuration(_) => ErrorCategory::Setup,
            Self::InterceptorFailure { .. } => ErrorCategory::Interceptor,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Serialization(_) | Self::Deserialization(_) => ErrorCategory::Codec,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Returns `true` for [`CourierError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for CourierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidArgument(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<figment::Error> for CourierError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result type for courier operations.
pub type Result<T> = std::result::Result<T, CourierError>;
