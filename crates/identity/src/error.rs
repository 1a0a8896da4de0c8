//! Error types for identity operations.
//!
//! Errors are categorized so callers can decide whether a failed call is
//! worth repeating and what to tell the operator.

use std::fmt;

/// Result type alias for identity operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of identity errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection problems or server-side failures (transient, retryable).
    Network,
    /// Credentials rejected or token missing.
    Auth,
    /// Referenced object does not exist.
    NotFound,
    /// Request rejected by Keystone validation.
    Validation,
    /// Request conflicts with existing state.
    Conflict,
    /// Response could not be understood.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Object not found",
            Self::Validation => "Request rejected",
            Self::Conflict => "Conflicting object",
            Self::Format => "Invalid response format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that Keystone is reachable and try again",
            Self::Auth => "Verify the username, password, project and domain",
            Self::NotFound => "The object may have been deleted outside of this tool",
            Self::Validation => "Check the declared service and endpoint fields",
            Self::Conflict => "Remove the conflicting object from the catalog",
            Self::Format => "Check that the auth URL points at a Keystone v3 API",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to Keystone.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed before or without a Keystone response.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
    },

    /// Keystone answered with an error status.
    #[error("Keystone returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the Keystone error body, or a generic one.
        message: String,
    },

    /// Authentication succeeded at the HTTP level but no token was issued.
    #[error("no X-Subject-Token header in authentication response")]
    MissingToken,

    /// Invalid response from the API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Endpoint interface name not known.
    #[error("endpoint interface {0} not known")]
    UnknownAvailability(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP transport error.
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Create an error from a Keystone error status.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, if Keystone answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { .. } => ErrorCategory::Network,
            Error::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                404 => ErrorCategory::NotFound,
                409 => ErrorCategory::Conflict,
                400 | 422 => ErrorCategory::Validation,
                500..=599 => ErrorCategory::Network,
                _ => ErrorCategory::Other,
            },
            Error::MissingToken => ErrorCategory::Auth,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::UnknownAvailability(_) => ErrorCategory::Validation,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::api(code, format!("HTTP {}", code)),
            other => Self::http(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
