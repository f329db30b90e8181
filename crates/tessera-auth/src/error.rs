//! Token lifecycle error types.
//!
//! Protocol errors (bad or superseded tokens) are terminal: retrying with the
//! same inputs always fails and the caller must obtain a new pair. Infrastructure
//! errors (storage, signing backend, hashing) are the only retryable class.

use std::fmt;

/// Errors that can occur while issuing, rotating, identifying or revoking tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The access token has a bad signature, is expired, or cannot be parsed.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The refresh token cannot be decoded into a generation.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// Description of why decoding failed.
        message: String,
    },

    /// No session record exists for the identity.
    #[error("No active session")]
    NoSession,

    /// The presented refresh token does not match the active generation.
    #[error("Refresh token does not match the active session")]
    RefreshMismatch,

    /// The access and refresh tokens belong to different generations.
    #[error("Access and refresh tokens belong to different generations")]
    GenerationMismatch,

    /// The request device differs from the one the session was issued to.
    /// The session has been revoked.
    #[error("Device mismatch, session revoked")]
    DeviceMismatch,

    /// The access token's generation has been rotated away.
    #[error("Token revoked")]
    RevokedToken,

    /// The request is missing required input.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// An error occurred while storing or retrieving session data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The signing backend failed to produce a token.
    #[error("Signing error: {message}")]
    Signing {
        /// Description of the signing error.
        message: String,
    },

    /// The secret hasher failed.
    #[error("Hashing error: {message}")]
    Hashing {
        /// Description of the hashing error.
        message: String,
    },

    /// The auth configuration or key material is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `Hashing` error.
    #[must_use]
    pub fn hashing(message: impl Into<String>) -> Self {
        Self::Hashing {
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

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken { .. }
                | Self::MalformedToken { .. }
                | Self::NoSession
                | Self::RefreshMismatch
                | Self::GenerationMismatch
                | Self::DeviceMismatch
                | Self::RevokedToken
                | Self::InvalidRequest { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Only infrastructure failures qualify; every protocol error is terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Signing { .. } | Self::Hashing { .. }
        )
    }

    /// Returns `true` if the error indicates possible token theft or replay.
    #[must_use]
    pub fn is_security_signal(&self) -> bool {
        matches!(
            self,
            Self::RefreshMismatch | Self::GenerationMismatch | Self::DeviceMismatch
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidToken { .. } | Self::MalformedToken { .. } | Self::RevokedToken => {
                ErrorCategory::Token
            }
            Self::NoSession => ErrorCategory::Session,
            Self::RefreshMismatch | Self::GenerationMismatch | Self::DeviceMismatch => {
                ErrorCategory::Security
            }
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::Storage { .. } | Self::Signing { .. } | Self::Hashing { .. } => {
                ErrorCategory::Infrastructure
            }
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable machine-readable error code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken { .. } => "invalid_token",
            Self::MalformedToken { .. } => "malformed_token",
            Self::NoSession => "no_session",
            Self::RefreshMismatch => "refresh_mismatch",
            Self::GenerationMismatch => "generation_mismatch",
            Self::DeviceMismatch => "device_mismatch",
            Self::RevokedToken => "revoked_token",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Storage { .. } => "temporarily_unavailable",
            Self::Signing { .. }
            | Self::Hashing { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => "server_error",
        }
    }
}

/// Categories of token errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Token validation errors.
    Token,
    /// Missing session state.
    Session,
    /// Replay, mixing, or stolen-context signals.
    Security,
    /// Request validation errors.
    Validation,
    /// Storage, signing or hashing backend failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Session => write!(f, "session"),
            Self::Security => write!(f, "security"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
