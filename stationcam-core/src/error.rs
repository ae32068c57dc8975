//! Error types for the station collaborators

use thiserror::Error;

/// Failure returned by the authentication collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Username or password was empty
    #[error("Please enter both username and password")]
    MissingCredentials,

    /// No account with the given username
    #[error("User not found")]
    UnknownUser,

    /// Account exists but the password did not match
    #[error("Invalid password")]
    InvalidPassword,

    /// The service could not be reached or failed internally
    #[error("Authentication service unavailable: {reason}")]
    Unavailable {
        /// Reason reported by the service
        reason: String,
    },
}

impl AuthError {
    /// Message suitable for showing on the login screen.
    ///
    /// Unknown users and wrong passwords collapse into one message so the
    /// screen does not reveal which usernames exist.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::MissingCredentials => self.to_string(),
            AuthError::UnknownUser | AuthError::InvalidPassword => {
                "Invalid username or password. Please try again.".to_string()
            }
            AuthError::Unavailable { .. } => {
                "Login failed. Please check your connection and try again.".to_string()
            }
        }
    }
}

/// Failure returned by the identification and submission collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service answered but reported `success: false`
    #[error("{operation} rejected: {message}")]
    Rejected {
        /// Operation that was rejected
        operation: String,
        /// Message returned by the service
        message: String,
    },

    /// The call itself failed
    #[error("{operation} failed: {reason}")]
    Unavailable {
        /// Operation that failed
        operation: String,
        /// Failure reason
        reason: String,
    },

    /// Input was refused before reaching the service
    #[error("Invalid input for {operation}: {reason}")]
    InvalidInput {
        /// Operation that was attempted
        operation: String,
        /// Why the input was refused
        reason: String,
    },
}

impl ServiceError {
    /// Create a rejection error
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an unavailability error
    pub fn unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::Unavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Name of the operation that failed
    pub fn operation(&self) -> &str {
        match self {
            ServiceError::Rejected { operation, .. }
            | ServiceError::Unavailable { operation, .. }
            | ServiceError::InvalidInput { operation, .. } => operation,
        }
    }
}

/// Identification failures share the service taxonomy
pub type IdentifyError = ServiceError;

/// Submission failures share the service taxonomy
pub type SubmitError = ServiceError;

/// Top-level error for station operations
#[derive(Error, Debug)]
pub enum StationError {
    /// Required input missing or malformed
    #[error("Validation failed for {field}: {reason}")]
    Validation {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Authentication failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Collaborator failure
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Session store could not be read or written
    #[error("Session store error: {reason}")]
    SessionStore {
        /// Failure reason
        reason: String,
    },


    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying error
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization error
    #[error("Serialization error: {source}")]
    Serialization {
        /// Underlying error
        #[from]
        source: serde_json::Error,
    },
}

/// Result alias for station operations
pub type StationResult<T> = Result<T, StationError>;

impl StationError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StationError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            StationError::Validation { .. } => ErrorCategory::Validation,
            StationError::Auth(AuthError::MissingCredentials) => ErrorCategory::Validation,
            StationError::Auth(_) => ErrorCategory::Authentication,
            StationError::Service(ServiceError::InvalidInput { .. }) => ErrorCategory::Validation,
            StationError::Service(_) => ErrorCategory::Collaborator,
            StationError::SessionStore { .. } => ErrorCategory::Storage,
            StationError::Configuration { .. } => ErrorCategory::Configuration,
            StationError::Io { .. } | StationError::Serialization { .. } => ErrorCategory::Storage,
        }
    }

    /// Check if the caller can simply retry
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Configuration)
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed input, rejected before any async call
    Validation,
    /// Login failures
    Authentication,
    /// Identification or submission failures
    Collaborator,
    /// Session persistence failures
    Storage,
    /// Bad configuration
    Configuration,
}
