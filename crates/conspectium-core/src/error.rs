//! Error types for Conspectium.

use thiserror::Error;

/// Result type alias using Conspectium's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Provider-independent classification of an AI capability failure.
///
/// Every AI adapter maps its transport/provider errors onto one of these two
/// classes, so the pipeline never inspects provider-specific error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiFailureClass {
    /// Likely to succeed on retry (rate limit, timeout, overload).
    Transient,
    /// Everything else.
    Permanent,
}

impl AiFailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiFailureClass::Transient => "transient",
            AiFailureClass::Permanent => "permanent",
        }
    }
}

/// A classified failure returned by an AI backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} AI failure: {message}", class.as_str())]
pub struct AiError {
    pub class: AiFailureClass,
    pub message: String,
}

impl AiError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: AiFailureClass::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: AiFailureClass::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class == AiFailureClass::Transient
    }
}

/// Core error type for Conspectium operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found, or not owned by the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller input malformed or missing
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity exists but is not usable by the caller
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with current entity state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity has not reached the state the operation requires
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Neither an audio source nor initial text could supply a transcript
    #[error("Transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    /// AI capability failed
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Job lifecycle error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The AI failure class, when this error came from the AI capability.
    pub fn ai_class(&self) -> Option<AiFailureClass> {
        match self {
            Error::Ai(e) => Some(e.class),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
