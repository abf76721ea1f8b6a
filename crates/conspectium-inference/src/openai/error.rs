//! OpenAI-specific error handling.

use conspectium_core::AiError;

/// OpenAI-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Key lacks access to the model or endpoint.
    PermissionDenied,
    /// Rate limit or quota exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request too large.
    ContextLengthExceeded,
    /// Request rejected as malformed.
    BadRequest,
    /// Server-side timeout.
    Timeout,
    /// Server error or overload.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) => Self::AuthenticationError,
            (403, _) => Self::PermissionDenied,
            (408, _) => Self::Timeout,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (400, _) | (422, _) => Self::BadRequest,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::Timeout | Self::ServerError
        )
    }
}

/// Classify an OpenAI error response.
pub fn to_ai_error(code: OpenAIErrorCode, message: &str) -> AiError {
    let message = match code {
        OpenAIErrorCode::AuthenticationError => format!("Authentication failed: {}", message),
        OpenAIErrorCode::PermissionDenied => format!("Permission denied: {}", message),
        OpenAIErrorCode::RateLimitExceeded => format!("Rate limit exceeded: {}", message),
        OpenAIErrorCode::ModelNotFound => format!("Model not found: {}", message),
        OpenAIErrorCode::ContextLengthExceeded => format!("Context too long: {}", message),
        OpenAIErrorCode::BadRequest => format!("Bad request: {}", message),
        OpenAIErrorCode::Timeout => format!("Request timed out: {}", message),
        OpenAIErrorCode::ServerError => format!("Server error: {}", message),
        OpenAIErrorCode::Unknown => message.to_string(),
    };
    if code.is_retryable() {
        AiError::transient(message)
    } else {
        AiError::permanent(message)
    }
}

/// Classify a transport-level failure.
///
/// Timeouts and connection failures are transient; a body that cannot be
/// decoded is permanent.
pub fn classify_transport(err: &reqwest::Error) -> AiError {
    if err.is_decode() {
        AiError::permanent(format!("Failed to parse response: {}", err))
    } else if err.is_builder() {
        AiError::permanent(format!("Invalid request: {}", err))
    } else {
        AiError::transient(format!("Request failed: {}", err))
    }
}
