use thiserror::Error;

/// Application-wide error types for Comanda.
#[derive(Error, Debug)]
pub enum AppError {
    /// The requested record does not exist (or belongs to another tenant).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, expired, or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request payload failed validation.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The operation conflicts with the current state of a record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A customer does not have enough loyalty points for a redemption.
    #[error("Insufficient points: {required} required, {available} available")]
    InsufficientPoints { required: i64, available: i64 },

    /// HTTP request to an external service failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError { message: String, status_code: u16 },

    /// WhatsApp gateway call failed.
    #[error("Gateway error (HTTP {status_code}): {message}")]
    GatewayError { message: String, status_code: u16 },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if the error was caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_)
                | AppError::Unauthorized(_)
                | AppError::ValidationError(_)
                | AppError::Conflict(_)
                | AppError::InsufficientPoints { .. }
                | AppError::SerializationError(_)
        )
    }
}
