/// Error Handling Module
///
/// One error enum per layer, all funnelled into `AppError` at the HTTP edge:
/// 1. Rotation errors (cryptographic and consistency failures of a rotation)
/// 2. Store errors (token persistence failures)
/// 3. Configuration errors (startup)
/// 4. HTTP response mapping with structured error logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Failures of a single `rotate` / `issue` call
///
/// `InvalidSignature`, `Expired` and `TokenNotFound` are authentication
/// failures. `Store` and `Signing` are infrastructure failures; when they
/// happen during `rotate` the presented credential is already consumed.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("Refresh token signature is invalid")]
    InvalidSignature,

    #[error("Refresh token has expired")]
    Expired,

    #[error("Refresh token does not exist")]
    TokenNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Token store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate entry: {0}")]
    UniqueConstraintViolation(String),

    #[error("Query error: {0}")]
    QueryExecution(String),

    #[error("Database connection error: {0}")]
    ConnectionPool(String),

    #[error("Token store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::UniqueConstraintViolation(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::ConnectionPool(err.to_string())
            }
            _ => StoreError::QueryExecution(err.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),

    #[error("Config parse error: {0}")]
    ParseError(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::MissingRequired(key),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

/// Authentication errors as seen by HTTP clients
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Refresh token does not exist")]
    TokenNotFound,

    #[error("Missing authentication token")]
    MissingToken,
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type returned by route handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RotationError> for AppError {
    fn from(err: RotationError) -> Self {
        match err {
            RotationError::InvalidSignature => AppError::Auth(AuthError::TokenInvalid),
            RotationError::Expired => AppError::Auth(AuthError::TokenExpired),
            RotationError::TokenNotFound => AppError::Auth(AuthError::TokenNotFound),
            RotationError::Store(e) => AppError::Store(e),
            RotationError::Signing(msg) => AppError::Internal(msg),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking (request ID or trace ID)
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Converts errors to HTTP responses with matching log output
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (code, message) = match self {
            AppError::Auth(e) => match e {
                AuthError::TokenExpired | AuthError::TokenInvalid => {
                    ("TOKEN_INVALID", "Invalid or expired token")
                }
                AuthError::TokenNotFound => ("TOKEN_NOT_FOUND", "Refresh token does not exist"),
                AuthError::MissingToken => ("MISSING_TOKEN", "Missing authentication token"),
            },
            AppError::Store(StoreError::ConnectionPool(_)) | AppError::Store(StoreError::Unavailable(_)) => (
                "SERVICE_UNAVAILABLE",
                "Token store temporarily unavailable",
            ),
            AppError::Store(_) => ("DATABASE_ERROR", "Database error occurred"),
            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal server error"),
        };

        let status = self.status_code();
        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message.to_string(),
            code.to_string(),
            status.as_u16(),
        );

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Auth(e) => {
                tracing::warn!(
                    request_id = request_id,
                    error = %e,
                    "Authentication error"
                );
            }
            AppError::Store(e) => {
                tracing::error!(
                    request_id = request_id,
                    error = %e,
                    "Token store error"
                );
            }
            AppError::Internal(msg) => {
                tracing::error!(
                    request_id = request_id,
                    error = %msg,
                    "Internal error"
                );
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(e) => match e {
                StoreError::ConnectionPool(_) | StoreError::Unavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context attached to log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_error_maps_to_unauthorized() {
        for err in [
            RotationError::InvalidSignature,
            RotationError::Expired,
            RotationError::TokenNotFound,
        ] {
            let app_err: AppError = err.into();
            assert_eq!(app_err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_store_failure_is_not_auth_failure() {
        let err = RotationError::Store(StoreError::Unavailable("down".to_string()));
        let app_err: AppError = err.into();
        assert_eq!(app_err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let app_err: AppError = RotationError::Signing("bad key".to_string()).into();
        assert_eq!(app_err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_token_not_found_code() {
        let app_err: AppError = RotationError::TokenNotFound.into();
        let (status, response) = ErrorHandler::error_response(&app_err, "req-1");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.code, "TOKEN_NOT_FOUND");
        assert_eq!(response.error_id, "req-1");
        assert_eq!(response.status, 401);
    }

    #[test]
    fn test_error_response_creation() {
        let request_id = "test-123".to_string();
        let response = ErrorResponse::new(
            request_id.clone(),
            "Test error".to_string(),
            "TEST_ERROR".to_string(),
            400,
        );

        assert_eq!(response.error_id, request_id);
        assert_eq!(response.code, "TEST_ERROR");
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_error_context_creation() {
        let a = ErrorContext::new("test_operation");
        let b = ErrorContext::new("test_operation");
        assert_eq!(a.operation, "test_operation");
        assert_ne!(a.request_id, b.request_id);
    }
}
