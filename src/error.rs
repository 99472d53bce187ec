use actix_web::{error::ResponseError, HttpResponse};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    // Authentication / workflow errors
    InvalidCredentials,
    AccountNotApproved,
    InvalidOrExpiredCode,
    InvalidStateTransition(String),
    InsufficientPermissions,
    NotFound,

    // Validation errors
    Validation(String),

    // Biometric upstream errors
    NoFaceDetected,
    UpstreamTimeout,
    UpstreamUnavailable,
    UpstreamError(String),

    // Infrastructure errors
    Database(String),
    Internal(String),
}

impl ApiError {
    /// Retryable errors may be re-attempted by the caller with backoff.
    /// The service itself never retries them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::UpstreamTimeout | ApiError::UpstreamUnavailable
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::InvalidCredentials => write!(f, "Invalid credentials"),
            ApiError::AccountNotApproved => {
                write!(f, "Account is awaiting administrator approval")
            }
            ApiError::InvalidOrExpiredCode => write!(f, "Invalid or expired code"),
            ApiError::InvalidStateTransition(msg) => {
                write!(f, "Invalid state transition: {}", msg)
            }
            ApiError::InsufficientPermissions => write!(f, "Insufficient permissions"),
            ApiError::NotFound => write!(f, "Record not found"),
            ApiError::Validation(msg) => write!(f, "Validation failed: {}", msg),
            ApiError::NoFaceDetected => write!(f, "No face detected in the image"),
            ApiError::UpstreamTimeout => write!(f, "Verification provider timed out"),
            ApiError::UpstreamUnavailable => write!(f, "Verification provider unreachable"),
            ApiError::UpstreamError(msg) => {
                write!(f, "Verification provider error: {}", msg)
            }
            ApiError::Database(msg) => write!(f, "Database error: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: match self {
                ApiError::InvalidCredentials => "invalid_credentials",
                ApiError::AccountNotApproved => "account_not_approved",
                ApiError::InvalidOrExpiredCode => "invalid_or_expired_code",
                ApiError::InvalidStateTransition(_) => "invalid_state_transition",
                ApiError::InsufficientPermissions => "insufficient_permissions",
                ApiError::NotFound => "not_found",
                ApiError::Validation(_) => "validation_failed",
                ApiError::NoFaceDetected => "no_face_detected",
                ApiError::UpstreamTimeout => "upstream_timeout",
                ApiError::UpstreamUnavailable => "upstream_unavailable",
                ApiError::UpstreamError(_) => "upstream_error",
                ApiError::Database(_) => "database_error",
                ApiError::Internal(_) => "internal_error",
            }
            .to_string(),
            message: self.to_string(),
            code: self.is_retryable().then(|| "retryable".to_string()),
        };

        match self {
            ApiError::InvalidCredentials | ApiError::AccountNotApproved => {
                HttpResponse::Unauthorized().json(error_response)
            }
            ApiError::InsufficientPermissions => HttpResponse::Forbidden().json(error_response),
            ApiError::NotFound => HttpResponse::NotFound().json(error_response),
            ApiError::InvalidStateTransition(_) => HttpResponse::Conflict().json(error_response),
            ApiError::Validation(_)
            | ApiError::InvalidOrExpiredCode
            | ApiError::NoFaceDetected => HttpResponse::BadRequest().json(error_response),
            ApiError::UpstreamTimeout => HttpResponse::GatewayTimeout().json(error_response),
            ApiError::UpstreamUnavailable | ApiError::UpstreamError(_) => {
                HttpResponse::BadGateway().json(error_response)
            }
            _ => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<diesel::result::Error> for ApiError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ApiError::NotFound,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ApiError::Validation("Duplicate record".to_string()),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(error: diesel::r2d2::PoolError) -> Self {
        ApiError::Database(format!("Connection pool error: {}", error))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(error: validator::ValidationErrors) -> Self {
        ApiError::Validation(error.to_string())
    }
}

impl From<uuid::Error> for ApiError {
    fn from(error: uuid::Error) -> Self {
        ApiError::Validation(format!("Invalid UUID: {}", error))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Validation(error.to_string())
    }
}
