use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::r2d2;
use http::StatusCode;
use serde_json::json;
use std::fmt;

/// Error taxonomy for the payout pipeline. Every variant carries a stable
/// `code` that clients can branch on; the HTTP layer maps variants to
/// status codes and the consumer maps them to ack/requeue decisions.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    InsufficientBalance,
    UserNotActive(String),
    UserNotFound(String),
    TransactionNotFound(String),
    ConcurrentRequest(String),
    RateLimited { retry_after_secs: u64 },
    UserRateLimited { retry_after_secs: u64 },
    AlreadyProcessing(String),
    Queue(String),
    Cache(String),
    Database(diesel::result::Error),
    DatabaseConnection(String),
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable error code, part of the wire contract.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ApiError::UserNotActive(_) => "USER_NOT_ACTIVE",
            ApiError::UserNotFound(_) => "USER_NOT_FOUND",
            ApiError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            ApiError::ConcurrentRequest(_) => "CONCURRENT_REQUEST",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::UserRateLimited { .. } => "USER_RATE_LIMIT_EXCEEDED",
            ApiError::AlreadyProcessing(_) => "ALREADY_PROCESSING",
            ApiError::Queue(_) => "QUEUE_ERROR",
            ApiError::Cache(_) => "CACHE_ERROR",
            ApiError::Database(_) | ApiError::DatabaseConnection(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller may retry the same request later and expect it to
    /// succeed. Infrastructure failures are retriable, business rejections
    /// are not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ApiError::ConcurrentRequest(_)
                | ApiError::RateLimited { .. }
                | ApiError::UserRateLimited { .. }
                | ApiError::TransactionNotFound(_)
                | ApiError::Queue(_)
                | ApiError::Cache(_)
                | ApiError::Database(_)
                | ApiError::DatabaseConnection(_)
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ApiError::InsufficientBalance => write!(f, "Insufficient balance"),
            ApiError::UserNotActive(user_id) => write!(f, "User {} is not active", user_id),
            ApiError::UserNotFound(user_id) => write!(f, "User {} not found", user_id),
            ApiError::TransactionNotFound(id) => write!(f, "Transaction {} not found", id),
            ApiError::ConcurrentRequest(user_id) => {
                write!(f, "A payout for user {} is already in flight", user_id)
            }
            ApiError::RateLimited { retry_after_secs } => {
                write!(f, "Rate limit exceeded, retry after {}s", retry_after_secs)
            }
            ApiError::UserRateLimited { retry_after_secs } => {
                write!(f, "User rate limit exceeded, retry after {}s", retry_after_secs)
            }
            ApiError::AlreadyProcessing(id) => {
                write!(f, "Transaction {} is already being processed", id)
            }
            ApiError::Queue(msg) => write!(f, "Queue error: {}", msg),
            ApiError::Cache(msg) => write!(f, "Cache error: {}", msg),
            ApiError::Database(e) => write!(f, "Database error: {}", e),
            ApiError::DatabaseConnection(msg) => write!(f, "Database connection error: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<r2d2::PoolError> for ApiError {
    fn from(err: r2d2::PoolError) -> Self {
        ApiError::DatabaseConnection(err.to_string())
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        ApiError::Database(err)
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(err: redis::RedisError) -> Self {
        ApiError::Cache(err.to_string())
    }
}

impl From<lapin::Error> for ApiError {
    fn from(err: lapin::Error) -> Self {
        ApiError::Queue(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("serialization failure: {}", err))
    }
}

impl From<&ApiError> for StatusCode {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Validation(_) | ApiError::InsufficientBalance => StatusCode::BAD_REQUEST,
            ApiError::UserNotActive(_) => StatusCode::FORBIDDEN,
            ApiError::UserNotFound(_) | ApiError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ConcurrentRequest(_) | ApiError::AlreadyProcessing(_) => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } | ApiError::UserRateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::Queue(_)
            | ApiError::Cache(_)
            | ApiError::Database(_)
            | ApiError::DatabaseConnection(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        });

        match &self {
            ApiError::RateLimited { retry_after_secs }
            | ApiError::UserRateLimited { retry_after_secs } => {
                body["retry_after"] = json!(retry_after_secs);
            }
            _ => {}
        }

        // raw driver detail is exposed in development only
        if std::env::var("APP_ENV").unwrap_or_default() == "development" {
            if let ApiError::Database(e) = &self {
                body["details"] = json!(e.to_string());
            }
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ApiError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(ApiError::InsufficientBalance.code(), "INSUFFICIENT_BALANCE");
        assert_eq!(ApiError::UserNotActive("u".into()).code(), "USER_NOT_ACTIVE");
        assert_eq!(ApiError::UserNotFound("u".into()).code(), "USER_NOT_FOUND");
        assert_eq!(
            ApiError::TransactionNotFound("t".into()).code(),
            "TRANSACTION_NOT_FOUND"
        );
        assert_eq!(
            ApiError::ConcurrentRequest("u".into()).code(),
            "CONCURRENT_REQUEST"
        );
        assert_eq!(ApiError::Queue("q".into()).code(), "QUEUE_ERROR");
        assert_eq!(ApiError::Cache("c".into()).code(), "CACHE_ERROR");
        assert_eq!(
            ApiError::DatabaseConnection("d".into()).code(),
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn status_mapping_follows_the_taxonomy() {
        assert_eq!(
            StatusCode::from(&ApiError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StatusCode::from(&ApiError::InsufficientBalance),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StatusCode::from(&ApiError::UserNotActive("u".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            StatusCode::from(&ApiError::UserNotFound("u".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            StatusCode::from(&ApiError::ConcurrentRequest("u".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            StatusCode::from(&ApiError::UserRateLimited { retry_after_secs: 9 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            StatusCode::from(&ApiError::Queue("q".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            StatusCode::from(&ApiError::Internal("i".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn business_rejections_are_not_retriable() {
        assert!(!ApiError::InsufficientBalance.is_retriable());
        assert!(!ApiError::UserNotActive("u".into()).is_retriable());
        assert!(!ApiError::Validation("v".into()).is_retriable());
        assert!(ApiError::Queue("q".into()).is_retriable());
        assert!(ApiError::Cache("c".into()).is_retriable());
        assert!(ApiError::ConcurrentRequest("u".into()).is_retriable());
    }
}
