use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalServerError(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    RedisError(String),

    #[error("{service} error: {message}")]
    ExternalService { service: &'static str, message: String },

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        ApiError::TooManyRequests(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        ApiError::InternalServerError(msg.into())
    }

    pub fn external(service: &'static str, msg: impl Into<String>) -> Self {
        ApiError::ExternalService {
            service,
            message: msg.into(),
        }
    }

    /// Maps unique violations to 409 and everything else to a plain database error.
    pub fn from_db_with_conflict(err: sqlx::Error, conflict_message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return ApiError::Conflict(conflict_message.to_string());
            }
        }
        ApiError::DatabaseError(err)
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(err: redis::RedisError) -> Self {
        ApiError::RedisError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InternalServerError(_)
            | ApiError::DatabaseError(_)
            | ApiError::RedisError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Never leak storage or upstream details to the client.
        let message = match self {
            ApiError::InternalServerError(detail) => {
                error!(detail = %detail, "Internal server error");
                "Internal server error".to_string()
            }
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error");
                "Database error".to_string()
            }
            ApiError::RedisError(e) => {
                error!(error = %e, "Cache error");
                "Cache error".to_string()
            }
            ApiError::ExternalService { service, message } => {
                error!(service = %service, error = %message, "External service error");
                format!("{} is unavailable", service)
            }
            other => other.to_string(),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: message,
            code: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::too_many_requests("x").status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::internal_error("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::DatabaseError(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_error_body_shape() {
        let resp = ApiError::forbidden("Only clan leaders can do that").error_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Only clan leaders can do that");
        assert_eq!(json["code"], 403);
    }

    #[actix_web::test]
    async fn test_internal_details_are_hidden() {
        let resp = ApiError::internal_error("connection string leaked").error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn test_row_not_found_is_not_conflict() {
        let err = ApiError::from_db_with_conflict(sqlx::Error::RowNotFound, "dup");
        assert!(matches!(err, ApiError::DatabaseError(_)));
    }
}
