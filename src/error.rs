// HTTP API error types and failure classification
use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::api::{Envelope, ErrorBody};
use crate::crud::{PipelineFault, Rejection};
use crate::database::DatabaseError;
use crate::schema::ValidationError;
use crate::services::task::ServiceError;

/// Code and message every infrastructure fault is reported with
pub const GENERAL_ERROR_CODE: &str = "INTERNAL_SERVER_ERROR";
pub const GENERAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    // 400 Bad Request
    Validation {
        message: String,
        field_errors: BTreeMap<String, String>,
    },
    BadRequest(String),
    BusinessRule(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // 500 Internal Server Error, message is never shown
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::BusinessRule(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal => GENERAL_ERROR_CODE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation { message, .. } => message,
            ApiError::BadRequest(msg) => msg,
            ApiError::BusinessRule(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::MethodNotAllowed(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Internal => GENERAL_ERROR_MESSAGE,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            ApiError::Validation { field_errors, .. } if !field_errors.is_empty() => {
                Some(json!(field_errors))
            }
            _ => None,
        };
        ErrorBody {
            code: self.error_code().to_string(),
            message: self.message().to_string(),
            details,
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(message: impl Into<String>, field_errors: BTreeMap<String, String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            field_errors,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        ApiError::BusinessRule(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        ApiError::MethodNotAllowed(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.message, err.field_errors)
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Invalid(err) => err.into(),
            Rejection::Forbidden(denied) => ApiError::forbidden(denied.to_string()),
        }
    }
}

impl From<PipelineFault> for ApiError {
    fn from(fault: PipelineFault) -> Self {
        match fault {
            PipelineFault::Credential(err) => ApiError::unauthorized(err.to_string()),
            PipelineFault::Permission(msg) => {
                tracing::error!("Permission check failed: {}", msg);
                ApiError::Internal
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::BusinessRule { message } => ApiError::business_rule(message),
            other => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::BusinessRule(message) => ApiError::business_rule(message),
            ServiceError::Infrastructure(db) => db.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let envelope = Envelope::<()>::failure(self.to_body());
        (self.status_code(), Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::{Action, CredentialError, PermissionDenied, PermissionRequirement};
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_carry_field_details() {
        let err: ApiError = ValidationError::field("title", "Required").into();
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
        assert_eq!(body["error"]["details"]["title"], json!("Required"));
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn forbidden_names_the_missing_permission() {
        let rejection = Rejection::Forbidden(PermissionDenied {
            requirement: PermissionRequirement::new("TASK", Action::Delete),
        });
        let (status, body) = body_json(rejection.into()).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], json!("Missing permission TASK:DELETE"));
    }

    #[tokio::test]
    async fn infrastructure_detail_is_never_echoed() {
        let err: ApiError = ServiceError::Infrastructure(DatabaseError::UnexpectedShape {
            procedure: "sp_task_get".into(),
            detail: "connection reset by peer".into(),
        })
        .into();
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], json!(GENERAL_ERROR_CODE));
        assert_eq!(body["error"]["message"], json!(GENERAL_ERROR_MESSAGE));
        assert!(!body.to_string().contains("connection reset"));
    }

    #[test]
    fn classifies_each_failure_kind() {
        assert_eq!(
            ApiError::from(ServiceError::BusinessRule("Task not found".into())),
            ApiError::business_rule("Task not found")
        );
        assert_eq!(
            ApiError::from(PipelineFault::Credential(CredentialError::MissingToken)).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(PipelineFault::Permission("grant store offline".into())),
            ApiError::Internal
        );
        assert_eq!(
            ApiError::from(DatabaseError::business_rule("Category not found")).error_code(),
            "BUSINESS_RULE_VIOLATION"
        );
    }

    #[tokio::test]
    async fn method_not_allowed_renders_as_failure_envelope() {
        let (status, body) = body_json(ApiError::method_not_allowed("nope")).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("METHOD_NOT_ALLOWED"));
        assert!(body["timestamp"].is_string());
    }
}
