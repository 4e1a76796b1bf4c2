use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    /// The external platform rejected the stored credentials during sync.
    #[error("External platform rejected the stored credentials")]
    UpstreamAuthRejected,

    #[error("Failed to fetch account data from the external platform")]
    AccountFetchFailed,

    #[error("Failed to sync account data to the external platform")]
    AccountSyncFailed,

    #[error("External service unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("External service timed out: {0}")]
    GatewayTimeout(String),

    /// Non-2xx from an upstream that maps to no known taxonomy entry.
    /// The upstream status code is carried structurally, never encoded
    /// in the message string.
    #[error("Upstream rejected the request with status {code}")]
    UpstreamRejected { code: u16, detail: String },

    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;

        let (status, code, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::MissingParameters(params) => {
                details = Some(serde_json::json!({ "missing": params }));
                (
                    StatusCode::BAD_REQUEST,
                    "MISSING_PARAMETERS",
                    self.to_string(),
                )
            }
            AppError::UpstreamAuthRejected => (
                StatusCode::UNAUTHORIZED,
                "UPSTREAM_AUTH_REJECTED",
                self.to_string(),
            ),
            AppError::AccountFetchFailed => (
                StatusCode::BAD_GATEWAY,
                "ACCOUNT_FETCH_FAILED",
                self.to_string(),
            ),
            AppError::AccountSyncFailed => (
                StatusCode::BAD_GATEWAY,
                "ACCOUNT_SYNC_FAILED",
                self.to_string(),
            ),
            AppError::GatewayUnavailable(msg) => {
                tracing::error!("Upstream transport failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "GATEWAY_UNAVAILABLE",
                    "Failed to communicate with the external service".to_string(),
                )
            }
            AppError::GatewayTimeout(msg) => {
                tracing::error!("Upstream timeout: {}", msg);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "GATEWAY_TIMEOUT",
                    "The external service did not respond in time".to_string(),
                )
            }
            AppError::UpstreamRejected { code, detail } => {
                tracing::warn!("Upstream rejected request: status={} body={}", code, detail);
                let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, "UPSTREAM_REJECTED", self.to_string())
            }
            AppError::MalformedUpstreamResponse(msg) => {
                tracing::error!("Malformed upstream response: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "MALFORMED_UPSTREAM_RESPONSE",
                    "The external service returned an unexpected response".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Jwt(e) => {
                tracing::warn!("JWT error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "Invalid or expired token".to_string(),
                )
            }
            AppError::Crypto(msg) => {
                tracing::error!("Encryption error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ENCRYPTION_ERROR",
                    "Failed to protect the supplied credential".to_string(),
                )
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    "Server configuration error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_rejected_passes_status_through() {
        let err = AppError::UpstreamRejected {
            code: 418,
            detail: "teapot".to_string(),
        };
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn upstream_rejected_falls_back_to_bad_gateway_on_invalid_code() {
        let err = AppError::UpstreamRejected {
            code: 42,
            detail: String::new(),
        };
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn missing_parameters_lists_names_in_message() {
        let err = AppError::MissingParameters(vec![
            "main_user_id".to_string(),
            "filial_id".to_string(),
        ]);
        assert!(err.to_string().contains("main_user_id, filial_id"));
    }
}
