use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("WechatStrategy requires an appID option")]
    MissingAppId,

    #[error("WechatStrategy requires an appSecret option")]
    MissingAppSecret,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),

    #[error("WeChat API error {code}: {message}")]
    WeChatApi { code: i64, message: String },

    #[error("WeChat response carried neither unionid nor openid")]
    MissingIdentity,

    #[error("No access token cached for openid {0}")]
    TokenNotFound(String),

    #[error("Verify callback failed: {0}")]
    Verify(String),

    #[error("Verify callback panicked")]
    VerifyPanicked,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::MissingAppId | AppError::MissingAppSecret | AppError::Config(_) => {
                tracing::error!("Configuration error: {self}");
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", self.to_string())
            }
            AppError::StrategyNotFound(_) => {
                (StatusCode::NOT_FOUND, "strategy_not_found", self.to_string())
            }
            AppError::WeChatApi { .. } => {
                tracing::error!("{self}");
                (StatusCode::BAD_GATEWAY, "provider_error", self.to_string())
            }
            AppError::MissingIdentity | AppError::TokenNotFound(_) => {
                tracing::error!("{self}");
                (StatusCode::BAD_GATEWAY, "provider_error", self.to_string())
            }
            AppError::Verify(_) | AppError::VerifyPanicked => {
                tracing::error!("{self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "verify_error",
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
            AppError::HttpClient(e) => {
                tracing::error!("HTTP client error: {e}");
                (StatusCode::BAD_GATEWAY, "provider_error", "External provider error".to_string())
            }
        };

        let body = json!({
            "error": error_type,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
