use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::middleware::RequestContext;
use crate::auth::strategy::{AuthOutcome, AuthenticateOptions, Failure};
use crate::error::AppError;
use crate::AppState;

impl IntoResponse for AuthOutcome {
    fn into_response(self) -> Response {
        match self {
            AuthOutcome::Redirect { url, status } => {
                (status, [(header::LOCATION, url)]).into_response()
            }
            AuthOutcome::Success { user, info } => {
                Json(json!({ "user": user, "info": info })).into_response()
            }
            AuthOutcome::Fail(Failure::Status(status)) => {
                let body = json!({
                    "error": "unauthorized",
                    "message": status.canonical_reason().unwrap_or("Unauthorized"),
                });
                (status, Json(body)).into_response()
            }
            AuthOutcome::Fail(Failure::Info(info)) => {
                let body = json!({
                    "error": "unauthorized",
                    "message": "Authentication rejected",
                    "info": info,
                });
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
            AuthOutcome::Error(e) => e.into_response(),
        }
    }
}

/// Serves both the login entry point and the provider callback; the query
/// decides which.
pub async fn authenticate(
    State(state): State<AppState>,
    Path(client): Path<String>,
    ctx: RequestContext,
) -> Result<AuthOutcome, AppError> {
    let strategy = state
        .registry
        .get(&client)
        .ok_or(AppError::StrategyNotFound(client))?;

    Ok(strategy
        .authenticate(&ctx, &AuthenticateOptions::default())
        .await)
}
