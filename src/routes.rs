use axum::http::HeaderValue;
use axum::{routing::get, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Comma-separated origins; `*` allows any origin.
fn allowed_origins(origins: &str) -> AllowOrigin {
    if origins.split(',').any(|o| o.trim() == "*") {
        return AllowOrigin::any();
    }

    let list: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {o:?}");
                None
            }
        })
        .collect();

    AllowOrigin::list(list)
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.cors_allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    // WeChat redirects back to either path; both run the same flow
    let passport_routes = Router::new()
        .route("/:client", get(handlers::passport::authenticate))
        .route("/:client/callback", get(handlers::passport::authenticate));

    Router::new()
        .nest("/passport", passport_routes)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
