use std::net::SocketAddr;
use std::sync::Arc;

use passport_wechat::auth::mount::{self, AcceptUser, StrategyRegistry};
use passport_wechat::config::Config;
use passport_wechat::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passport_wechat=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Mount one strategy per configured WeChat client
    let mut registry = StrategyRegistry::new();
    mount::mount(&mut registry, &config.wechat, Arc::new(AcceptUser))?;
    for name in registry.names() {
        tracing::info!("Serving /passport/{name}");
    }

    let state = AppState {
        registry: Arc::new(registry),
        config: config.clone(),
    };

    let app = passport_wechat::routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
