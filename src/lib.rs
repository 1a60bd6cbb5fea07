pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use auth::mount::StrategyRegistry;
use config::Config;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StrategyRegistry>,
    pub config: Config,
}
