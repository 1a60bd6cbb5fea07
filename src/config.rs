use std::collections::BTreeMap;
use std::env;

use serde::Deserialize;

use crate::auth::providers::wechat::{DEFAULT_API_BASE, DEFAULT_OPEN_BASE};
use crate::error::AppError;

/// Settings for one WeChat application (one mounted strategy).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub key: Option<String>,
    pub secret: Option<String>,
    #[serde(alias = "callbackURL")]
    pub callback_url: Option<String>,
    pub scope: Option<String>,
    pub lang: Option<String>,
    pub state: Option<String>,
    pub client: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PassportWechatConfig {
    /// Used as-is when `clients` is empty; otherwise only its `state` and
    /// `client` apply, to every entry of `clients`.
    pub base: ClientConfig,
    pub clients: BTreeMap<String, ClientConfig>,
    pub api_base: String,
    pub open_base: String,
}

impl Default for PassportWechatConfig {
    fn default() -> Self {
        Self {
            base: ClientConfig::default(),
            clients: BTreeMap::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            open_base: DEFAULT_OPEN_BASE.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origins: String,
    pub wechat: PassportWechatConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let clients = match env::var("WECHAT_CLIENTS") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .map_err(|e| AppError::Config(format!("WECHAT_CLIENTS is not valid JSON: {e}")))?,
            _ => BTreeMap::new(),
        };

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string()),
            wechat: PassportWechatConfig {
                base: ClientConfig {
                    key: env::var("WECHAT_KEY").ok(),
                    secret: env::var("WECHAT_SECRET").ok(),
                    callback_url: env::var("WECHAT_CALLBACK_URL").ok(),
                    scope: env::var("WECHAT_SCOPE").ok(),
                    lang: env::var("WECHAT_LANG").ok(),
                    state: env::var("WECHAT_STATE").ok(),
                    client: env::var("WECHAT_CLIENT").ok(),
                },
                clients,
                api_base: env::var("WECHAT_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
                open_base: env::var("WECHAT_OPEN_BASE")
                    .unwrap_or_else(|_| DEFAULT_OPEN_BASE.to_string()),
            },
        })
    }
}
