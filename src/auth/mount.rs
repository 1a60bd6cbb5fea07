use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::middleware::RequestContext;
use crate::auth::profile::{self, CanonicalUser, TokenFields};
use crate::auth::providers::wechat::WeChatOAuth;
use crate::auth::strategy::{
    StrategyConfig, Verified, Verify, VerifyRequest, VerifyResult, WechatStrategy, DEFAULT_NAME,
};
use crate::config::{ClientConfig, PassportWechatConfig};
use crate::error::AppError;

/// Named strategies the host can dispatch requests to.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<WechatStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, strategy: WechatStrategy) {
        tracing::info!("Registered strategy {name}");
        self.strategies.insert(name.to_string(), Arc::new(strategy));
    }

    pub fn get(&self, name: &str) -> Option<Arc<WechatStrategy>> {
        self.strategies.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}

/// Host-side acceptance of a normalized user, run after every successful
/// provider round trip.
#[async_trait]
pub trait UserHook: Send + Sync {
    async fn verify_user(
        &self,
        req: Option<&RequestContext>,
        user: CanonicalUser,
    ) -> VerifyResult;
}

/// Accepts every user unchanged.
pub struct AcceptUser;

#[async_trait]
impl UserHook for AcceptUser {
    async fn verify_user(
        &self,
        _req: Option<&RequestContext>,
        user: CanonicalUser,
    ) -> VerifyResult {
        Ok(Verified::accept(user))
    }
}

/// Verify step installed by [`mount`]: normalize, then ask the host.
struct NormalizingVerify {
    provider: String,
    hook: Arc<dyn UserHook>,
}

#[async_trait]
impl Verify for NormalizingVerify {
    async fn verify(&self, input: VerifyRequest) -> VerifyResult {
        let tokens = TokenFields {
            access_token: input.access_token,
            refresh_token: input.refresh_token,
            expires_in: input.expires_in,
        };
        let user = profile::normalize(&self.provider, tokens, input.profile)?;

        if let Some(req) = &input.request {
            tracing::debug!(
                "{} {} get user: {}",
                req.method,
                req.original_url,
                serde_json::to_string(&user).unwrap_or_default()
            );
        }

        self.hook.verify_user(input.request.as_ref(), user).await
    }
}

fn missing_config(field: &str) -> AppError {
    AppError::Config(format!("[passport-wechat] config.passportWechat.{field} required"))
}

fn strategy_config(name: &str, client: ClientConfig) -> Result<StrategyConfig, AppError> {
    let key = client
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| missing_config("key"))?;
    let secret = client
        .secret
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing_config("secret"))?;

    let mut config = StrategyConfig::new(key, secret);
    config.name = name.to_string();
    config.callback_url = client.callback_url.map(Into::into);
    config.state = client.state.map(Into::into);
    config.client = client.client.map(Into::into);
    config.pass_req_to_callback = true;
    if let Some(scope) = client.scope {
        config.scope = scope;
    }
    if let Some(lang) = client.lang {
        config.lang = lang;
    }

    Ok(config)
}

fn mount_one_client(
    registry: &mut StrategyRegistry,
    config: &PassportWechatConfig,
    client: ClientConfig,
    name: &str,
    hook: Arc<dyn UserHook>,
) -> Result<(), AppError> {
    let strategy_config = strategy_config(name, client)?;

    let oauth = WeChatOAuth::new(&strategy_config.app_id, &strategy_config.app_secret)
        .with_endpoints(&config.api_base, &config.open_base);
    let verify = NormalizingVerify {
        provider: name.to_string(),
        hook,
    };

    let strategy =
        WechatStrategy::with_client(strategy_config, Arc::new(oauth), Arc::new(verify))?;
    registry.register(name, strategy);
    Ok(())
}

/// Register one strategy per configured client, or a single `"wechat"`
/// strategy when no named clients are configured.
pub fn mount(
    registry: &mut StrategyRegistry,
    config: &PassportWechatConfig,
    hook: Arc<dyn UserHook>,
) -> Result<(), AppError> {
    if config.clients.is_empty() {
        return mount_one_client(registry, config, config.base.clone(), DEFAULT_NAME, hook);
    }

    for (name, client) in &config.clients {
        let mut client = client.clone();
        if let Some(state) = &config.base.state {
            client.state = Some(state.clone());
        }
        if let Some(variant) = &config.base.client {
            client.client = Some(variant.clone());
        }
        mount_one_client(registry, config, client, name, Arc::clone(&hook))?;
    }

    Ok(())
}
