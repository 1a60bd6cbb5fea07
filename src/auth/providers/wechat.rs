use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::{AuthorizeVariant, OAuthClient, RawProfile, TokenResponse};
use crate::auth::token_store::{AccessToken, MemoryTokenStore, TokenStore};
use crate::error::AppError;

pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";
pub const DEFAULT_OPEN_BASE: &str = "https://open.weixin.qq.com";

/// WeChat web OAuth client (official-account and open-platform flavours).
#[derive(Clone)]
pub struct WeChatOAuth {
    appid: String,
    secret: String,
    api_base: String,
    open_base: String,
    store: Arc<dyn TokenStore>,
    http_client: reqwest::Client,
}

impl WeChatOAuth {
    pub fn new(appid: &str, secret: &str) -> Self {
        Self {
            appid: appid.to_string(),
            secret: secret.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            open_base: DEFAULT_OPEN_BASE.to_string(),
            store: Arc::new(MemoryTokenStore::new()),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_endpoints(mut self, api_base: &str, open_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.open_base = open_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Trade a refresh token for a fresh access token and cache it.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessToken, AppError> {
        let url = self.api_url(
            "/sns/oauth2/refresh_token",
            &[
                ("appid", self.appid.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )?;

        let resp: TokenResponse = self.get_json(url).await?;
        let token = AccessToken::from_response(&resp);
        self.store.save_token(&token.openid, token.clone()).await?;
        Ok(token)
    }

    fn api_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, AppError> {
        Url::parse_with_params(&format!("{}{path}", self.api_base), params)
            .map_err(|e| AppError::Internal(format!("Failed to build WeChat URL: {e}")))
    }

    /// GET a WeChat endpoint, surfacing a non-zero `errcode` as an error.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, AppError> {
        let body: Value = self.http_client.get(url).send().await?.json().await?;

        if let Some(errcode) = body.get("errcode").and_then(Value::as_i64) {
            if errcode != 0 {
                let errmsg = body
                    .get("errmsg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Err(AppError::WeChatApi {
                    code: errcode,
                    message: errmsg,
                });
            }
        }

        serde_json::from_value(body)
            .map_err(|e| AppError::Internal(format!("Unexpected WeChat response: {e}")))
    }
}

#[async_trait]
impl OAuthClient for WeChatOAuth {
    fn authorize_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
        scope: &str,
        variant: AuthorizeVariant,
    ) -> Result<String, AppError> {
        let path = match variant {
            AuthorizeVariant::Wechat => "/connect/oauth2/authorize",
            AuthorizeVariant::Website => "/connect/qrconnect",
        };

        let mut url = Url::parse_with_params(
            &format!("{}{path}", self.open_base),
            &[
                ("appid", self.appid.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope),
                ("state", state.unwrap_or_default()),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to build WeChat URL: {e}")))?;
        url.set_fragment(Some("wechat_redirect"));

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let url = self.api_url(
            "/sns/oauth2/access_token",
            &[
                ("appid", self.appid.as_str()),
                ("secret", self.secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ],
        )?;

        let resp: TokenResponse = self.get_json(url).await?;
        // base-scope grants never reach the userinfo endpoint
        if !resp.is_base_scope() {
            self.store
                .save_token(&resp.openid, AccessToken::from_response(&resp))
                .await?;
        }

        Ok(resp)
    }

    async fn fetch_profile(&self, openid: &str, lang: &str) -> Result<RawProfile, AppError> {
        let cached = self
            .store
            .get_token(openid)
            .await?
            .ok_or_else(|| AppError::TokenNotFound(openid.to_string()))?;

        let token = if cached.is_valid() {
            cached
        } else {
            tracing::debug!("access token for {openid} expired, refreshing");
            self.refresh_access_token(&cached.refresh_token).await?
        };

        let url = self.api_url(
            "/sns/userinfo",
            &[
                ("access_token", token.access_token.as_str()),
                ("openid", openid),
                ("lang", lang),
            ],
        )?;

        self.get_json(url).await
    }
}
