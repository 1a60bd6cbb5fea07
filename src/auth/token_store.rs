use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::auth::providers::TokenResponse;
use crate::error::AppError;

/// WeChat refresh tokens last 30 days; past that a cached entry is useless.
pub const REFRESH_TOKEN_LIFETIME_DAYS: i64 = 30;

/// A user access token as cached between the code exchange and later
/// user-info calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub scope: String,
    pub openid: String,
    pub unionid: Option<String>,
    pub create_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn from_response(resp: &TokenResponse) -> Self {
        Self {
            access_token: resp.access_token.clone(),
            refresh_token: resp.refresh_token.clone(),
            expires_in: resp.expires_in,
            scope: resp.scope.clone(),
            openid: resp.openid.clone(),
            unionid: resp.unionid.clone(),
            create_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now < self.create_at + Duration::seconds(self.expires_in)
    }

    /// Whether the refresh token can still renew this entry.
    pub fn is_refreshable_at(&self, now: DateTime<Utc>) -> bool {
        !self.refresh_token.is_empty()
            && now < self.create_at + Duration::days(REFRESH_TOKEN_LIFETIME_DAYS)
    }
}

/// Where user tokens live between requests, keyed by openid.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_token(&self, openid: &str) -> Result<Option<AccessToken>, AppError>;
    async fn save_token(&self, openid: &str, token: AccessToken) -> Result<(), AppError>;
}

/// Process-local token cache. Entries that can neither be used nor refreshed
/// are dropped on every save.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, AccessToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get_token(&self, openid: &str) -> Result<Option<AccessToken>, AppError> {
        Ok(self.tokens.read().await.get(openid).cloned())
    }

    async fn save_token(&self, openid: &str, token: AccessToken) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, cached| cached.is_valid_at(now) || cached.is_refreshable_at(now));
        tokens.insert(openid.to_string(), token);
        Ok(())
    }
}
