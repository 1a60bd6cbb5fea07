pub mod wechat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Scope marker granting only `openid`/`unionid`.
pub const BASE_SCOPE: &str = "snsapi_base";

/// Which authorize endpoint the redirect should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeVariant {
    /// In-app authorization page, opened inside the WeChat client.
    Wechat,
    /// QR-code login page for desktop websites.
    Website,
}

impl AuthorizeVariant {
    /// Only the literal client name `"wechat"` selects the in-app page.
    pub fn for_client(client: Option<&str>) -> Self {
        match client {
            Some("wechat") => AuthorizeVariant::Wechat,
            _ => AuthorizeVariant::Website,
        }
    }
}

/// Body of a successful code exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    pub openid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unionid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenResponse {
    pub fn is_base_scope(&self) -> bool {
        self.scope.contains(BASE_SCOPE)
    }

    /// The minimal profile a base-scope grant carries.
    pub fn base_profile(&self) -> RawProfile {
        let mut profile = RawProfile::default();
        profile.insert("openid", Value::String(self.openid.clone()));
        if let Some(unionid) = &self.unionid {
            profile.insert("unionid", Value::String(unionid.clone()));
        }
        profile
    }

    /// All token fields as a profile-shaped object, ready for merging.
    pub fn into_fields(self) -> RawProfile {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => RawProfile(map),
            _ => RawProfile::default(),
        }
    }
}

/// Provider-shaped user fields, kept in the order WeChat sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProfile(pub Map<String, Value>);

impl RawProfile {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-empty string field.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn openid(&self) -> Option<&str> {
        self.get_str("openid")
    }

    pub fn unionid(&self) -> Option<&str> {
        self.get_str("unionid")
    }

    pub fn nickname(&self) -> Option<&str> {
        self.get_str("nickname")
    }

    pub fn headimgurl(&self) -> Option<&str> {
        self.get_str("headimgurl")
    }

    pub fn sex(&self) -> Option<i64> {
        self.0.get("sex").and_then(Value::as_i64)
    }

    /// Overlays `other` onto `self`; keys present in both take `other`'s value.
    pub fn merge(mut self, other: RawProfile) -> Self {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
        self
    }
}

/// The OAuth capability the strategy drives. Implementations own all HTTP
/// details of the provider.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    fn authorize_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
        scope: &str,
        variant: AuthorizeVariant,
    ) -> Result<String, AppError>;

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError>;

    async fn fetch_profile(&self, openid: &str, lang: &str) -> Result<RawProfile, AppError>;
}
