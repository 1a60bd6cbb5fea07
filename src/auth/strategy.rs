use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;

use crate::auth::middleware::{CallbackQuery, RequestContext};
use crate::auth::profile::CanonicalUser;
use crate::auth::providers::wechat::WeChatOAuth;
use crate::auth::providers::{AuthorizeVariant, OAuthClient, RawProfile};
use crate::error::AppError;

pub const DEFAULT_NAME: &str = "wechat";
pub const DEFAULT_SCOPE: &str = "snsapi_userinfo";
pub const DEFAULT_LANG: &str = "en";

/// `code` WeChat sends when the user refuses to share their profile.
pub const AUTH_DENY_CODE: &str = "authdeny";

type Resolver = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;

/// A setting that is either fixed or computed from the current request.
#[derive(Clone)]
pub enum RequestValue {
    Static(String),
    Derived(Resolver),
}

impl RequestValue {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        RequestValue::Derived(Arc::new(f))
    }

    pub fn resolve(&self, req: &RequestContext) -> Option<String> {
        match self {
            RequestValue::Static(value) => Some(value.clone()),
            RequestValue::Derived(f) => f(req),
        }
    }
}

impl fmt::Debug for RequestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            RequestValue::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl From<&str> for RequestValue {
    fn from(value: &str) -> Self {
        RequestValue::Static(value.to_string())
    }
}

impl From<String> for RequestValue {
    fn from(value: String) -> Self {
        RequestValue::Static(value)
    }
}

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub name: String,
    pub app_id: String,
    pub app_secret: String,
    /// Falls back to the URL of the current request.
    pub callback_url: Option<RequestValue>,
    pub scope: String,
    pub lang: String,
    pub state: Option<RequestValue>,
    /// Selects the authorize page; see [`AuthorizeVariant::for_client`].
    pub client: Option<RequestValue>,
    pub pass_req_to_callback: bool,
}

impl StrategyConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            callback_url: None,
            scope: DEFAULT_SCOPE.to_string(),
            lang: DEFAULT_LANG.to_string(),
            state: None,
            client: None,
            pass_req_to_callback: false,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.app_id.is_empty() {
            return Err(AppError::MissingAppId);
        }
        if self.app_secret.is_empty() {
            return Err(AppError::MissingAppSecret);
        }
        Ok(())
    }
}

/// Per-call overrides; each takes precedence over the configured value.
#[derive(Debug, Clone, Default)]
pub struct AuthenticateOptions {
    pub callback_url: Option<String>,
    pub scope: Option<String>,
    pub state: Option<RequestValue>,
    pub client: Option<RequestValue>,
}

/// Why authentication was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Status(StatusCode),
    Info(Option<Value>),
}

/// What the host middleware should do with the request.
#[derive(Debug)]
pub enum AuthOutcome {
    Success {
        user: CanonicalUser,
        info: Option<Value>,
    },
    Fail(Failure),
    Error(AppError),
    Redirect {
        url: String,
        status: StatusCode,
    },
}

/// Everything the verify step receives for one callback.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    /// Present only when the strategy was built with `pass_req_to_callback`.
    pub request: Option<RequestContext>,
    pub access_token: String,
    pub refresh_token: String,
    pub profile: RawProfile,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verified {
    pub user: Option<CanonicalUser>,
    pub info: Option<Value>,
}

impl Verified {
    pub fn accept(user: CanonicalUser) -> Self {
        Self {
            user: Some(user),
            info: None,
        }
    }

    pub fn reject(info: Option<Value>) -> Self {
        Self { user: None, info }
    }
}

pub type VerifyResult = Result<Verified, AppError>;

/// Turns provider tokens and profile into an application user. Returning
/// completes the verification; an `Err` is reported as an error, a
/// `Verified` without a user as a rejection.
#[async_trait]
pub trait Verify: Send + Sync {
    async fn verify(&self, input: VerifyRequest) -> VerifyResult;
}

/// Adapts an async closure into a [`Verify`].
pub struct VerifyFn<F>(F);

pub fn verify_fn<F, Fut>(f: F) -> VerifyFn<F>
where
    F: Fn(VerifyRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = VerifyResult> + Send + 'static,
{
    VerifyFn(f)
}

#[async_trait]
impl<F, Fut> Verify for VerifyFn<F>
where
    F: Fn(VerifyRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = VerifyResult> + Send + 'static,
{
    async fn verify(&self, input: VerifyRequest) -> VerifyResult {
        (self.0)(input).await
    }
}

/// Where a request sits in the login flow, judged from its query alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Initiate,
    Denied,
    ExplicitDeny,
    CodeExchange(&'a str),
}

impl<'a> Step<'a> {
    pub fn classify(query: &'a CallbackQuery) -> Self {
        match (query.code.as_deref(), query.state.as_deref()) {
            (None, Some(_)) => Step::Denied,
            (Some(AUTH_DENY_CODE), _) => Step::ExplicitDeny,
            (Some(code), _) => Step::CodeExchange(code),
            (None, None) => Step::Initiate,
        }
    }
}

/// WeChat login strategy. Holds no per-request state; one instance serves
/// every request for its client.
pub struct WechatStrategy {
    config: StrategyConfig,
    oauth: Arc<dyn OAuthClient>,
    verify: Arc<dyn Verify>,
}

impl WechatStrategy {
    /// Strategy backed by the default WeChat OAuth client.
    pub fn new(config: StrategyConfig, verify: Arc<dyn Verify>) -> Result<Self, AppError> {
        config.validate()?;
        let oauth = Arc::new(WeChatOAuth::new(&config.app_id, &config.app_secret));
        Ok(Self {
            config,
            oauth,
            verify,
        })
    }

    pub fn with_client(
        config: StrategyConfig,
        oauth: Arc<dyn OAuthClient>,
        verify: Arc<dyn Verify>,
    ) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            config,
            oauth,
            verify,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub async fn authenticate(
        &self,
        req: &RequestContext,
        options: &AuthenticateOptions,
    ) -> AuthOutcome {
        match Step::classify(&req.query) {
            Step::Denied | Step::ExplicitDeny => {
                AuthOutcome::Fail(Failure::Status(StatusCode::UNAUTHORIZED))
            }
            Step::Initiate => match self.redirect(req, options) {
                Ok(outcome) => outcome,
                Err(e) => AuthOutcome::Error(e),
            },
            Step::CodeExchange(code) => match self.exchange(req, code).await {
                Ok(outcome) => outcome,
                Err(e) => AuthOutcome::Error(e),
            },
        }
    }

    fn redirect(
        &self,
        req: &RequestContext,
        options: &AuthenticateOptions,
    ) -> Result<AuthOutcome, AppError> {
        let state = options
            .state
            .as_ref()
            .or(self.config.state.as_ref())
            .and_then(|value| value.resolve(req));

        let callback_url = options
            .callback_url
            .clone()
            .or_else(|| {
                self.config
                    .callback_url
                    .as_ref()
                    .and_then(|value| value.resolve(req))
            })
            .unwrap_or_else(|| req.url());

        let scope = options.scope.as_deref().unwrap_or(&self.config.scope);

        let client = options
            .client
            .as_ref()
            .or(self.config.client.as_ref())
            .and_then(|value| value.resolve(req));

        let variant = AuthorizeVariant::for_client(client.as_deref());
        let location = self
            .oauth
            .authorize_url(&callback_url, state.as_deref(), scope, variant)?;

        tracing::debug!("redirect -> {location}");

        Ok(AuthOutcome::Redirect {
            url: location,
            status: StatusCode::FOUND,
        })
    }

    async fn exchange(&self, req: &RequestContext, code: &str) -> Result<AuthOutcome, AppError> {
        tracing::debug!("wechat callback -> {}", req.original_url);

        let token = self.oauth.exchange_code(code).await?;
        tracing::debug!(
            openid = %token.openid,
            scope = %token.scope,
            "fetched access token"
        );

        let input = if token.is_base_scope() {
            VerifyRequest {
                request: None,
                access_token: token.access_token.clone(),
                refresh_token: token.refresh_token.clone(),
                profile: token.base_profile(),
                expires_in: token.expires_in,
            }
        } else {
            let fetched = self
                .oauth
                .fetch_profile(&token.openid, &self.config.lang)
                .await
                .inspect_err(|e| tracing::debug!("fetch userinfo by openid error -> {e}"))?;
            tracing::debug!(openid = %token.openid, "fetched userinfo");

            let merged = token.into_fields().merge(fetched);
            VerifyRequest {
                request: None,
                access_token: merged.get_str("access_token").unwrap_or_default().to_string(),
                refresh_token: merged.get_str("refresh_token").unwrap_or_default().to_string(),
                expires_in: merged
                    .get("expires_in")
                    .and_then(Value::as_i64)
                    .unwrap_or_default(),
                profile: merged,
            }
        };

        let input = VerifyRequest {
            request: self.config.pass_req_to_callback.then(|| req.clone()),
            ..input
        };

        Ok(self.run_verify(input).await)
    }

    /// Runs verify on its own task so that a panic inside it becomes an
    /// error outcome instead of unwinding through the caller.
    async fn run_verify(&self, input: VerifyRequest) -> AuthOutcome {
        let verify = Arc::clone(&self.verify);

        match tokio::spawn(async move { verify.verify(input).await }).await {
            Ok(Ok(Verified {
                user: Some(user),
                info,
            })) => AuthOutcome::Success { user, info },
            Ok(Ok(Verified { user: None, info })) => AuthOutcome::Fail(Failure::Info(info)),
            Ok(Err(e)) => AuthOutcome::Error(e),
            Err(e) if e.is_panic() => AuthOutcome::Error(AppError::VerifyPanicked),
            Err(e) => AuthOutcome::Error(AppError::Internal(format!("Verify task failed: {e}"))),
        }
    }
}
