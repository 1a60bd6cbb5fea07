#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use passport_wechat::auth::mount::{self, AcceptUser, StrategyRegistry, UserHook};
use passport_wechat::auth::providers::{AuthorizeVariant, OAuthClient, RawProfile, TokenResponse};
use passport_wechat::config::{ClientConfig, Config, PassportWechatConfig};
use passport_wechat::error::AppError;
use passport_wechat::routes::create_router;
use passport_wechat::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

// ─── ScriptedClient ──────────────────────────────────────────────────────────

/// In-process OAuth client returning canned bodies and recording calls.
pub struct ScriptedClient {
    token: Result<Value, String>,
    profile: Result<Value, String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(token: Value, profile: Value) -> Self {
        Self {
            token: Ok(token),
            profile: Ok(profile),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_exchange(message: &str) -> Self {
        Self {
            token: Err(message.to_string()),
            profile: Ok(json!({})),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_profile(token: Value, message: &str) -> Self {
        Self {
            token: Ok(token),
            profile: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl OAuthClient for ScriptedClient {
    fn authorize_url(
        &self,
        redirect_uri: &str,
        state: Option<&str>,
        scope: &str,
        variant: AuthorizeVariant,
    ) -> Result<String, AppError> {
        let page = match variant {
            AuthorizeVariant::Wechat => "authorize",
            AuthorizeVariant::Website => "qrconnect",
        };
        self.record(format!("authorize:{page}"));
        Ok(format!(
            "https://open.test/{page}?redirect_uri={redirect_uri}&scope={scope}&state={}",
            state.unwrap_or_default()
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        self.record(format!("exchange:{code}"));
        let body = self.token.clone().map_err(|message| AppError::WeChatApi {
            code: 40029,
            message,
        })?;
        Ok(serde_json::from_value(body).unwrap())
    }

    async fn fetch_profile(&self, openid: &str, lang: &str) -> Result<RawProfile, AppError> {
        self.record(format!("profile:{openid}:{lang}"));
        let body = self.profile.clone().map_err(|message| AppError::WeChatApi {
            code: 40001,
            message,
        })?;
        Ok(serde_json::from_value(body).unwrap())
    }
}

pub fn base_token() -> Value {
    json!({
        "openid": "o1",
        "unionid": "u1",
        "scope": "snsapi_base",
        "access_token": "a",
        "refresh_token": "r",
        "expires_in": 7200,
    })
}

pub fn full_token() -> Value {
    json!({
        "openid": "o2",
        "scope": "snsapi_userinfo",
        "access_token": "a2",
        "refresh_token": "r2",
        "expires_in": 7200,
    })
}

// ─── FakeWeChat ──────────────────────────────────────────────────────────────

pub const APP_ID: &str = "wx-test-app";
pub const APP_SECRET: &str = "wx-test-secret";

#[derive(Clone, Default)]
struct FakeState {
    hits: Arc<Mutex<Vec<String>>>,
}

/// A local stand-in for api.weixin.qq.com.
///
/// Codes: `base-code` grants snsapi_base for o1/u1, `full-code` grants
/// snsapi_userinfo for o2 (access token `ACCESS_FULL`), anything else is
/// rejected with errcode 40029. `REFRESH_FULL` refreshes o2's token.
pub struct FakeWeChat {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl FakeWeChat {
    pub async fn spawn() -> Self {
        let state = FakeState::default();
        let hits = Arc::clone(&state.hits);

        let app = Router::new()
            .route("/sns/oauth2/access_token", get(fake_access_token))
            .route("/sns/oauth2/refresh_token", get(fake_refresh_token))
            .route("/sns/userinfo", get(fake_userinfo))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

async fn fake_access_token(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.hits.lock().unwrap().push("access_token".to_string());

    if params.get("appid").map(String::as_str) != Some(APP_ID)
        || params.get("secret").map(String::as_str) != Some(APP_SECRET)
    {
        return Json(json!({"errcode": 40125, "errmsg": "invalid appsecret"}));
    }

    match params.get("code").map(String::as_str) {
        Some("base-code") => Json(json!({
            "access_token": "ACCESS_BASE",
            "expires_in": 7200,
            "refresh_token": "REFRESH_BASE",
            "openid": "o1",
            "scope": "snsapi_base",
            "unionid": "u1",
        })),
        Some("full-code") => Json(json!({
            "access_token": "ACCESS_FULL",
            "expires_in": 7200,
            "refresh_token": "REFRESH_FULL",
            "openid": "o2",
            "scope": "snsapi_userinfo",
        })),
        _ => Json(json!({"errcode": 40029, "errmsg": "invalid code"})),
    }
}

async fn fake_refresh_token(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.hits.lock().unwrap().push("refresh_token".to_string());

    match params.get("refresh_token").map(String::as_str) {
        Some("REFRESH_FULL") => Json(json!({
            "access_token": "ACCESS_FULL",
            "expires_in": 7200,
            "refresh_token": "REFRESH_FULL",
            "openid": "o2",
            "scope": "snsapi_userinfo",
        })),
        _ => Json(json!({"errcode": 40030, "errmsg": "invalid refresh_token"})),
    }
}

async fn fake_userinfo(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.hits.lock().unwrap().push("userinfo".to_string());

    if params.get("access_token").map(String::as_str) != Some("ACCESS_FULL") {
        return Json(json!({"errcode": 40001, "errmsg": "invalid credential"}));
    }

    Json(json!({
        "openid": params.get("openid"),
        "nickname": "Alice",
        "sex": 2,
        "province": "Guangdong",
        "city": "Shenzhen",
        "country": "CN",
        "headimgurl": "h",
        "privilege": [],
        "language": params.get("lang"),
    }))
}

// ─── TestResponse ────────────────────────────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub headers: HeaderMap,
    body_bytes: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body_bytes).unwrap_or_else(|e| {
            panic!(
                "Failed to deserialize response as {}: {e}\nBody: {}",
                std::any::type_name::<T>(),
                self.text()
            )
        })
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status, expected,
            "Expected status {expected}, got {}. Body: {}",
            self.status,
            self.text()
        );
    }
}

// ─── TestApp ─────────────────────────────────────────────────────────────────

pub fn client_config(key: &str, secret: &str) -> ClientConfig {
    ClientConfig {
        key: Some(key.to_string()),
        secret: Some(secret.to_string()),
        ..ClientConfig::default()
    }
}

pub fn wechat_config(fake: &FakeWeChat, base: ClientConfig) -> PassportWechatConfig {
    PassportWechatConfig {
        base,
        clients: BTreeMap::new(),
        api_base: fake.base_url.clone(),
        open_base: "https://open.test".to_string(),
    }
}

pub struct TestApp {
    router: Router,
    pub fake: FakeWeChat,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_hook(Arc::new(AcceptUser)).await
    }

    pub async fn with_hook(hook: Arc<dyn UserHook>) -> Self {
        let fake = FakeWeChat::spawn().await;

        let mut clients = BTreeMap::new();
        clients.insert(
            "wechat".to_string(),
            ClientConfig {
                client: Some("wechat".to_string()),
                ..client_config(APP_ID, APP_SECRET)
            },
        );
        clients.insert("web".to_string(), client_config(APP_ID, APP_SECRET));

        let wechat = PassportWechatConfig {
            clients,
            ..wechat_config(&fake, ClientConfig::default())
        };

        let mut registry = StrategyRegistry::new();
        mount::mount(&mut registry, &wechat, hook).expect("Failed to mount strategies");

        let config = Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origins: "https://app.test".to_string(),
            wechat,
        };

        let state = AppState {
            registry: Arc::new(registry),
            config,
        };

        Self {
            router: create_router(state),
            fake,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .header("Host", "app.test")
            .body(Body::empty())
            .unwrap();

        self.request(req).await
    }

    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot failed");

        let status = resp.status();
        let headers = resp.headers().clone();
        let location = resp
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body_bytes = resp
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            location,
            headers,
            body_bytes,
        }
    }
}
