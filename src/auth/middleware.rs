use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, OriginalUri, Query},
    http::{header, request::Parts},
};
use serde::Deserialize;

use crate::error::AppError;

/// Query parameters WeChat appends when redirecting back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl CallbackQuery {
    /// Empty values count as absent.
    fn normalized(self) -> Self {
        Self {
            code: self.code.filter(|c| !c.is_empty()),
            state: self.state.filter(|s| !s.is_empty()),
        }
    }
}

/// The slice of an incoming request the strategy looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: String,
    pub protocol: String,
    pub host: String,
    /// Path and query as the client sent them, before any router nesting.
    pub original_url: String,
    pub query: CallbackQuery,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            original_url: "/".to_string(),
            query: CallbackQuery::default(),
        }
    }
}

impl RequestContext {
    /// `protocol://host/original_url`, the fallback callback URL.
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.original_url)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());

        let query = Query::<CallbackQuery>::try_from_uri(&uri)
            .map_err(|e| AppError::BadRequest(format!("Invalid callback query: {e}")))?
            .0
            .normalized();

        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let protocol = header_str("x-forwarded-proto")
            .or_else(|| uri.scheme_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());

        let host = header_str(header::HOST.as_str())
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        let original_url = uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| "/".to_string());

        Ok(RequestContext {
            method: parts.method.to_string(),
            protocol,
            host,
            original_url,
            query,
        })
    }
}
