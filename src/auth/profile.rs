use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::providers::RawProfile;
use crate::error::AppError;

pub const PROVIDER_PLATFORM: &str = "wechat";
pub const PROVIDER_MEDIA: &str = "wechat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// WeChat `sex`: 1 male, 2 female, anything else unknown.
    pub fn from_sex_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Gender::Male,
            Some(2) => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

/// The provider-independent user record handed to the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalUser {
    pub provider_platform: String,
    pub provider_media: String,
    pub provider: String,
    pub id: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub photo: Option<String>,
    pub gender: Gender,
    pub expires_in: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub profile: RawProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenFields {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Build the canonical user for the client mounted as `provider`.
///
/// `id` is the unionid when WeChat sent one, the openid otherwise. The
/// returned profile keeps every provider field and adds `_raw`, the JSON
/// text of the profile as received.
pub fn normalize(
    provider: &str,
    tokens: TokenFields,
    mut profile: RawProfile,
) -> Result<CanonicalUser, AppError> {
    let id = profile
        .unionid()
        .or_else(|| profile.openid())
        .ok_or(AppError::MissingIdentity)?
        .to_string();

    let raw = serde_json::to_string(&profile)
        .map_err(|e| AppError::Internal(format!("Failed to serialize profile: {e}")))?;

    let nickname = profile.nickname().map(str::to_string);
    let photo = profile.headimgurl().map(str::to_string);
    let gender = Gender::from_sex_code(profile.sex());

    profile.insert("_raw", Value::String(raw));

    Ok(CanonicalUser {
        provider_platform: PROVIDER_PLATFORM.to_string(),
        provider_media: PROVIDER_MEDIA.to_string(),
        provider: provider.to_string(),
        id,
        name: nickname.clone(),
        display_name: nickname,
        photo,
        gender,
        expires_in: tokens.expires_in,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        profile,
    })
}
