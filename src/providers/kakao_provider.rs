use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use super::base::{IdentityProvider, ProviderProfile};
use crate::error::AppError;
use crate::utils::value::value_to_string;

/// Config for Kakao login. Endpoints default to Kakao's public API and are
/// only overridden in tests.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct KakaoProviderConfig {
    pub name: String,
    pub client_id: String,
    pub redirect_uri: String,
    /// Public-client flow when absent.
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_profile_url")]
    pub profile_url: String,
    #[serde(default = "default_placeholder_email_domain")]
    pub placeholder_email_domain: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

fn default_authorize_url() -> String {
    "https://kauth.kakao.com/oauth/authorize".to_string()
}

fn default_token_url() -> String {
    "https://kauth.kakao.com/oauth/token".to_string()
}

fn default_profile_url() -> String {
    "https://kapi.kakao.com/v2/user/me".to_string()
}

fn default_placeholder_email_domain() -> String {
    "users.wishtree.invalid".to_string()
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct KakaoProvider {
    config: KakaoProviderConfig,
    http: reqwest::Client,
}

impl KakaoProvider {
    pub fn new(config: &KakaoProviderConfig) -> Result<Self, String> {
        info!("Creating KakaoProvider name='{}'", config.name);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            config: config.clone(),
            http,
        })
    }

    /// Kakao reports the nickname and image under `properties` and, for newer
    /// apps, under `kakao_account.profile`.
    fn parse_profile(body: &Value) -> Option<ProviderProfile> {
        let provider_id = value_to_string(&body["id"])?;
        let account = &body["kakao_account"];
        let profile = &account["profile"];

        let display_name = value_to_string(&body["properties"]["nickname"])
            .or_else(|| value_to_string(&profile["nickname"]));
        let photo_url = value_to_string(&body["properties"]["profile_image"])
            .or_else(|| value_to_string(&profile["profile_image_url"]));
        let email = value_to_string(&account["email"]);

        Some(ProviderProfile {
            provider: "kakao".to_string(),
            provider_id,
            email,
            display_name,
            photo_url,
        })
    }
}

#[async_trait]
impl IdentityProvider for KakaoProvider {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn get_type(&self) -> &str {
        "kakao"
    }

    fn authorization_url(&self) -> Result<Url, String> {
        Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
            ],
        )
        .map_err(|e| format!("Invalid authorize_url: {}", e))
    }

    fn placeholder_email(&self, provider_id: &str) -> String {
        format!(
            "kakao_{}@{}",
            provider_id, self.config.placeholder_email_domain
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        debug!("Exchanging authorization code at '{}'", self.config.token_url);

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Kakao token request failed: {}", e);
                AppError::UpstreamToken {
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    body: e.to_string(),
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("Kakao token endpoint rejected the code with status {}", status);
            debug!("Kakao token error body: {}", body);
            return Err(AppError::UpstreamToken {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Kakao token response is not usable: {}", e);
            debug!("Kakao token response body: {}", body);
            AppError::UpstreamToken {
                status: status.as_u16(),
                body: body.clone(),
            }
        })?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError> {
        debug!("Fetching Kakao profile from '{}'", self.config.profile_url);

        let resp = self
            .http
            .get(&self.config.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                error!("Kakao profile request failed: {}", e);
                AppError::UpstreamProfile {
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    body: e.to_string(),
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("Kakao profile endpoint returned status {}", status);
            debug!("Kakao profile error body: {}", body);
            return Err(AppError::UpstreamProfile {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<Value>(&body)
            .ok()
            .as_ref()
            .and_then(Self::parse_profile)
            .ok_or_else(|| {
                error!("Kakao profile response has no usable id");
                debug!("Kakao profile body: {}", body);
                AppError::UpstreamProfile {
                    status: status.as_u16(),
                    body,
                }
            })
    }
}
