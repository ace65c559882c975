use super::kakao_provider::{KakaoProvider, KakaoProviderConfig};
use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::State, Json};
use reqwest::Url;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

/// Configuration options for each identity provider.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "kakao")]
    Kakao(KakaoProviderConfig),
}

/// The profile a provider returned for an access token, before any local
/// normalization. `photo_url` is whatever the provider sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider: String,
    pub provider_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// An external OAuth-style identity provider using the authorization code flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Route key, as in `/api/auth/{name}`.
    fn get_name(&self) -> &str;
    /// Provider kind; also the uid namespace.
    fn get_type(&self) -> &str;
    /// Where `beginLogin` sends the browser.
    fn authorization_url(&self) -> Result<Url, String>;
    /// Synthetic address for accounts that did not grant the email scope.
    fn placeholder_email(&self, provider_id: &str) -> String;
    /// Trades a single-use authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, AppError>;
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError>;
}

/// Create an identity provider from a given config.
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn IdentityProvider>, String> {
    match config {
        ProviderConfig::Kakao(cfg) => Ok(Box::new(KakaoProvider::new(cfg)?)),
    }
}

/// The configured providers, looked up by name.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    pub fn new(configs: &[ProviderConfig]) -> Result<Self, String> {
        info!("Creating identity providers...");
        let providers = configs
            .iter()
            .map(create_provider)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProviderRegistry { providers })
    }

    pub fn from_providers(providers: Vec<Box<dyn IdentityProvider>>) -> Self {
        ProviderRegistry { providers }
    }

    pub fn get(&self, name: &str) -> Result<&dyn IdentityProvider, AppError> {
        self.providers
            .iter()
            .find(|p| p.get_name().eq_ignore_ascii_case(name))
            .map(|p| p.as_ref())
            .ok_or_else(|| AppError::ProviderNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn IdentityProvider> {
        self.providers.iter().map(|p| p.as_ref())
    }
}

/// GET /providers endpoint: returns the "name", "type" and login path of each
/// provider. Client ids, secrets and endpoints stay private.
pub async fn list_providers(State(state): State<AppState>) -> Json<Value> {
    let providers: Vec<Value> = state
        .providers
        .iter()
        .map(|provider| {
            json!({
                "name": provider.get_name(),
                "type": provider.get_type(),
                "login": format!("/api/auth/{}/authorize", provider.get_name()),
            })
        })
        .collect();

    info!("Returning provider list. Number of providers: {}", providers.len());
    Json(json!({ "providers": providers }))
}
