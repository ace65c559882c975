use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use http::request::Parts;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

/// An identity known to the application, native or provider-backed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

impl UserIdentity {
    /// An identity with nothing but its uid.
    pub fn bare(uid: impl Into<String>) -> Self {
        UserIdentity {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
        }
    }
}

/// Local uid for a provider account. The prefix keeps provider ids from
/// colliding with native uids in the shared users collection.
pub fn namespaced_uid(provider: &str, provider_id: &str) -> String {
    format!("{}:{}", provider, provider_id)
}

/// Keeps a photo URL only when it is an absolute http(s) URL with a host.
pub fn sanitize_photo_url(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            Some(raw.to_string())
        }
        Ok(url) => {
            debug!("Dropping photo URL with scheme '{}'", url.scheme());
            None
        }
        Err(e) => {
            debug!("Dropping malformed photo URL: {}", e);
            None
        }
    }
}

/// Resolves the caller's identity from a `Bearer` session credential.
/// Any failure is reported as `AuthRequired`.
impl FromRequestParts<AppState> for UserIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let token = parts
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                let (scheme, token) = value.split_once(' ')?;
                scheme
                    .eq_ignore_ascii_case("bearer")
                    .then(|| token.trim().to_string())
            })
            .ok_or_else(|| {
                debug!("No bearer credential from IP '{}'", client_ip);
                AppError::AuthRequired
            })?;

        let claims = state.sessions.verify(&token).map_err(|e| {
            warn!("Rejected session credential from IP '{}': {}", client_ip, e);
            AppError::AuthRequired
        })?;

        match state.store.get_user(&claims.uid).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                debug!("No stored profile for '{}', using bare identity", claims.uid);
                Ok(UserIdentity::bare(claims.uid))
            }
            Err(_) if !state.store.is_enabled() => Ok(UserIdentity::bare(claims.uid)),
            Err(e) => Err(AppError::Store(e)),
        }
    }
}
