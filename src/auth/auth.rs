use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, ValidationError};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::session::{SessionCredential, SessionIssuer};
use crate::models::user::{namespaced_uid, sanitize_photo_url, UserIdentity};
use crate::providers::{IdentityProvider, ProviderProfile, ProviderRegistry};
use crate::store::Store;

/// What a successful login hands back to the client: the session credential
/// and the profile it is bound to, so the UI needs no second round trip.
#[derive(Serialize, Debug, Clone)]
pub struct ExchangeOutcome {
    pub token: SessionCredential,
    #[serde(rename = "userInfo")]
    pub user_info: UserIdentity,
}

/// Turns provider logins and native logins into session credentials.
pub struct Auth {
    pub(crate) providers: Arc<ProviderRegistry>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) sessions: Arc<SessionIssuer>,
    pub(crate) metrics: Metrics,
}

/// Builds the local identity for a provider profile: namespaced uid,
/// placeholder email when the provider withheld it, and only a well-formed photo URL.
pub fn identity_from_profile(
    provider: &dyn IdentityProvider,
    profile: &ProviderProfile,
) -> UserIdentity {
    UserIdentity {
        uid: namespaced_uid(provider.get_type(), &profile.provider_id),
        email: Some(
            profile
                .email
                .clone()
                .unwrap_or_else(|| provider.placeholder_email(&profile.provider_id)),
        ),
        display_name: profile.display_name.clone(),
        photo_url: sanitize_photo_url(profile.photo_url.as_deref()),
    }
}

fn result_label(result: &Result<ExchangeOutcome, AppError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(AppError::UpstreamToken { .. }) => "upstream_token_error",
        Err(AppError::UpstreamProfile { .. }) => "upstream_profile_error",
        Err(AppError::Validation(_)) => "invalid_request",
        Err(AppError::InvalidCredentials) => "invalid_credentials",
        Err(AppError::EmailInUse) => "email_in_use",
        Err(_) => "internal_error",
    }
}

impl Auth {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        store: Arc<dyn Store>,
        sessions: Arc<SessionIssuer>,
        metrics: Metrics,
    ) -> Self {
        Auth {
            providers,
            store,
            sessions,
            metrics,
        }
    }

    /// Exchanges a single-use authorization code for a session credential.
    ///
    /// Token and profile calls run in sequence; a failure in either aborts the
    /// whole exchange before anything is written. Nothing is retried.
    pub async fn exchange_code(
        &self,
        provider_name: &str,
        code: &str,
    ) -> Result<ExchangeOutcome, AppError> {
        let provider = self.providers.get(provider_name)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::EmptyCode.into());
        }

        let started = Instant::now();
        let result = self.run_exchange(provider, code).await;
        self.record(provider.get_type(), started, &result);

        if let Err(e) = &result {
            error!(provider = provider.get_name(), "Login failed: {}", e);
        }
        result
    }

    async fn run_exchange(
        &self,
        provider: &dyn IdentityProvider,
        code: &str,
    ) -> Result<ExchangeOutcome, AppError> {
        let access_token = provider.exchange_code(code).await?;
        let profile = provider.fetch_profile(&access_token).await?;
        if profile.photo_url.is_some() && sanitize_photo_url(profile.photo_url.as_deref()).is_none()
        {
            warn!(
                "Provider '{}' sent an unusable photo URL for id '{}'",
                provider.get_name(),
                profile.provider_id
            );
        }

        let identity = identity_from_profile(provider, &profile);
        let mut claims = HashMap::new();
        claims.insert("provider".to_string(), provider.get_type().to_string());
        claims.insert("provider_id".to_string(), profile.provider_id.clone());

        self.issue(identity, claims).await
    }

    /// Upserts the identity, then mints a credential bound to it.
    pub(crate) async fn issue(
        &self,
        identity: UserIdentity,
        claims: HashMap<String, String>,
    ) -> Result<ExchangeOutcome, AppError> {
        if !self.store.is_enabled() {
            debug!("Store disabled, not persisting profile of '{}'", identity.uid);
            let token = self
                .sessions
                .mint(&identity.uid, claims)
                .map_err(AppError::Session)?;
            return Ok(ExchangeOutcome {
                token,
                user_info: identity,
            });
        }

        let outcome = self.store.upsert_user(&identity).await.map_err(|e| {
            error!("Failed to upsert user '{}': {}", identity.uid, e);
            AppError::Store(e)
        })?;
        debug!("Upsert of '{}' resulted in {:?}", identity.uid, outcome);

        let snapshot = match self.store.get_user(&identity.uid).await {
            Ok(Some(stored)) => stored,
            Ok(None) => identity,
            Err(e) => {
                warn!("Could not re-read user '{}': {}", identity.uid, e);
                identity
            }
        };

        let token = self
            .sessions
            .mint(&snapshot.uid, claims)
            .map_err(AppError::Session)?;

        info!(uid = %snapshot.uid, "Issued session credential");
        Ok(ExchangeOutcome {
            token,
            user_info: snapshot,
        })
    }

    pub(crate) fn record(
        &self,
        provider: &str,
        started: Instant,
        result: &Result<ExchangeOutcome, AppError>,
    ) {
        self.metrics.record_login(provider, result_label(result));
        self.metrics
            .record_login_duration(provider, started.elapsed().as_secs_f64());
    }
}
