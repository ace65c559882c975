//! Login endpoints: provider redirect and code exchange, native register and login.

use axum::extract::{Path, State};
use axum::response::Redirect;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::auth::ExchangeOutcome;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::http_helpers::JsonBody;

/// Registers login routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/{provider}/authorize", get(begin_login))
        .route("/api/auth/{provider}", post(exchange_code))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
}

#[derive(Deserialize)]
struct CodeRequest {
    #[serde(default)]
    code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// Sends the browser to the provider's authorization page.
async fn begin_login(
    Path(provider): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let provider = state.providers.get(&provider)?;
    let url = provider.authorization_url().map_err(|e| {
        error!("Cannot build authorization URL for '{}': {}", provider.get_name(), e);
        AppError::Backend(e)
    })?;
    info!("Redirecting to '{}' for login", provider.get_name());
    Ok(Redirect::to(url.as_str()))
}

/// Exchanges the authorization code from the provider callback for a session.
async fn exchange_code(
    Path(provider): Path<String>,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CodeRequest>,
) -> Result<Json<ExchangeOutcome>, AppError> {
    state
        .auth
        .exchange_code(&provider, &request.code)
        .await
        .map(Json)
}

async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<Json<ExchangeOutcome>, AppError> {
    state
        .auth
        .register(&request.email, &request.password, &request.confirm_password)
        .await
        .map(Json)
}

async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<ExchangeOutcome>, AppError> {
    state
        .auth
        .login(&request.email, &request.password)
        .await
        .map(Json)
}
