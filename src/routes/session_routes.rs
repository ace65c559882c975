//! Session bootstrap endpoints.

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::SessionContext;
use crate::error::AppError;
use crate::models::session::SessionCredential;
use crate::models::user::UserIdentity;
use crate::state::AppState;
use crate::utils::http_helpers::JsonBody;

/// Registers session routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/session", post(complete_login).get(current_user))
}

#[derive(Deserialize)]
struct SessionRequest {
    token: SessionCredential,
}

#[derive(Serialize)]
struct SessionResponse {
    user: UserIdentity,
}

/// Trades a freshly minted credential for the identity it is bound to.
async fn complete_login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let context = SessionContext::new(state.sessions.clone(), state.store.clone());
    let user = context.complete_login(request.token).await?;
    Ok(Json(SessionResponse { user }))
}

async fn current_user(user: UserIdentity) -> Json<SessionResponse> {
    Json(SessionResponse { user })
}
