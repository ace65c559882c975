//! Public tree endpoints. Anyone who knows an owner id may read the tree
//! summary and leave a message.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::AppError;
use crate::mailbox::TreeInfo;
use crate::models::message::MessageDraft;
use crate::state::AppState;
use crate::utils::http_helpers::JsonBody;

/// Registers tree routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/trees/{id}", get(get_tree))
        .route("/api/trees/{id}/messages", post(submit_message))
}

#[derive(Serialize)]
struct SubmitResponse {
    id: String,
}

async fn get_tree(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TreeInfo>, AppError> {
    state.mailbox.tree_owner(&id).await.map(Json)
}

async fn submit_message(
    Path(id): Path<String>,
    State(state): State<AppState>,
    JsonBody(draft): JsonBody<MessageDraft>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let message = state.mailbox.submit_message(&id, &draft).await?;
    Ok((StatusCode::CREATED, Json(SubmitResponse { id: message.id })))
}
