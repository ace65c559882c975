//! The signed-in owner's own mailbox.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{routing::get, Json, Router};
use chrono::Utc;
use futures::{Stream, StreamExt};
use tracing::{info, warn};

use crate::error::AppError;
use crate::mailbox::{can_reveal, Dashboard, MessageView};
use crate::models::user::UserIdentity;
use crate::state::AppState;

/// Registers dashboard routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/my-tree", get(dashboard))
        .route("/api/my-tree/messages/stream", get(message_stream))
}

async fn dashboard(
    user: UserIdentity,
    State(state): State<AppState>,
) -> Result<Json<Dashboard>, AppError> {
    state.mailbox.dashboard(&user, Utc::now()).await.map(Json)
}

/// Server-sent events carrying the full gated message list on connect and
/// after every change. The subscription ends when the client disconnects.
async fn message_stream(
    user: UserIdentity,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Live message feed opened for '{}'", user.uid);
    let unlock_at = state.mailbox.unlock_at();

    let stream = state
        .mailbox
        .subscribe_messages(&user.uid)
        .into_stream()
        .map(move |snapshot| {
            let event = match snapshot {
                Ok(messages) => {
                    let unlocked = can_reveal(Utc::now(), unlock_at);
                    let views: Vec<MessageView> = messages
                        .into_iter()
                        .map(|m| MessageView::gated(m, unlocked))
                        .collect();
                    Event::default()
                        .event("messages")
                        .json_data(views)
                        .unwrap_or_else(|e| {
                            warn!("Could not encode message snapshot: {}", e);
                            Event::default().event("error").data("Internal server error")
                        })
                }
                Err(e) => Event::default().event("error").data(e.public_message()),
            };
            Ok(event)
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
