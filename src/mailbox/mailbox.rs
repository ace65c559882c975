use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use super::subscription::MessageSubscription;
use super::unlock::{can_reveal, MessageView};
use crate::config::MailboxConfig;
use crate::error::{AppError, ValidationError};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::message::{Message, MessageDraft, MessageOrder};
use crate::models::user::UserIdentity;
use crate::store::Store;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// What a visitor sees before writing on a tree.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TreeInfo {
    pub owner_id: String,
    pub owner_name: Option<String>,
    pub message_count: u64,
}

/// The recipient's own view of their mailbox.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub unlock_at: DateTime<Utc>,
    pub unlocked: bool,
    pub share_path: String,
    pub messages: Vec<MessageView>,
}

/// Path of the public page where visitors write to `uid`.
pub fn share_path(uid: &str) -> Result<String, AppError> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| AppError::Backend(format!("Invalid base URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Backend("Base URL cannot hold a path".to_string()))?
        .clear()
        .push("tree")
        .push(uid);
    Ok(url.path().to_string())
}

/// Append-only message store front, with live change notification.
pub struct Mailbox {
    store: Arc<dyn Store>,
    metrics: Metrics,
    order: MessageOrder,
    unlock_at: DateTime<Utc>,
    changes: broadcast::Sender<String>,
}

impl Mailbox {
    pub fn new(store: Arc<dyn Store>, metrics: Metrics, config: &MailboxConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Mailbox {
            store,
            metrics,
            order: config.order,
            unlock_at: config.unlock_at,
            changes,
        }
    }

    pub fn unlock_at(&self) -> DateTime<Utc> {
        self.unlock_at
    }

    /// Validates and appends a message to `tree_owner_id`'s mailbox.
    ///
    /// No session is required and the owner does not have to exist.
    /// Invalid drafts are rejected before the store is touched.
    pub async fn submit_message(
        &self,
        tree_owner_id: &str,
        draft: &MessageDraft,
    ) -> Result<Message, AppError> {
        let new_message = draft.validate(tree_owner_id).map_err(|e| {
            debug!("Rejected message for '{}': {}", tree_owner_id, e);
            self.metrics.record_message_submission("rejected");
            e
        })?;

        let message = self.store.insert_message(&new_message).await.map_err(|e| {
            error!(
                "Failed to store message for '{}': {}",
                new_message.tree_owner_id, e
            );
            self.metrics.record_message_submission("failed");
            AppError::WriteFailure(e)
        })?;

        self.metrics.record_message_submission("success");
        info!(
            owner = %message.tree_owner_id,
            message_id = %message.id,
            "Stored message"
        );
        // No subscribers is fine.
        let _ = self.changes.send(message.tree_owner_id.clone());
        Ok(message)
    }

    /// Live query over one owner's messages, in the configured order.
    pub fn subscribe_messages(&self, tree_owner_id: &str) -> MessageSubscription {
        MessageSubscription::new(
            Arc::clone(&self.store),
            tree_owner_id.to_string(),
            self.order,
            self.changes.subscribe(),
        )
    }

    pub async fn tree_owner(&self, tree_owner_id: &str) -> Result<TreeInfo, AppError> {
        let tree_owner_id = tree_owner_id.trim();
        if tree_owner_id.is_empty() {
            return Err(ValidationError::EmptyOwner.into());
        }

        let owner = self
            .store
            .get_user(tree_owner_id)
            .await
            .map_err(AppError::Store)?;
        let message_count = self
            .store
            .count_messages(tree_owner_id)
            .await
            .map_err(AppError::Store)?;

        Ok(TreeInfo {
            owner_id: tree_owner_id.to_string(),
            owner_name: owner.and_then(|u| u.display_name),
            message_count,
        })
    }

    pub async fn dashboard(
        &self,
        user: &UserIdentity,
        now: DateTime<Utc>,
    ) -> Result<Dashboard, AppError> {
        let unlocked = can_reveal(now, self.unlock_at);
        let messages = self
            .store
            .list_messages(&user.uid, self.order)
            .await
            .map_err(AppError::Store)?;

        Ok(Dashboard {
            unlock_at: self.unlock_at,
            unlocked,
            share_path: share_path(&user.uid)?,
            messages: messages
                .into_iter()
                .map(|m| MessageView::gated(m, unlocked))
                .collect(),
        })
    }
}
