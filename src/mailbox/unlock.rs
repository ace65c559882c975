use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::message::{EnvelopeType, Message};

/// Whether message content may be shown. The unlock instant itself counts as unlocked.
pub fn can_reveal(now: DateTime<Utc>, unlock_at: DateTime<Utc>) -> bool {
    now >= unlock_at
}

/// A message as its recipient sees it on the dashboard.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub sender: String,
    /// `None` while the mailbox is locked.
    pub content: Option<String>,
    pub envelope_type: EnvelopeType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub locked: bool,
}

impl MessageView {
    pub fn gated(message: Message, unlocked: bool) -> Self {
        MessageView {
            id: message.id,
            sender: message.sender,
            content: unlocked.then_some(message.content),
            envelope_type: message.envelope_type,
            is_read: message.is_read,
            created_at: message.created_at,
            locked: !unlocked,
        }
    }
}
