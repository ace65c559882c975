use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stored as the sender of every anonymous message.
pub const ANONYMOUS_SENDER: &str = "익명";
pub const MAX_SENDER_CHARS: usize = 20;
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Visual skin of a message. Purely cosmetic, limited to 1..=6.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct EnvelopeType(u8);

impl EnvelopeType {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for EnvelopeType {
    fn default() -> Self {
        EnvelopeType(Self::MIN)
    }
}

impl TryFrom<u8> for EnvelopeType {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(EnvelopeType(value))
        } else {
            Err(ValidationError::InvalidEnvelope(i64::from(value)))
        }
    }
}

impl From<EnvelopeType> for u8 {
    fn from(value: EnvelopeType) -> Self {
        value.0
    }
}

/// A message left on someone's tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub tree_owner_id: String,
    pub sender: String,
    pub content: String,
    pub envelope_type: EnvelopeType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Unvalidated visitor input, as posted to a tree.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub content: String,
    /// Wider than the stored type so out-of-range input still reaches validation.
    #[serde(default = "default_envelope")]
    pub envelope_type: i64,
    #[serde(default)]
    pub is_anonymous: bool,
}

fn default_envelope() -> i64 {
    i64::from(EnvelopeType::MIN)
}

/// A draft that passed validation and is ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub tree_owner_id: String,
    pub sender: String,
    pub content: String,
    pub envelope_type: EnvelopeType,
}

impl MessageDraft {
    /// Checks the draft without touching the network.
    ///
    /// Sender and content are trimmed first; lengths are counted in characters.
    /// Anonymous drafts ignore whatever sender was typed.
    pub fn validate(&self, tree_owner_id: &str) -> Result<NewMessage, ValidationError> {
        let tree_owner_id = tree_owner_id.trim();
        if tree_owner_id.is_empty() {
            return Err(ValidationError::EmptyOwner);
        }

        let sender = if self.is_anonymous {
            ANONYMOUS_SENDER.to_string()
        } else {
            let sender = self.sender.trim();
            if sender.is_empty() {
                return Err(ValidationError::EmptySender);
            }
            if sender.chars().count() > MAX_SENDER_CHARS {
                return Err(ValidationError::SenderTooLong {
                    max: MAX_SENDER_CHARS,
                });
            }
            sender.to_string()
        };

        let content = self.content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(ValidationError::ContentTooLong {
                max: MAX_CONTENT_CHARS,
            });
        }

        let envelope_type = u8::try_from(self.envelope_type)
            .ok()
            .and_then(|value| EnvelopeType::try_from(value).ok())
            .ok_or(ValidationError::InvalidEnvelope(self.envelope_type))?;

        Ok(NewMessage {
            tree_owner_id: tree_owner_id.to_string(),
            sender,
            content: content.to_string(),
            envelope_type,
        })
    }
}

/// Listing order of a mailbox, by `createdAt` with ties broken on id.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrder {
    #[default]
    Asc,
    Desc,
}

impl MessageOrder {
    pub fn sort(self, messages: &mut [Message]) {
        messages.sort_by(|a, b| {
            let ord = a
                .created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id));
            match self {
                MessageOrder::Asc => ord,
                MessageOrder::Desc => ord.reverse(),
            }
        });
    }
}
