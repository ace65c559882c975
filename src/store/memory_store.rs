use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::base::{merge_profile, NativeAccount, Store, UpsertOutcome};
use crate::models::message::{Message, MessageOrder, NewMessage};
use crate::models::user::UserIdentity;

#[derive(Default)]
struct Collections {
    users: HashMap<String, UserIdentity>,
    /// Keyed by lowercased email.
    accounts: HashMap<String, NativeAccount>,
    messages: Vec<Message>,
}

/// A `Store` backed by process-local maps. Used for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_user(&self, user: &UserIdentity) -> Result<UpsertOutcome, String> {
        let mut inner = self.inner.write().await;
        match inner.users.entry(user.uid.clone()) {
            Entry::Vacant(slot) => {
                debug!("Creating user '{}'", user.uid);
                slot.insert(user.clone());
                Ok(UpsertOutcome::Created)
            }
            Entry::Occupied(mut slot) => {
                let merged = merge_profile(slot.get(), user);
                if &merged == slot.get() {
                    Ok(UpsertOutcome::Unchanged)
                } else {
                    slot.insert(merged);
                    Ok(UpsertOutcome::Updated)
                }
            }
        }
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserIdentity>, String> {
        Ok(self.inner.read().await.users.get(uid).cloned())
    }

    async fn create_native_account(&self, account: &NativeAccount) -> Result<bool, String> {
        let mut inner = self.inner.write().await;
        match inner.accounts.entry(account.email.to_lowercase()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                Ok(true)
            }
        }
    }

    async fn get_native_account(&self, email: &str) -> Result<Option<NativeAccount>, String> {
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .get(&email.to_lowercase())
            .cloned())
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, String> {
        let stored = Message {
            id: uuid::Uuid::new_v4().simple().to_string(),
            tree_owner_id: message.tree_owner_id.clone(),
            sender: message.sender.clone(),
            content: message.content.clone(),
            envelope_type: message.envelope_type,
            is_read: false,
            created_at: Utc::now(),
        };
        self.inner.write().await.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_messages(
        &self,
        tree_owner_id: &str,
        order: MessageOrder,
    ) -> Result<Vec<Message>, String> {
        let mut messages: Vec<Message> = self
            .inner
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.tree_owner_id == tree_owner_id)
            .cloned()
            .collect();
        order.sort(&mut messages);
        Ok(messages)
    }

    async fn count_messages(&self, tree_owner_id: &str) -> Result<u64, String> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.tree_owner_id == tree_owner_id)
            .count() as u64)
    }
}
