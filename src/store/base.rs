use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::{memory_store::MemoryStore, mongodb_store::MongoDBStore, no_store::NoStore};
use crate::config::{StoreBackend, StoreConfig};
use crate::models::message::{Message, MessageOrder, NewMessage};
use crate::models::user::UserIdentity;

/// What an identity upsert did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Login data of an email/password identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAccount {
    pub uid: String,
    /// Lowercased.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
}

/// The Store trait abstracts the `users`, native account and `messages` collections.
///
/// Identity upserts follow the same rule everywhere: a new record is created
/// as given; an existing one only takes the display name and photo URL that
/// are present in the update. Email and uid never change.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_user(&self, user: &UserIdentity) -> Result<UpsertOutcome, String>;
    async fn get_user(&self, uid: &str) -> Result<Option<UserIdentity>, String>;

    /// Returns `Ok(false)` when the email is already registered.
    async fn create_native_account(&self, account: &NativeAccount) -> Result<bool, String>;
    async fn get_native_account(&self, email: &str) -> Result<Option<NativeAccount>, String>;

    /// Appends a message; the store assigns id and timestamp.
    async fn insert_message(&self, message: &NewMessage) -> Result<Message, String>;
    async fn list_messages(
        &self,
        tree_owner_id: &str,
        order: MessageOrder,
    ) -> Result<Vec<Message>, String>;
    async fn count_messages(&self, tree_owner_id: &str) -> Result<u64, String>;

    fn is_enabled(&self) -> bool {
        // Default implementation should return always True for real stores
        // No store will return false so we can write better debug messages
        true
    }
}

/// Applies the upsert rule to an existing record. The email is fixed at
/// first insert, even when that insert had none.
pub(crate) fn merge_profile(existing: &UserIdentity, update: &UserIdentity) -> UserIdentity {
    UserIdentity {
        uid: existing.uid.clone(),
        email: existing.email.clone(),
        display_name: update
            .display_name
            .clone()
            .or_else(|| existing.display_name.clone()),
        photo_url: update
            .photo_url
            .clone()
            .or_else(|| existing.photo_url.clone()),
    }
}

/// Creates a concrete store implementation based on the StoreConfig.
/// If `store.enabled = false`, returns NoStore. Otherwise, picks the specified backend.
pub async fn create_store(config: &StoreConfig) -> Arc<dyn Store> {
    if !config.enabled {
        info!("Store is disabled. Using NoStore.");
        return Arc::new(NoStore::new());
    }

    match &config.backend {
        Some(StoreBackend::MongoDB(mongo_config)) => match MongoDBStore::new(mongo_config).await {
            Ok(store) => {
                info!("Successfully created MongoDB store.");
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to create MongoDB store: {}", e);
                std::process::exit(1);
            }
        },
        Some(StoreBackend::Memory) => {
            info!("Using in-memory store; data will not survive a restart.");
            Arc::new(MemoryStore::new())
        }
        None => {
            error!("Store is enabled, but no backend config is provided!");
            std::process::exit(1);
        }
    }
}
