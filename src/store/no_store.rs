use async_trait::async_trait;

use super::base::{NativeAccount, Store, UpsertOutcome};
use crate::models::message::{Message, MessageOrder, NewMessage};
use crate::models::user::UserIdentity;

const DISABLED: &str = "Store is disabled";

/// A no-op store that always returns an error if called,
/// indicating the store is disabled.
pub struct NoStore;

impl NoStore {
    pub fn new() -> Self {
        NoStore
    }
}

impl Default for NoStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for NoStore {
    async fn upsert_user(&self, _user: &UserIdentity) -> Result<UpsertOutcome, String> {
        Err(DISABLED.into())
    }

    async fn get_user(&self, _uid: &str) -> Result<Option<UserIdentity>, String> {
        Err(DISABLED.into())
    }

    async fn create_native_account(&self, _account: &NativeAccount) -> Result<bool, String> {
        Err(DISABLED.into())
    }

    async fn get_native_account(&self, _email: &str) -> Result<Option<NativeAccount>, String> {
        Err(DISABLED.into())
    }

    async fn insert_message(&self, _message: &NewMessage) -> Result<Message, String> {
        Err(DISABLED.into())
    }

    async fn list_messages(
        &self,
        _tree_owner_id: &str,
        _order: MessageOrder,
    ) -> Result<Vec<Message>, String> {
        Err(DISABLED.into())
    }

    async fn count_messages(&self, _tree_owner_id: &str) -> Result<u64, String> {
        Err(DISABLED.into())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::EnvelopeType;

    #[tokio::test]
    async fn test_no_store_rejects_identity_writes() {
        let no_store = NoStore::new();
        let res = no_store.upsert_user(&UserIdentity::bare("kakao:42")).await;
        assert!(res.is_err(), "Expected upsert_user to return an error");
        assert!(no_store.get_user("kakao:42").await.is_err());
    }

    #[tokio::test]
    async fn test_no_store_rejects_accounts() {
        let no_store = NoStore::new();
        let account = NativeAccount {
            uid: "u1".to_string(),
            email: "minsu@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
        };
        assert!(no_store.create_native_account(&account).await.is_err());
        assert!(no_store.get_native_account("minsu@example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_no_store_rejects_messages() {
        let no_store = NoStore::new();
        let message = NewMessage {
            tree_owner_id: "kakao:42".to_string(),
            sender: "Jisoo".to_string(),
            content: "Happy New Year".to_string(),
            envelope_type: EnvelopeType::default(),
        };
        assert!(no_store.insert_message(&message).await.is_err());
        assert!(no_store
            .list_messages("kakao:42", MessageOrder::Asc)
            .await
            .is_err());
        assert!(no_store.count_messages("kakao:42").await.is_err());
        assert!(!no_store.is_enabled());
    }
}
