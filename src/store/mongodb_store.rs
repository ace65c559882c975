use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, IndexModel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{NativeAccount, Store, UpsertOutcome};
use crate::models::message::{EnvelopeType, Message, MessageOrder, NewMessage};
use crate::models::user::UserIdentity;

/// The config struct for MongoDB connections.
/// Contains the URI and database name.
#[derive(Deserialize, Serialize, JsonSchema, Debug)]
pub struct MongoDBConfig {
    pub uri: String,
    pub database: String,
}

/// A concrete `Store` implementation that uses MongoDB.
///
/// - `user_collection`: one document per identity, keyed by uid
/// - `account_collection`: email/password logins
/// - `message_collection`: append-only messages
pub struct MongoDBStore {
    user_collection: Collection<UserDocument>,
    account_collection: Collection<AccountDocument>,
    message_collection: Collection<MessageDocument>,
}

/// Document shape for storing identities in MongoDB.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct UserDocument {
    uid: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    created_at_ms: i64,
}

/// Document shape for email/password logins.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct AccountDocument {
    email: String,
    uid: String,
    password_hash: String,
}

/// Document shape for messages. Timestamps are epoch millis so ordering is numeric.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct MessageDocument {
    _id: ObjectId,
    tree_owner_id: String,
    sender: String,
    content: String,
    envelope_type: i32,
    is_read: bool,
    created_at_ms: i64,
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    e.to_string().contains("E11000")
}

impl MongoDBStore {
    /// Creates a new `MongoDBStore` from the given config.
    /// It initializes client connections, sets up indexes, etc.
    pub async fn new(config: &MongoDBConfig) -> Result<Self, String> {
        info!("Connecting to MongoDB database '{}'", config.database);

        // Parse the connection string from the config
        let mut client_options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| format!("Failed to parse MongoDB URI: {}", e))?;

        client_options.app_name = Some("wishtree".to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| format!("Failed to create MongoDB client: {}", e))?;

        info!("MongoDB connection established successfully.");

        let database = client.database(&config.database);
        let user_collection = database.collection::<UserDocument>("users");
        let account_collection = database.collection::<AccountDocument>("accounts");
        let message_collection = database.collection::<MessageDocument>("messages");

        // 1) Unique index on uid, so concurrent logins upsert the same document
        let mut unique_on_uid = IndexModel::default();
        unique_on_uid.keys = doc! { "uid": 1 };
        unique_on_uid.options = Some(IndexOptions::builder().unique(true).build());
        user_collection
            .create_index(unique_on_uid, None)
            .await
            .map_err(|e| format!("Failed to create unique index on uid: {}", e))?;

        // 2) Unique index on account email
        let mut unique_on_email = IndexModel::default();
        unique_on_email.keys = doc! { "email": 1 };
        unique_on_email.options = Some(IndexOptions::builder().unique(true).build());
        account_collection
            .create_index(unique_on_email, None)
            .await
            .map_err(|e| format!("Failed to create unique index on email: {}", e))?;

        // 3) Mailbox query index: equality on owner, ordered by time
        let mut owner_by_time = IndexModel::default();
        owner_by_time.keys = doc! { "tree_owner_id": 1, "created_at_ms": 1 };
        message_collection
            .create_index(owner_by_time, None)
            .await
            .map_err(|e| format!("Failed to create mailbox index: {}", e))?;

        Ok(Self {
            user_collection,
            account_collection,
            message_collection,
        })
    }

    fn doc_to_user(doc: &UserDocument) -> UserIdentity {
        UserIdentity {
            uid: doc.uid.clone(),
            email: doc.email.clone(),
            display_name: doc.display_name.clone(),
            photo_url: doc.photo_url.clone(),
        }
    }

    /// Builds the upsert update: insert-only fields go to `$setOnInsert`,
    /// refreshable fields that are present go to `$set`.
    fn user_upsert_update(user: &UserIdentity, now_ms: i64) -> Document {
        let mut on_insert = doc! {
            "uid": &user.uid,
            "email": user.email.clone(),
            "created_at_ms": now_ms,
        };
        let mut set = Document::new();
        match &user.display_name {
            Some(name) => {
                set.insert("display_name", name);
            }
            None => {
                on_insert.insert("display_name", mongodb::bson::Bson::Null);
            }
        }
        match &user.photo_url {
            Some(photo) => {
                set.insert("photo_url", photo);
            }
            None => {
                on_insert.insert("photo_url", mongodb::bson::Bson::Null);
            }
        }

        let mut update = doc! { "$setOnInsert": on_insert };
        if !set.is_empty() {
            update.insert("$set", set);
        }
        update
    }

    fn message_to_doc(message: &NewMessage, now_ms: i64) -> MessageDocument {
        MessageDocument {
            _id: ObjectId::new(),
            tree_owner_id: message.tree_owner_id.clone(),
            sender: message.sender.clone(),
            content: message.content.clone(),
            envelope_type: i32::from(message.envelope_type.get()),
            is_read: false,
            created_at_ms: now_ms,
        }
    }

    fn doc_to_message(doc: &MessageDocument) -> Result<Message, String> {
        let envelope_type = u8::try_from(doc.envelope_type)
            .ok()
            .and_then(|v| EnvelopeType::try_from(v).ok())
            .unwrap_or_else(|| {
                warn!(
                    "Message {} has out-of-range envelope {}, using default",
                    doc._id, doc.envelope_type
                );
                EnvelopeType::default()
            });
        let created_at = Utc
            .timestamp_millis_opt(doc.created_at_ms)
            .single()
            .ok_or_else(|| format!("Message {} has invalid timestamp", doc._id))?;

        Ok(Message {
            id: doc._id.to_hex(),
            tree_owner_id: doc.tree_owner_id.clone(),
            sender: doc.sender.clone(),
            content: doc.content.clone(),
            envelope_type,
            is_read: doc.is_read,
            created_at,
        })
    }
}

#[async_trait]
impl Store for MongoDBStore {
    /// Upserts by uid. A concurrent insert of the same uid surfaces as a
    /// duplicate key error; the retry then matches the existing document.
    async fn upsert_user(&self, user: &UserIdentity) -> Result<UpsertOutcome, String> {
        let update = Self::user_upsert_update(user, Utc::now().timestamp_millis());
        let options = UpdateOptions::builder().upsert(true).build();

        let result = match self
            .user_collection
            .update_one(doc! { "uid": &user.uid }, update.clone(), options.clone())
            .await
        {
            Err(e) if is_duplicate_key(&e) => {
                debug!("Concurrent upsert for '{}', retrying as update", user.uid);
                self.user_collection
                    .update_one(doc! { "uid": &user.uid }, update, options)
                    .await
            }
            other => other,
        }
        .map_err(|e| format!("Failed to upsert user: {}", e))?;

        Ok(if result.upserted_id.is_some() {
            UpsertOutcome::Created
        } else if result.modified_count > 0 {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Unchanged
        })
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserIdentity>, String> {
        let user_doc = self
            .user_collection
            .find_one(doc! { "uid": uid }, None)
            .await
            .map_err(|e| format!("Failed to query user: {}", e))?;
        Ok(user_doc.as_ref().map(Self::doc_to_user))
    }

    async fn create_native_account(&self, account: &NativeAccount) -> Result<bool, String> {
        let account_doc = AccountDocument {
            email: account.email.to_lowercase(),
            uid: account.uid.clone(),
            password_hash: account.password_hash.clone(),
        };
        match self.account_collection.insert_one(account_doc, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(format!("Failed to insert account: {}", e)),
        }
    }

    async fn get_native_account(&self, email: &str) -> Result<Option<NativeAccount>, String> {
        let account_doc = self
            .account_collection
            .find_one(doc! { "email": email.to_lowercase() }, None)
            .await
            .map_err(|e| format!("Failed to query account: {}", e))?;
        Ok(account_doc.map(|d| NativeAccount {
            uid: d.uid,
            email: d.email,
            password_hash: d.password_hash,
        }))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, String> {
        let message_doc = Self::message_to_doc(message, Utc::now().timestamp_millis());
        self.message_collection
            .insert_one(message_doc.clone(), None)
            .await
            .map_err(|e| format!("Failed to insert message: {}", e))?;
        Self::doc_to_message(&message_doc)
    }

    async fn list_messages(
        &self,
        tree_owner_id: &str,
        order: MessageOrder,
    ) -> Result<Vec<Message>, String> {
        let direction = match order {
            MessageOrder::Asc => 1,
            MessageOrder::Desc => -1,
        };
        let options = FindOptions::builder()
            .sort(doc! { "created_at_ms": direction, "_id": direction })
            .build();

        let mut cursor = self
            .message_collection
            .find(doc! { "tree_owner_id": tree_owner_id }, options)
            .await
            .map_err(|e| format!("Failed to list messages: {}", e))?;

        let mut messages = Vec::new();
        while let Some(message_doc) = cursor
            .try_next()
            .await
            .map_err(|e| format!("Failed to read message document: {}", e))?
        {
            messages.push(Self::doc_to_message(&message_doc)?);
        }
        Ok(messages)
    }

    async fn count_messages(&self, tree_owner_id: &str) -> Result<u64, String> {
        self.message_collection
            .count_documents(doc! { "tree_owner_id": tree_owner_id }, None)
            .await
            .map_err(|e| format!("Failed to count messages: {}", e))
    }
}
