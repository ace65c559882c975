use std::sync::Arc;

use futures::Stream;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::message::{Message, MessageOrder};
use crate::store::Store;

/// A live view of one owner's messages.
///
/// Every item is the full ordered set, never a delta. The first call yields
/// the current set; later calls wait for a change to this owner's mailbox.
/// Dropping the subscription detaches it.
pub struct MessageSubscription {
    store: Arc<dyn Store>,
    owner: String,
    order: MessageOrder,
    changes: broadcast::Receiver<String>,
    primed: bool,
}

impl MessageSubscription {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        owner: String,
        order: MessageOrder,
        changes: broadcast::Receiver<String>,
    ) -> Self {
        MessageSubscription {
            store,
            owner,
            order,
            changes,
            primed: false,
        }
    }

    async fn snapshot(&self) -> Result<Vec<Message>, AppError> {
        self.store
            .list_messages(&self.owner, self.order)
            .await
            .map_err(|e| {
                warn!("Snapshot of '{}' failed: {}", self.owner, e);
                AppError::Store(e)
            })
    }

    /// Next full snapshot, or `None` once the mailbox is shut down.
    pub async fn next(&mut self) -> Option<Result<Vec<Message>, AppError>> {
        if !self.primed {
            self.primed = true;
            return Some(self.snapshot().await);
        }

        loop {
            match self.changes.recv().await {
                Ok(owner) if owner == self.owner => return Some(self.snapshot().await),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(
                        "Subscription for '{}' lagged by {} changes, replaying",
                        self.owner, skipped
                    );
                    return Some(self.snapshot().await);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Message>, AppError>> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|item| (item, subscription))
        })
    }
}
