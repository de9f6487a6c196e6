use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::message::{Message, MessageStats, MessageStatus};
use crate::review::state_machine::ReviewAction;
use crate::store::{MessageStore, StoreError};

const EVENT_CAPACITY: usize = 64;

/// Published after every successful review transition.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewEvent {
    pub message_id: Uuid,
    pub status: MessageStatus,
    pub reviewed_by: Option<String>,
    /// Counts after the transition. `None` when the refresh query failed.
    pub stats: Option<MessageStats>,
    pub at: DateTime<Utc>,
}

/// Applies review actions through the store and announces them.
#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn MessageStore>,
    events: broadcast::Sender<ReviewEvent>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
        self.events.subscribe()
    }

    pub async fn approve(&self, id: Uuid, reviewer: Option<&str>) -> Result<Message, StoreError> {
        self.review(id, ReviewAction::Approve, reviewer).await
    }

    pub async fn reject(&self, id: Uuid, reviewer: Option<&str>) -> Result<Message, StoreError> {
        self.review(id, ReviewAction::Reject, reviewer).await
    }

    async fn review(
        &self,
        id: Uuid,
        action: ReviewAction,
        reviewer: Option<&str>,
    ) -> Result<Message, StoreError> {
        let message = self.store.set_status(id, action, reviewer).await?;
        info!("Message {id} {}", message.status);

        // The transition is already committed; a failed refresh only degrades the event.
        let stats = match self.store.stats().await {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!("Stats refresh after reviewing {id} failed: {err}");
                None
            }
        };

        let event = ReviewEvent {
            message_id: message.id,
            status: message.status,
            reviewed_by: message.reviewed_by.clone(),
            stats,
            at: Utc::now(),
        };
        if self.events.send(event).is_err() {
            debug!("No review event subscribers");
        }

        Ok(message)
    }
}
