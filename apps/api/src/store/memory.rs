use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::message::{
    Message, MessageFilter, MessagePage, MessageStats, MessageStatus, MessageType,
    MessageWithProfile, Page, Purpose,
};
use crate::models::profile::{Profile, ProfileRecord};
use crate::review::state_machine::ReviewAction;
use crate::store::{MessageStore, ProfileWithMessages, StoreError};

/// Process-local store. Used with `STORE_BACKEND=memory` and as the test double.
///
/// Every write takes the single write lock, so a status transition is atomic.
#[derive(Default)]
pub struct InMemoryMessageStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    profiles: HashMap<Uuid, ProfileRecord>,
    by_username: HashMap<String, Uuid>,
    messages: HashMap<Uuid, StoredMessage>,
    next_seq: u64,
}

struct StoredMessage {
    /// Insertion order; breaks `created_at` ties so the feed order is total.
    seq: u64,
    message: Message,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    /// Matching messages, newest first.
    fn feed<F>(&self, mut keep: F) -> Vec<MessageWithProfile>
    where
        F: FnMut(&Message, &ProfileRecord) -> bool,
    {
        let mut rows: Vec<(&StoredMessage, &ProfileRecord)> = self
            .messages
            .values()
            .filter_map(|stored| {
                let profile = self.profiles.get(&stored.message.profile_id)?;
                keep(&stored.message, profile).then_some((stored, profile))
            })
            .collect();

        rows.sort_by(|(a, _), (b, _)| {
            b.message
                .created_at
                .cmp(&a.message.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        rows.into_iter()
            .map(|(stored, profile)| MessageWithProfile {
                message: stored.message.clone(),
                profile: profile.clone(),
            })
            .collect()
    }
}

fn paginate(all: Vec<MessageWithProfile>, page: Page) -> MessagePage {
    let total = all.len() as i64;
    let messages = all
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect();
    MessagePage {
        messages,
        total,
        limit: page.limit,
        offset: page.offset,
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn upsert_profile(&self, profile: &Profile) -> Result<ProfileRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        if let Some(id) = inner.by_username.get(&profile.username).copied() {
            if let Some(existing) = inner.profiles.get_mut(&id) {
                existing.profile.merge(profile);
                existing.updated_at = now;
                return Ok(existing.clone());
            }
        }

        let record = ProfileRecord {
            id: Uuid::new_v4(),
            profile: profile.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.by_username.insert(profile.username.clone(), record.id);
        inner.profiles.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_profile(&self, username: &str) -> Result<Option<ProfileWithMessages>, StoreError> {
        let inner = self.inner.read().await;
        let Some(profile) = inner
            .by_username
            .get(username)
            .and_then(|id| inner.profiles.get(id))
        else {
            return Ok(None);
        };

        let messages = inner
            .feed(|m, _| m.profile_id == profile.id)
            .into_iter()
            .map(|m| m.message)
            .collect();

        Ok(Some(ProfileWithMessages {
            profile: profile.clone(),
            messages,
        }))
    }

    async fn create_message(
        &self,
        profile_id: Uuid,
        body: &str,
        message_type: MessageType,
        purpose: Purpose,
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.profiles.contains_key(&profile_id) {
            return Err(StoreError::ProfileNotFound(profile_id.to_string()));
        }

        let message = Message {
            id: Uuid::new_v4(),
            profile_id,
            body: body.to_string(),
            message_type,
            purpose,
            status: MessageStatus::Pending,
            created_at: Utc::now(),
            approved_at: None,
            rejected_at: None,
            reviewed_by: None,
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.messages.insert(
            message.id,
            StoredMessage {
                seq,
                message: message.clone(),
            },
        );

        info!("Created {} {} message {} for profile {}", purpose, message_type, message.id, profile_id);
        Ok(message)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<MessageWithProfile>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.messages.get(&id).and_then(|stored| {
            inner
                .profiles
                .get(&stored.message.profile_id)
                .map(|profile| MessageWithProfile {
                    message: stored.message.clone(),
                    profile: profile.clone(),
                })
        }))
    }

    async fn set_status(
        &self,
        id: Uuid,
        action: ReviewAction,
        reviewer: Option<&str>,
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .messages
            .get_mut(&id)
            .ok_or(StoreError::MessageNotFound(id))?;

        let message = &mut stored.message;
        let next = message.status.transition(action)?;
        let now = Utc::now();
        message.status = next;
        match next {
            MessageStatus::Approved => message.approved_at = Some(now),
            MessageStatus::Rejected => message.rejected_at = Some(now),
            MessageStatus::Pending => {}
        }
        if let Some(reviewer) = reviewer {
            message.reviewed_by = Some(reviewer.to_string());
        }
        Ok(message.clone())
    }

    async fn stats(&self) -> Result<MessageStats, StoreError> {
        let inner = self.inner.read().await;
        let mut stats = MessageStats::default();
        for stored in inner.messages.values() {
            match stored.message.status {
                MessageStatus::Pending => stats.pending += 1,
                MessageStatus::Approved => stats.approved += 1,
                MessageStatus::Rejected => stats.rejected += 1,
            }
            stats.total += 1;
        }
        Ok(stats)
    }

    async fn list(&self, page: Page, filter: MessageFilter) -> Result<MessagePage, StoreError> {
        let inner = self.inner.read().await;
        Ok(paginate(inner.feed(|m, _| filter.matches(m)), page))
    }

    async fn search(&self, query: &str, page: Page) -> Result<MessagePage, StoreError> {
        let needle = query.trim().to_lowercase();
        let inner = self.inner.read().await;
        let all = inner.feed(|m, p| {
            contains_ci(Some(&p.profile.name), &needle)
                || contains_ci(p.profile.company.as_deref(), &needle)
                || contains_ci(p.profile.title.as_deref(), &needle)
                || contains_ci(Some(&m.body), &needle)
        });
        Ok(paginate(all, page))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .messages
            .remove(&id)
            .map(|_| info!("Deleted message {id}"))
            .ok_or(StoreError::MessageNotFound(id))
    }
}
