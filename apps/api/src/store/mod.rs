//! Message store: persistence for profiles and generated messages.
//!
//! `AppState` carries an `Arc<dyn MessageStore>`; the backend (Postgres or
//! in-memory) is chosen at startup via `STORE_BACKEND`.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::message::{
    Message, MessageFilter, MessagePage, MessageStats, MessageType, MessageWithProfile,
    ParseEnumError, Page, Purpose,
};
use crate::models::profile::{Profile, ProfileRecord};
use crate::review::state_machine::{InvalidTransition, ReviewAction};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryMessageStore;
pub use postgres::PgMessageStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Message {0} not found")]
    MessageNotFound(Uuid),

    #[error("Profile {0} not found")]
    ProfileNotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(#[from] ParseEnumError),
}

/// A profile with every message generated for it, newest first.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProfileWithMessages {
    #[serde(flatten)]
    pub profile: ProfileRecord,
    pub messages: Vec<Message>,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Inserts the profile or, when the username exists, merges it into the stored
    /// one (see `Profile::merge`): missing optional fields and empty lists keep
    /// their stored values.
    async fn upsert_profile(&self, profile: &Profile) -> Result<ProfileRecord, StoreError>;

    async fn get_profile(&self, username: &str) -> Result<Option<ProfileWithMessages>, StoreError>;

    /// Creates a message in `pending` with a store-assigned creation time.
    async fn create_message(
        &self,
        profile_id: Uuid,
        body: &str,
        message_type: MessageType,
        purpose: Purpose,
    ) -> Result<Message, StoreError>;

    async fn get_message(&self, id: Uuid) -> Result<Option<MessageWithProfile>, StoreError>;

    /// Atomically moves a pending message to the action's target status and stamps
    /// the matching review time. Fails with `InvalidTransition` without writing
    /// when the message has already been reviewed.
    async fn set_status(
        &self,
        id: Uuid,
        action: ReviewAction,
        reviewer: Option<&str>,
    ) -> Result<Message, StoreError>;

    async fn stats(&self) -> Result<MessageStats, StoreError>;

    /// Messages matching `filter`, newest first (ties broken by id).
    async fn list(&self, page: Page, filter: MessageFilter) -> Result<MessagePage, StoreError>;

    /// Case-insensitive match on profile name, company, title or message body.
    async fn search(&self, query: &str, page: Page) -> Result<MessagePage, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}
