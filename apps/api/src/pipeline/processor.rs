use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::ingest::parser::{normalize_identifier, ValidationError};
use crate::models::message::{Message, MessageType, Purpose};
use crate::models::profile::Profile;
use crate::outreach::{GenerationError, MessageGenerator, ProfileResolver, ResolutionError};
use crate::store::{MessageStore, StoreError};

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Could not resolve profile '{identifier}': {source}")]
    Resolution {
        identifier: String,
        source: ResolutionError,
    },

    #[error("Could not generate a message for '{identifier}': {source}")]
    Generation {
        identifier: String,
        source: GenerationError,
    },

    /// The message text was generated but could not be saved. `body` carries it
    /// so the caller can retry the save without another generation call.
    #[error("Could not save the message for '{identifier}': {source}")]
    Persistence {
        identifier: String,
        body: String,
        source: StoreError,
    },

    #[error("All {} items in the batch failed", failures.len())]
    BatchExhausted { failures: Vec<ItemFailure> },
}

/// One item that failed inside a batch. `index` is 0-based input position.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemFailure {
    pub index: usize,
    pub identifier: String,
    pub error: String,
    /// Set when generation succeeded but saving did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_body: Option<String>,
}

impl ItemFailure {
    fn new(index: usize, identifier: &str, err: &ProcessingError) -> Self {
        let generated_body = match err {
            ProcessingError::Persistence { body, .. } => Some(body.clone()),
            _ => None,
        };
        ItemFailure {
            index,
            identifier: identifier.to_string(),
            error: err.to_string(),
            generated_body,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Successful messages in input order.
    pub messages: Vec<Message>,
    pub failures: Vec<ItemFailure>,
    pub attempted: usize,
    pub total: usize,
    pub cancelled: bool,
}

impl BatchOutcome {
    fn empty(total: usize) -> Self {
        BatchOutcome {
            messages: Vec::new(),
            failures: Vec::new(),
            attempted: 0,
            total,
            cancelled: false,
        }
    }

    fn cancel_at(&mut self, index: usize) {
        info!("Batch cancelled after {index} of {} items", self.total);
        self.cancelled = true;
    }
}

/// Receives batch progress. `started` fires before each item with a 1-based
/// position; nothing fires after cancellation.
pub trait ProgressSink {
    fn started(&mut self, current: usize, total: usize);

    fn succeeded(&mut self, _index: usize, _message: &Message) {}

    fn failed(&mut self, _failure: &ItemFailure) {}
}

impl<F: FnMut(usize, usize)> ProgressSink for F {
    fn started(&mut self, current: usize, total: usize) {
        self(current, total)
    }
}

/// Cooperative cancellation, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub message_type: MessageType,
    pub purpose: Purpose,
    pub inter_item_delay: Duration,
    /// Extra save attempts after a failed save, reusing the generated text.
    pub persist_retries: u32,
}

impl BatchSettings {
    pub fn from_config(config: &Config) -> Self {
        BatchSettings {
            message_type: config.default_message_type,
            purpose: config.default_purpose,
            inter_item_delay: Duration::from_millis(config.batch_delay_ms),
            persist_retries: config.persist_retries,
        }
    }
}

/// Runs identifiers through resolve, generate and save.
#[derive(Clone)]
pub struct BatchProcessor {
    resolver: Arc<dyn ProfileResolver>,
    generator: Arc<dyn MessageGenerator>,
    store: Arc<dyn MessageStore>,
    settings: BatchSettings,
}

impl BatchProcessor {
    pub fn new(
        resolver: Arc<dyn ProfileResolver>,
        generator: Arc<dyn MessageGenerator>,
        store: Arc<dyn MessageStore>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            resolver,
            generator,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Same collaborators, different message type and purpose.
    pub fn configured(&self, message_type: Option<MessageType>, purpose: Option<Purpose>) -> Self {
        let mut processor = self.clone();
        if let Some(message_type) = message_type {
            processor.settings.message_type = message_type;
        }
        if let Some(purpose) = purpose {
            processor.settings.purpose = purpose;
        }
        processor
    }

    /// Processes one identifier end to end. `name_override` replaces the
    /// resolved display name before generation.
    pub async fn process_single(
        &self,
        identifier: &str,
        name_override: Option<&str>,
    ) -> Result<Message, ProcessingError> {
        let message = self.run_item(identifier, name_override).await?;
        info!(
            "Generated {} {} message {} for '{}'",
            message.purpose, message.message_type, message.id, identifier
        );
        Ok(message)
    }

    /// Processes identifiers one at a time. A failing item is recorded and the
    /// batch moves on.
    pub async fn process_batch<P>(
        &self,
        identifiers: &[String],
        progress: &mut P,
        cancel: &CancelFlag,
    ) -> Result<BatchOutcome, ProcessingError>
    where
        P: ProgressSink + ?Sized,
    {
        let total = identifiers.len();
        let mut outcome = BatchOutcome::empty(total);
        if total == 0 {
            info!("Batch is empty, nothing to do");
            return Ok(outcome);
        }

        info!(
            "Starting batch of {total} ({} {})",
            self.settings.purpose, self.settings.message_type
        );

        for (index, identifier) in identifiers.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancel_at(index);
                break;
            }
            if index > 0 && !self.settings.inter_item_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_item_delay).await;
                if cancel.is_cancelled() {
                    outcome.cancel_at(index);
                    break;
                }
            }

            progress.started(index + 1, total);
            outcome.attempted += 1;

            match self.run_item(identifier, None).await {
                Ok(message) => {
                    progress.succeeded(index, &message);
                    outcome.messages.push(message);
                }
                Err(err) => {
                    warn!("Batch item {} ('{identifier}') failed: {err}", index + 1);
                    let failure = ItemFailure::new(index, identifier, &err);
                    progress.failed(&failure);
                    outcome.failures.push(failure);
                }
            }
        }

        if outcome.messages.is_empty() && !outcome.cancelled {
            return Err(ProcessingError::BatchExhausted {
                failures: outcome.failures,
            });
        }

        info!(
            "Batch finished: {} of {} attempted succeeded",
            outcome.messages.len(),
            outcome.attempted
        );
        Ok(outcome)
    }

    async fn run_item(
        &self,
        identifier: &str,
        name_override: Option<&str>,
    ) -> Result<Message, ProcessingError> {
        let handle = normalize_identifier(identifier)?;

        let mut profile =
            self.resolver
                .resolve(&handle)
                .await
                .map_err(|source| ProcessingError::Resolution {
                    identifier: handle.clone(),
                    source,
                })?;
        if let Some(name) = name_override.map(str::trim).filter(|n| !n.is_empty()) {
            profile.name = name.to_string();
        }

        let body = self
            .generator
            .generate(&profile, self.settings.message_type, self.settings.purpose)
            .await
            .and_then(|body| {
                let body = body.trim();
                if body.is_empty() {
                    Err(GenerationError::EmptyBody)
                } else {
                    Ok(body.to_string())
                }
            })
            .map_err(|source| ProcessingError::Generation {
                identifier: handle.clone(),
                source,
            })?;

        self.persist(&handle, &profile, body).await
    }

    async fn persist(
        &self,
        identifier: &str,
        profile: &Profile,
        body: String,
    ) -> Result<Message, ProcessingError> {
        let mut retries = 0;
        loop {
            match self.save(profile, &body).await {
                Ok(message) => return Ok(message),
                Err(err) if retries < self.settings.persist_retries => {
                    retries += 1;
                    warn!("Saving message for '{identifier}' failed ({err}), retry {retries}");
                }
                Err(source) => {
                    return Err(ProcessingError::Persistence {
                        identifier: identifier.to_string(),
                        body,
                        source,
                    })
                }
            }
        }
    }

    async fn save(&self, profile: &Profile, body: &str) -> Result<Message, StoreError> {
        let record = self.store.upsert_profile(profile).await?;
        self.store
            .create_message(
                record.id,
                body,
                self.settings.message_type,
                self.settings.purpose,
            )
            .await
    }
}
