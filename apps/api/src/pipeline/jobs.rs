//! Background batches started over HTTP.
//!
//! Each job runs `process_batch` on its own task. Progress is published through a
//! `watch` channel so readers always see a consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::message::{Message, MessageType, Purpose};
use crate::pipeline::processor::{
    BatchOutcome, BatchProcessor, CancelFlag, ItemFailure, ProcessingError, ProgressSink,
};

/// Finished jobs kept for polling before the oldest are dropped.
const MAX_RETAINED_JOBS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub state: JobState,
    pub message_type: MessageType,
    pub purpose: Purpose,
    pub identifiers: Vec<String>,
    /// 1-based position of the item being processed; 0 before the first starts.
    pub current: usize,
    pub total: usize,
    pub messages: Vec<Message>,
    pub failures: Vec<ItemFailure>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    fn new(id: Uuid, identifiers: Vec<String>, processor: &BatchProcessor) -> Self {
        let settings = processor.settings();
        BatchJob {
            id,
            state: JobState::Running,
            message_type: settings.message_type,
            purpose: settings.purpose,
            total: identifiers.len(),
            identifiers,
            current: 0,
            messages: Vec::new(),
            failures: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state != JobState::Running
    }
}

struct JobHandle {
    snapshot: watch::Receiver<BatchJob>,
    cancel: CancelFlag,
}

/// Feeds processor progress into the job's watch channel.
struct JobTracker {
    tx: watch::Sender<BatchJob>,
}

impl ProgressSink for JobTracker {
    fn started(&mut self, current: usize, _total: usize) {
        self.tx.send_modify(|job| job.current = current);
    }

    fn succeeded(&mut self, _index: usize, message: &Message) {
        self.tx.send_modify(|job| job.messages.push(message.clone()));
    }

    fn failed(&mut self, failure: &ItemFailure) {
        self.tx.send_modify(|job| job.failures.push(failure.clone()));
    }
}

// Runs when the batch task unwinds without reaching `finish`.
impl Drop for JobTracker {
    fn drop(&mut self) {
        self.tx.send_if_modified(|job| {
            if job.is_finished() {
                return false;
            }
            warn!("Batch job {} stopped without finishing", job.id);
            job.state = JobState::Failed;
            job.error = Some("batch task stopped unexpectedly".to_string());
            job.finished_at = Some(Utc::now());
            true
        });
    }
}

impl JobTracker {
    fn finish(self, result: Result<BatchOutcome, ProcessingError>) {
        self.tx.send_modify(|job| {
            job.finished_at = Some(Utc::now());
            match result {
                Ok(outcome) if outcome.cancelled => job.state = JobState::Cancelled,
                Ok(_) => job.state = JobState::Completed,
                Err(err) => {
                    job.state = JobState::Failed;
                    job.error = Some(err.to_string());
                }
            }
        });
    }
}

#[derive(Clone, Default)]
pub struct BatchRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, JobHandle>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the batch and returns its id immediately.
    pub async fn start(&self, processor: BatchProcessor, identifiers: Vec<String>) -> BatchJob {
        let id = Uuid::new_v4();
        let cancel = CancelFlag::new();
        let job = BatchJob::new(id, identifiers.clone(), &processor);
        let (tx, rx) = watch::channel(job.clone());

        {
            let mut jobs = self.jobs.write().await;
            prune_finished(&mut jobs);
            jobs.insert(
                id,
                JobHandle {
                    snapshot: rx,
                    cancel: cancel.clone(),
                },
            );
        }

        info!("Batch job {id} started with {} identifiers", identifiers.len());
        tokio::spawn(async move {
            let mut tracker = JobTracker { tx };
            let result = processor
                .process_batch(&identifiers, &mut tracker, &cancel)
                .await;
            if let Err(err) = &result {
                warn!("Batch job {id} failed: {err}");
            }
            tracker.finish(result);
        });

        job
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<BatchJob> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).map(|handle| handle.snapshot.borrow().clone())
    }

    /// Requests cancellation. The job stops before its next item.
    pub async fn cancel(&self, id: Uuid) -> Option<BatchJob> {
        let jobs = self.jobs.read().await;
        let handle = jobs.get(&id)?;
        let job = handle.snapshot.borrow().clone();
        if !job.is_finished() {
            info!("Cancelling batch job {id}");
            handle.cancel.cancel();
        }
        Some(job)
    }

    #[cfg(test)]
    async fn wait_finished(&self, id: Uuid) -> Option<BatchJob> {
        let mut rx = self.jobs.read().await.get(&id)?.snapshot.clone();
        let job = rx.wait_for(BatchJob::is_finished).await.ok()?.clone();
        Some(job)
    }
}

fn prune_finished(jobs: &mut HashMap<Uuid, JobHandle>) {
    if jobs.len() < MAX_RETAINED_JOBS {
        return;
    }
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
        .iter()
        .filter_map(|(id, handle)| {
            let job = handle.snapshot.borrow();
            job.is_finished().then_some((job.started_at, *id))
        })
        .collect();
    finished.sort();

    let excess = jobs.len() + 1 - MAX_RETAINED_JOBS;
    for (_, id) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
}
