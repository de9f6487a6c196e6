use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::{BatchProcessor, BatchRegistry};
use crate::review::ReviewService;
use crate::store::MessageStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres or in-memory, per `STORE_BACKEND`.
    pub store: Arc<dyn MessageStore>,
    /// Resolver and generator are chosen at startup (LLM or canned).
    pub processor: BatchProcessor,
    pub review: ReviewService,
    pub batches: BatchRegistry,
    pub config: Config,
}
