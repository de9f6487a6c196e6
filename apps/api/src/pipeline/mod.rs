pub mod handlers;
pub mod jobs;
pub mod processor;

pub use jobs::{BatchJob, BatchRegistry};
pub use processor::{BatchOutcome, BatchProcessor, BatchSettings, CancelFlag};
