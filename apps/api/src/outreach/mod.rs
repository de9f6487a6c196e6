// Outreach content: who the prospect is (resolver) and what we send them (generator).
// Both sit behind traits so the canned backends can replace the LLM ones without
// touching the batch pipeline or the handlers.

pub mod generator;
pub mod prompts;
pub mod resolver;

pub use generator::{CannedMessageGenerator, GenerationError, LlmMessageGenerator, MessageGenerator};
pub use resolver::{CannedProfileResolver, LlmProfileResolver, ProfileResolver, ResolutionError};
