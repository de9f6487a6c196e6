pub mod handlers;
pub mod service;
pub mod state_machine;

pub use service::ReviewService;
