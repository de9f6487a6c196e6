pub mod export;
pub mod handlers;
pub mod parser;
