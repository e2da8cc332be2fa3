// Core modules
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod runner;
pub mod strategy;

// Re-export commonly used types
pub use error::{ConfigError, ExecutionError, FeedError, ObservationError};
pub use execution::ExecutionSink;
pub use feed::Feed;
pub use models::*;
pub use runner::{RunSummary, Shutdown, StreamRunner, TickOutcome};
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
