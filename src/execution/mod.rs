// Order execution module
pub mod paper;

pub use paper::PaperSink;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ExecutionError;
use crate::models::{ExecutionReceipt, TradeSignal};

/// Destination for trade signals
///
/// Called once per emitted signal and awaited before the next observation
/// is read. Implementations may be shared across symbol runners.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    /// Execute or record `signal`
    async fn execute(&self, signal: &TradeSignal) -> Result<ExecutionReceipt, ExecutionError>;
}

#[async_trait]
impl<T: ExecutionSink + ?Sized> ExecutionSink for Arc<T> {
    async fn execute(&self, signal: &TradeSignal) -> Result<ExecutionReceipt, ExecutionError> {
        (**self).execute(signal).await
    }
}

#[async_trait]
impl<T: ExecutionSink + ?Sized> ExecutionSink for Box<T> {
    async fn execute(&self, signal: &TradeSignal) -> Result<ExecutionReceipt, ExecutionError> {
        (**self).execute(signal).await
    }
}
