//! Paper trading sink with simulated fills

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ExecutionSink;
use crate::error::ExecutionError;
use crate::models::{ExecutionReceipt, TradeSignal};

/// Fills every signal immediately at its own price and keeps the receipts
#[derive(Clone, Default)]
pub struct PaperSink {
    fee_rate: f64,
    fills: Arc<RwLock<Vec<ExecutionReceipt>>>,
}

impl PaperSink {
    /// Create a paper sink charging `fee_rate` of notional per fill
    pub fn new(fee_rate: f64) -> Self {
        Self {
            fee_rate,
            fills: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// All fills so far, in execution order
    pub async fn fills(&self) -> Vec<ExecutionReceipt> {
        self.fills.read().await.clone()
    }

    /// Fills for one symbol, in execution order
    pub async fn fills_for(&self, symbol: &str) -> Vec<ExecutionReceipt> {
        self.fills
            .read()
            .await
            .iter()
            .filter(|fill| fill.symbol == symbol)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExecutionSink for PaperSink {
    async fn execute(&self, signal: &TradeSignal) -> Result<ExecutionReceipt, ExecutionError> {
        if !signal.price.is_finite() || signal.price <= 0.0 {
            return Err(ExecutionError::Rejected(format!(
                "invalid price {}",
                signal.price
            )));
        }

        let fee = signal.qty * signal.price * self.fee_rate;
        let receipt = ExecutionReceipt::filled(signal, fee);

        self.fills.write().await.push(receipt.clone());

        tracing::info!(
            id = %receipt.id,
            symbol = %receipt.symbol,
            side = %receipt.side,
            price = receipt.price,
            qty = receipt.qty,
            fee,
            "Paper order filled"
        );

        Ok(receipt)
    }
}
