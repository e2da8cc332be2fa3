use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::error::ConfigError;
use crate::models::{PositionState, TradeSignal, DEFAULT_ORDER_QTY};
use crate::runner::PriceHistory;

/// Take-profit / stop-loss settings for the threshold strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Fractional gain that closes the position (0.01 = 1%)
    pub take_profit_pct: f64,
    /// Fractional loss that closes the position (0.01 = 1%)
    pub stop_loss_pct: f64,
    pub qty: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            take_profit_pct: 0.01,
            stop_loss_pct: 0.01,
            qty: DEFAULT_ORDER_QTY,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("take_profit_pct", self.take_profit_pct),
            ("stop_loss_pct", self.stop_loss_pct),
            ("qty", self.qty),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        Ok(())
    }
}

/// Enter unconditionally, exit on take-profit or stop-loss
///
/// No indicators are involved: a flat position always buys at `price`, an
/// open one sells once the move from entry reaches either threshold.
pub fn simple_strategy(
    symbol: &str,
    price: f64,
    position: PositionState,
    take_profit_pct: f64,
    stop_loss_pct: f64,
    qty: f64,
) -> Option<TradeSignal> {
    let entry_price = match position {
        PositionState::Flat => return Some(TradeSignal::buy(symbol, price, qty)),
        PositionState::Open { entry_price } => entry_price,
    };

    let change = (price - entry_price) / entry_price;

    if change >= take_profit_pct {
        tracing::debug!(symbol, price, entry_price, change, "Take-profit reached");
        return Some(TradeSignal::sell(symbol, price, qty));
    }

    if change <= -stop_loss_pct {
        tracing::debug!(symbol, price, entry_price, change, "Stop-loss reached");
        return Some(TradeSignal::sell(symbol, price, qty));
    }

    None
}

/// Threshold strategy over the latest close
#[derive(Debug, Clone)]
pub struct ThresholdStrategy {
    config: ThresholdConfig,
}

impl ThresholdStrategy {
    pub fn new(config: ThresholdConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Strategy for ThresholdStrategy {
    fn decide(&self, history: &PriceHistory, position: PositionState) -> Option<TradeSignal> {
        let price = history.last()?;
        simple_strategy(
            history.symbol(),
            price,
            position,
            self.config.take_profit_pct,
            self.config.stop_loss_pct,
            self.config.qty,
        )
    }

    fn name(&self) -> &str {
        "ThresholdStrategy"
    }

    fn lookback(&self) -> usize {
        1
    }
}
