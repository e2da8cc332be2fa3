use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ObservationError;

/// Fixed order size used by both strategies unless configured otherwise
pub const DEFAULT_ORDER_QTY: f64 = 0.001;

/// One closed OHLCV interval for a symbol
///
/// Produced by a feed and never mutated afterwards. Only `close` feeds the
/// indicators; the rest is carried through for validation and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub symbol: String,
    /// Close time of the interval
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceObservation {
    /// Check that every numeric field is finite and non-negative
    pub fn validate(&self) -> Result<(), ObservationError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];

        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ObservationError::NonFinite { field, value });
            }
            if value < 0.0 {
                return Err(ObservationError::Negative { field, value });
            }
        }

        Ok(())
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position held by a single stream
///
/// At most one position is open at a time. BUY is only legal while `Flat`,
/// SELL only while `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PositionState {
    #[default]
    Flat,
    Open { entry_price: f64 },
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn entry_price(&self) -> Option<f64> {
        match self {
            PositionState::Flat => None,
            PositionState::Open { entry_price } => Some(*entry_price),
        }
    }

    /// Whether a signal on `side` is legal from this state
    pub fn permits(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (PositionState::Flat, Side::Buy) | (PositionState::Open { .. }, Side::Sell)
        )
    }

    /// State after `signal` has been executed successfully
    pub fn after(&self, signal: &TradeSignal) -> PositionState {
        match signal.side {
            Side::Buy => PositionState::Open {
                entry_price: signal.price,
            },
            Side::Sell => PositionState::Flat,
        }
    }
}

/// Intent to trade emitted by a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub side: Side,
    /// Close price of the observation that triggered the signal
    pub price: f64,
    pub qty: f64,
    /// Close time of the triggering observation, when known
    pub timestamp: Option<DateTime<Utc>>,
}

impl TradeSignal {
    pub fn buy(symbol: impl Into<String>, price: f64, qty: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Buy,
            price,
            qty,
            timestamp: None,
        }
    }

    pub fn sell(symbol: impl Into<String>, price: f64, qty: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Sell,
            price,
            qty,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Confirmation returned by an execution sink
///
/// The runner only logs the id; the remaining fields belong to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub qty: f64,
    pub fee: f64,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionReceipt {
    /// Receipt for an immediate fill of `signal` at its own price
    pub fn filled(signal: &TradeSignal, fee: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: signal.symbol.clone(),
            side: signal.side,
            price: signal.price,
            qty: signal.qty,
            fee,
            executed_at: Utc::now(),
        }
    }
}
