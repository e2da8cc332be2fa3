// Trading strategy module
pub mod ema_rsi;
pub mod threshold;

pub use ema_rsi::{ema_rsi_strategy, EmaRsiConfig, EmaRsiStrategy};
pub use threshold::{simple_strategy, ThresholdConfig, ThresholdStrategy};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{PositionState, TradeSignal};
use crate::runner::PriceHistory;

/// Base trait for all trading strategies
///
/// A strategy is a pure decision: given the recent closes and the current
/// position it returns at most one signal and has no side effects.
pub trait Strategy: Send + Sync {
    /// Decide whether to trade on the latest close in `history`
    fn decide(&self, history: &PriceHistory, position: PositionState) -> Option<TradeSignal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Number of most recent closes the strategy reads
    fn lookback(&self) -> usize;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn decide(&self, history: &PriceHistory, position: PositionState) -> Option<TradeSignal> {
        (**self).decide(history, position)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn lookback(&self) -> usize {
        (**self).lookback()
    }
}

/// Strategy selected in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    EmaRsi,
    Threshold,
}

impl std::str::FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ema_rsi" | "ema-rsi" => Ok(StrategyKind::EmaRsi),
            "threshold" | "simple" => Ok(StrategyKind::Threshold),
            other => Err(ConfigError::Invalid(format!("unknown strategy '{}'", other))),
        }
    }
}

/// Build the configured strategy, validating its parameters
pub fn build_strategy(
    kind: StrategyKind,
    ema_rsi: &EmaRsiConfig,
    threshold: &ThresholdConfig,
) -> Result<Box<dyn Strategy>, ConfigError> {
    Ok(match kind {
        StrategyKind::EmaRsi => Box::new(EmaRsiStrategy::new(ema_rsi.clone())?),
        StrategyKind::Threshold => Box::new(ThresholdStrategy::new(threshold.clone())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strategy_kind() {
        assert_eq!("ema_rsi".parse::<StrategyKind>().unwrap(), StrategyKind::EmaRsi);
        assert_eq!("simple".parse::<StrategyKind>().unwrap(), StrategyKind::Threshold);
        assert!("macd".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_build_each_kind() {
        let ema = EmaRsiConfig::default();
        let threshold = ThresholdConfig::default();

        let strategy = build_strategy(StrategyKind::EmaRsi, &ema, &threshold).unwrap();
        assert_eq!(strategy.name(), "EmaRsiStrategy");
        assert_eq!(strategy.lookback(), 26);

        let strategy = build_strategy(StrategyKind::Threshold, &ema, &threshold).unwrap();
        assert_eq!(strategy.name(), "ThresholdStrategy");
        assert_eq!(strategy.lookback(), 1);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let ema = EmaRsiConfig {
            rsi_oversold: 80.0,
            ..Default::default()
        };
        let result = build_strategy(StrategyKind::EmaRsi, &ema, &ThresholdConfig::default());
        assert!(matches!(result, Err(ConfigError::ThresholdOrder { .. })));
    }
}
