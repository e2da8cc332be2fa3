use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::error::ConfigError;
use crate::indicators::{calculate_ema, calculate_rsi, DEFAULT_RSI_PERIOD};
use crate::models::{PositionState, TradeSignal, DEFAULT_ORDER_QTY};
use crate::runner::PriceHistory;

/// Configuration for the EMA crossover / RSI strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaRsiConfig {
    pub short_period: usize,
    pub long_period: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub qty: f64,
}

impl Default for EmaRsiConfig {
    fn default() -> Self {
        Self {
            short_period: 12,
            long_period: 26,
            rsi_period: DEFAULT_RSI_PERIOD,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            qty: DEFAULT_ORDER_QTY,
        }
    }
}

impl EmaRsiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, period) in [
            ("short_period", self.short_period),
            ("long_period", self.long_period),
            ("rsi_period", self.rsi_period),
        ] {
            if period == 0 {
                return Err(ConfigError::ZeroPeriod { name });
            }
        }

        if self.short_period >= self.long_period {
            return Err(ConfigError::PeriodOrder {
                short: self.short_period,
                long: self.long_period,
            });
        }

        for (name, value) in [
            ("rsi_overbought", self.rsi_overbought),
            ("rsi_oversold", self.rsi_oversold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdRange { name, value });
            }
        }

        if self.rsi_oversold >= self.rsi_overbought {
            return Err(ConfigError::ThresholdOrder {
                oversold: self.rsi_oversold,
                overbought: self.rsi_overbought,
            });
        }

        if !self.qty.is_finite() || self.qty <= 0.0 {
            return Err(ConfigError::NotPositive {
                name: "qty",
                value: self.qty,
            });
        }

        Ok(())
    }

    /// Closes needed before every indicator is ready
    pub fn lookback(&self) -> usize {
        self.short_period
            .max(self.long_period)
            .max(self.rsi_period + 1)
    }
}

/// Generate a signal from EMA crossovers and RSI levels
///
/// * **Buy** while flat when the short EMA is above the long EMA and RSI is
///   below `rsi_oversold`.
/// * **Sell** while open when the short EMA is below the long EMA or RSI is
///   above `rsi_overbought`.
///
/// Returns `None` until enough closes exist for all three indicators.
pub fn ema_rsi_strategy(
    symbol: &str,
    prices: &[f64],
    position: PositionState,
    config: &EmaRsiConfig,
) -> Option<TradeSignal> {
    let short_ema = calculate_ema(prices, config.short_period)?;
    let long_ema = calculate_ema(prices, config.long_period)?;
    let rsi = calculate_rsi(prices, config.rsi_period)?;
    let current_price = *prices.last()?;

    tracing::debug!(
        symbol,
        price = current_price,
        short_ema,
        long_ema,
        rsi,
        "Indicators updated"
    );

    match position {
        PositionState::Flat => {
            // Entry: bullish crossover while momentum is still oversold
            if short_ema > long_ema && rsi < config.rsi_oversold {
                return Some(TradeSignal::buy(symbol, current_price, config.qty));
            }
        }
        PositionState::Open { .. } => {
            // Exit: either bearish crossover or overbought
            if short_ema < long_ema || rsi > config.rsi_overbought {
                return Some(TradeSignal::sell(symbol, current_price, config.qty));
            }
        }
    }

    None
}

/// EMA crossover strategy gated by RSI
#[derive(Debug, Clone)]
pub struct EmaRsiStrategy {
    config: EmaRsiConfig,
}

impl EmaRsiStrategy {
    pub fn new(config: EmaRsiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Strategy for EmaRsiStrategy {
    fn decide(&self, history: &PriceHistory, position: PositionState) -> Option<TradeSignal> {
        ema_rsi_strategy(history.symbol(), history.closes(), position, &self.config)
    }

    fn name(&self) -> &str {
        "EmaRsiStrategy"
    }

    fn lookback(&self) -> usize {
        self.config.lookback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    const SYMBOL: &str = "BTCUSDT";

    fn uptrend(n: usize) -> Vec<f64> {
        (1..=n).map(|p| p as f64).collect()
    }

    /// Long decline, then a sharp rally, then a shallow pullback.
    ///
    /// The rally lifts the short EMA above the long EMA; the pullback keeps it
    /// there while pushing RSI below 30.
    fn rally_then_pullback() -> Vec<f64> {
        let mut prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        prices.extend((1..=8).map(|i| 81.0 + i as f64 * 4.0));
        prices.extend((1..=14).map(|i| 113.0 - i as f64 * 0.5));
        prices
    }

    #[test]
    fn test_uptrend_rsi_blocks_entry() {
        let prices = uptrend(30);
        let config = EmaRsiConfig::default();

        let short = calculate_ema(&prices, 12).unwrap();
        let long = calculate_ema(&prices, 26).unwrap();
        assert!(short > long);
        assert_eq!(calculate_rsi(&prices, 14), Some(100.0));

        assert!(ema_rsi_strategy(SYMBOL, &prices, PositionState::Flat, &config).is_none());
    }

    #[test]
    fn test_uptrend_overbought_exits() {
        let prices = uptrend(30);
        let signal = ema_rsi_strategy(
            SYMBOL,
            &prices,
            PositionState::Open { entry_price: 10.0 },
            &EmaRsiConfig::default(),
        )
        .unwrap();

        assert_eq!(signal.side, Side::Sell);
        assert_eq!(signal.price, 30.0);
        assert_eq!(signal.qty, DEFAULT_ORDER_QTY);
    }

    #[test]
    fn test_insufficient_history_returns_none() {
        let config = EmaRsiConfig::default();
        for n in 0..26 {
            let prices = uptrend(n);
            assert!(ema_rsi_strategy(
                SYMBOL,
                &prices,
                PositionState::Open { entry_price: 1.0 },
                &config
            )
            .is_none());
        }
    }

    #[test]
    fn test_rsi_boundary_with_short_periods() {
        // long EMA ready at 10 closes, RSI(14) needs 15
        let config = EmaRsiConfig {
            short_period: 5,
            long_period: 10,
            ..Default::default()
        };
        let open = PositionState::Open { entry_price: 1.0 };

        let prices = uptrend(15);
        assert!(ema_rsi_strategy(SYMBOL, &prices[..14], open, &config).is_none());
        assert!(ema_rsi_strategy(SYMBOL, &prices, open, &config).is_some());
    }

    #[test]
    fn test_full_defaults_ready_with_29_prices() {
        let prices = uptrend(29);
        let open = PositionState::Open { entry_price: 1.0 };
        assert!(ema_rsi_strategy(SYMBOL, &prices, open, &EmaRsiConfig::default()).is_some());
    }

    #[test]
    fn test_pullback_in_uptrend_buys() {
        let prices = rally_then_pullback();
        let config = EmaRsiConfig::default();

        let short = calculate_ema(&prices, 12).unwrap();
        let long = calculate_ema(&prices, 26).unwrap();
        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(short > long, "short {} long {}", short, long);
        assert!(rsi < 30.0, "rsi {}", rsi);

        let signal = ema_rsi_strategy(SYMBOL, &prices, PositionState::Flat, &config).unwrap();
        assert_eq!(signal.side, Side::Buy);
        assert_eq!(signal.symbol, SYMBOL);
        assert_eq!(signal.price, *prices.last().unwrap());
    }

    #[test]
    fn test_downtrend_sells_open_position() {
        let prices: Vec<f64> = (0..40).map(|i| 200.0 - i as f64 * 2.0).collect();
        let signal = ema_rsi_strategy(
            SYMBOL,
            &prices,
            PositionState::Open { entry_price: 150.0 },
            &EmaRsiConfig::default(),
        )
        .unwrap();
        assert_eq!(signal.side, Side::Sell);
    }

    #[test]
    fn test_never_violates_position_discipline() {
        let config = EmaRsiConfig::default();
        let prices: Vec<f64> = (0..300)
            .map(|i| 100.0 + 20.0 * (i as f64 * 0.11).sin() + 5.0 * (i as f64 * 0.53).cos())
            .collect();

        for end in 0..=prices.len() {
            let window = &prices[..end];
            if let Some(signal) = ema_rsi_strategy(SYMBOL, window, PositionState::Flat, &config) {
                assert_eq!(signal.side, Side::Buy);
            }
            let open = PositionState::Open { entry_price: 100.0 };
            if let Some(signal) = ema_rsi_strategy(SYMBOL, window, open, &config) {
                assert_eq!(signal.side, Side::Sell);
            }
        }
    }

    #[test]
    fn test_strategy_reads_history_window() {
        let strategy = EmaRsiStrategy::new(EmaRsiConfig::default()).unwrap();
        let history = PriceHistory::from_closes(SYMBOL, strategy.lookback(), &uptrend(100));

        // window is the last 26 closes, still a pure uptrend
        assert_eq!(history.len(), 26);
        let signal = strategy
            .decide(&history, PositionState::Open { entry_price: 50.0 })
            .unwrap();
        assert_eq!(signal.side, Side::Sell);
        assert_eq!(signal.price, 100.0);
    }

    #[test]
    fn test_window_matches_unbounded_output() {
        let config = EmaRsiConfig::default();
        let prices = rally_then_pullback();
        let history = PriceHistory::from_closes(SYMBOL, config.lookback(), &prices);

        assert_eq!(
            calculate_ema(history.closes(), 26),
            calculate_ema(&prices, 26)
        );
        assert_eq!(
            calculate_rsi(history.closes(), 14),
            calculate_rsi(&prices, 14)
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(EmaRsiConfig::default().validate().is_ok());

        let zero = EmaRsiConfig {
            rsi_period: 0,
            ..Default::default()
        };
        assert_eq!(
            zero.validate(),
            Err(ConfigError::ZeroPeriod { name: "rsi_period" })
        );

        let crossed = EmaRsiConfig {
            short_period: 26,
            long_period: 12,
            ..Default::default()
        };
        assert!(matches!(
            crossed.validate(),
            Err(ConfigError::PeriodOrder { .. })
        ));

        let thresholds = EmaRsiConfig {
            rsi_oversold: 70.0,
            rsi_overbought: 70.0,
            ..Default::default()
        };
        assert!(matches!(
            thresholds.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));

        let range = EmaRsiConfig {
            rsi_overbought: 120.0,
            ..Default::default()
        };
        assert!(matches!(
            range.validate(),
            Err(ConfigError::ThresholdRange { .. })
        ));

        let qty = EmaRsiConfig {
            qty: 0.0,
            ..Default::default()
        };
        assert!(matches!(qty.validate(), Err(ConfigError::NotPositive { .. })));
    }

    #[test]
    fn test_lookback() {
        assert_eq!(EmaRsiConfig::default().lookback(), 26);

        let config = EmaRsiConfig {
            short_period: 3,
            long_period: 8,
            rsi_period: 14,
            ..Default::default()
        };
        assert_eq!(config.lookback(), 15);
    }
}
