//! Application configuration
//!
//! Layered as built-in defaults, then an optional TOML file, then
//! `TRADEBOT__*` environment variables (`__` separates nesting levels, e.g.
//! `TRADEBOT__STRATEGY__KIND=threshold`).

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::feed::FeedKind;
use crate::strategy::{build_strategy, EmaRsiConfig, Strategy, StrategyKind, ThresholdConfig};

const ENV_PREFIX: &str = "TRADEBOT";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub symbols: Vec<String>,
    pub feed: FeedConfig,
    pub strategy: StrategyConfig,
    pub execution: ExecutionConfig,
    pub database_url: Option<String>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string()],
            feed: FeedConfig::default(),
            strategy: StrategyConfig::default(),
            execution: ExecutionConfig::default(),
            database_url: None,
            log_filter: "tradebot=info".to_string(),
        }
    }
}

/// Price feed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub kind: FeedKind,
    /// Kline interval for the live feed
    pub interval: String,
    pub max_reconnects: u32,
    /// JSON-lines file for the replay feed
    pub replay_file: Option<PathBuf>,
    pub synthetic: SyntheticConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            kind: FeedKind::Binance,
            interval: "1m".to_string(),
            max_reconnects: 10,
            replay_file: None,
            synthetic: SyntheticConfig::default(),
        }
    }
}

/// Random-walk feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub start_price: f64,
    pub volatility: f64,
    /// Stop after this many candles (unbounded when unset)
    pub count: Option<usize>,
    /// Wall-clock delay between candles
    pub pace_ms: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 100.0,
            volatility: 0.01,
            count: Some(500),
            pace_ms: None,
        }
    }
}

/// Strategy selection and parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub ema_rsi: EmaRsiConfig,
    pub threshold: ThresholdConfig,
}

impl StrategyConfig {
    pub fn build(&self) -> Result<Box<dyn Strategy>, ConfigError> {
        build_strategy(self.kind, &self.ema_rsi, &self.threshold)
    }
}

/// Where signals are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Paper,
    Postgres,
}

impl std::str::FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paper" => Ok(SinkKind::Paper),
            "postgres" => Ok(SinkKind::Postgres),
            other => Err(format!("unknown sink '{}'", other)),
        }
    }
}

/// Execution sink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub sink: SinkKind,
    /// Fraction of notional charged per fill
    pub fee_rate: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Paper,
            fee_rate: 0.0,
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.normalize_symbols();
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.normalize_symbols();
        Ok(config)
    }

    /// Upper-case and trim symbols to match the exchange's spelling
    pub fn normalize_symbols(&mut self) {
        for symbol in &mut self.symbols {
            *symbol = symbol.trim().to_uppercase();
        }
    }

    /// Reject configurations that would fail once streaming has started
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() || self.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::NoSymbols);
        }

        self.strategy.build()?;

        if !self.execution.fee_rate.is_finite() || self.execution.fee_rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "fee_rate must be a non-negative number, got {}",
                self.execution.fee_rate
            )));
        }

        if self.execution.sink == SinkKind::Postgres && self.database_url.is_none() {
            return Err(ConfigError::Invalid(
                "postgres sink requires database_url".to_string(),
            ));
        }

        let synthetic = &self.feed.synthetic;
        if !synthetic.start_price.is_finite() || synthetic.start_price <= 0.0 {
            return Err(ConfigError::NotPositive {
                name: "feed.synthetic.start_price",
                value: synthetic.start_price,
            });
        }
        if !synthetic.volatility.is_finite() || !(0.0..1.0).contains(&synthetic.volatility.abs()) {
            return Err(ConfigError::Invalid(format!(
                "feed.synthetic.volatility must be a finite fraction in [0, 1), got {}",
                synthetic.volatility
            )));
        }

        if self.feed.kind == FeedKind::Replay && self.feed.replay_file.is_none() {
            return Err(ConfigError::Invalid(
                "replay feed requires feed.replay_file".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.symbols, vec!["BTCUSDT".to_string()]);
        assert_eq!(config.strategy.kind, StrategyKind::EmaRsi);
        assert_eq!(config.execution.sink, SinkKind::Paper);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = AppConfig::from_toml_str(
            r#"
            symbols = ["ETHUSDT", "SOLUSDT"]

            [strategy]
            kind = "threshold"

            [strategy.threshold]
            take_profit_pct = 0.03

            [strategy.ema_rsi]
            short_period = 9

            [feed]
            kind = "synthetic"

            [feed.synthetic]
            seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.symbols, vec!["ETHUSDT", "SOLUSDT"]);
        assert_eq!(config.strategy.kind, StrategyKind::Threshold);
        assert_eq!(config.strategy.threshold.take_profit_pct, 0.03);
        assert_eq!(config.strategy.threshold.stop_loss_pct, 0.01);
        assert_eq!(config.strategy.ema_rsi.short_period, 9);
        assert_eq!(config.strategy.ema_rsi.long_period, 26);
        assert_eq!(config.feed.kind, FeedKind::Synthetic);
        assert_eq!(config.feed.synthetic.seed, 7);
        assert_eq!(config.feed.synthetic.start_price, 100.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_strategy_rejected_at_startup() {
        let config = AppConfig::from_toml_str(
            r#"
            [strategy.ema_rsi]
            rsi_oversold = 75.0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = AppConfig::default();
        config.execution.sink = SinkKind::Postgres;
        assert!(config.validate().is_err());

        config.database_url = Some("postgres://localhost/tradebot".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replay_requires_file() {
        let mut config = AppConfig::default();
        config.feed.kind = FeedKind::Replay;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_no_symbols_rejected() {
        let config = AppConfig {
            symbols: vec![],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoSymbols));
    }

    #[test]
    fn test_symbols_normalized_to_exchange_case() {
        let config = AppConfig::from_toml_str(r#"symbols = ["btcusdt", " EthUsdt "]"#).unwrap();
        assert_eq!(config.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_synthetic_feed_settings_validated() {
        let mut config = AppConfig::default();
        config.feed.synthetic.volatility = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.feed.synthetic.volatility = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.feed.synthetic.volatility = 0.0;
        assert!(config.validate().is_ok());

        config.feed.synthetic.start_price = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { name: "feed.synthetic.start_price", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"symbols = [\"bnbusdt\"]\n[execution]\nfee_rate = 0.001\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.symbols, vec!["BNBUSDT"]);
        assert_eq!(config.execution.fee_rate, 0.001);
    }
}
