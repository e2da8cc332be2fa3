//! Price feed module
//!
//! Producers of time-ordered observations for a single symbol

mod binance;
mod replay;
mod synthetic;

pub use binance::{BinanceKlineFeed, BinanceKlineConfig};
pub use replay::ReplayFeed;
pub use synthetic::SyntheticFeed;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::PriceObservation;

/// Trait for price feed implementations
#[async_trait]
pub trait Feed: Send {
    /// Wait for the next closed observation; `None` ends the stream
    async fn next(&mut self) -> Option<PriceObservation>;
}

#[async_trait]
impl Feed for mpsc::Receiver<PriceObservation> {
    async fn next(&mut self) -> Option<PriceObservation> {
        self.recv().await
    }
}

#[async_trait]
impl<F: Feed + ?Sized> Feed for Box<F> {
    async fn next(&mut self) -> Option<PriceObservation> {
        (**self).next().await
    }
}

/// Feed selected in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    #[default]
    Binance,
    Synthetic,
    Replay,
}

impl std::str::FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binance" => Ok(FeedKind::Binance),
            "synthetic" => Ok(FeedKind::Synthetic),
            "replay" => Ok(FeedKind::Replay),
            other => Err(format!("unknown feed '{}'", other)),
        }
    }
}
