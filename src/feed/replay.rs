use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::path::Path;

use super::Feed;
use crate::error::FeedError;
use crate::models::PriceObservation;

/// Replays a fixed sequence of observations, then ends
#[derive(Debug, Clone, Default)]
pub struct ReplayFeed {
    observations: VecDeque<PriceObservation>,
}

impl ReplayFeed {
    pub fn new(observations: Vec<PriceObservation>) -> Self {
        Self {
            observations: observations.into(),
        }
    }

    /// Build flat candles (open = high = low = close) from closing prices
    ///
    /// Timestamps start at `start` and advance by `interval` per close.
    pub fn from_closes(
        symbol: &str,
        closes: &[f64],
        start: DateTime<Utc>,
        interval: Duration,
    ) -> Self {
        let observations = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceObservation {
                symbol: symbol.to_string(),
                timestamp: start + interval * i as i32,
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect();

        Self { observations }
    }

    /// Load observations from a JSON-lines file, one object per line
    ///
    /// Blank lines are skipped. With `symbol` set, only that symbol's rows
    /// are kept.
    pub fn from_jsonl(path: impl AsRef<Path>, symbol: Option<&str>) -> Result<Self, FeedError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut observations = Vec::new();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let observation: PriceObservation =
                serde_json::from_str(line).map_err(|source| FeedError::Parse {
                    line: index + 1,
                    source,
                })?;

            if symbol.map_or(true, |s| s == observation.symbol) {
                observations.push(observation);
            }
        }

        tracing::info!(
            path = %path.as_ref().display(),
            count = observations.len(),
            "Loaded replay file"
        );

        Ok(Self::new(observations))
    }

    /// Observations not yet delivered
    pub fn remaining(&self) -> usize {
        self.observations.len()
    }
}

#[async_trait]
impl Feed for ReplayFeed {
    async fn next(&mut self) -> Option<PriceObservation> {
        self.observations.pop_front()
    }
}
