use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Feed;
use crate::models::PriceObservation;

/// Seeded random-walk candle generator
///
/// Identical seeds produce identical streams. With a `pace` set, each
/// observation is delayed by that long of wall-clock time.
pub struct SyntheticFeed {
    symbol: String,
    rng: StdRng,
    price: f64,
    volatility: f64,
    base_volume: f64,
    next_close_time: DateTime<Utc>,
    interval: Duration,
    remaining: Option<usize>,
    pace: Option<std::time::Duration>,
}

impl SyntheticFeed {
    /// Create a generator
    ///
    /// # Arguments
    /// * `seed` - RNG seed for reproducibility
    /// * `start_price` - First open price
    /// * `volatility` - Max fractional move per candle (0.01 = ±1%)
    pub fn new(symbol: impl Into<String>, seed: u64, start_price: f64, volatility: f64) -> Self {
        Self {
            symbol: symbol.into(),
            rng: StdRng::seed_from_u64(seed),
            price: start_price,
            volatility: volatility.abs(),
            base_volume: 1_000.0,
            next_close_time: Utc::now(),
            interval: Duration::minutes(1),
            remaining: None,
            pace: None,
        }
    }

    /// Stop after `count` observations
    pub fn take(mut self, count: usize) -> Self {
        self.remaining = Some(count);
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>, interval: Duration) -> Self {
        self.next_close_time = start;
        self.interval = interval;
        self
    }

    /// Sleep between observations to mimic a live cadence
    pub fn paced(mut self, pace: std::time::Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    fn generate(&mut self) -> PriceObservation {
        let open = self.price;
        let change = self.rng.gen_range(-self.volatility..=self.volatility);
        let close = (open * (1.0 + change)).max(0.01);

        let wick = self.rng.gen_range(0.0..=self.volatility / 2.0);
        let high = open.max(close) * (1.0 + wick);
        let low = open.min(close) * (1.0 - wick);
        let volume = self.base_volume * self.rng.gen_range(0.5..1.5);

        let observation = PriceObservation {
            symbol: self.symbol.clone(),
            timestamp: self.next_close_time,
            open,
            high,
            low,
            close,
            volume,
        };

        self.price = close;
        self.next_close_time += self.interval;
        observation
    }
}

#[async_trait]
impl Feed for SyntheticFeed {
    async fn next(&mut self) -> Option<PriceObservation> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        if let Some(pace) = self.pace {
            tokio::time::sleep(pace).await;
        }

        Some(self.generate())
    }
}
