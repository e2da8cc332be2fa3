//! Binance WebSocket kline feed

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::Feed;
use crate::models::PriceObservation;

/// Binance WebSocket base URL
const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Connection settings for the kline stream
#[derive(Debug, Clone)]
pub struct BinanceKlineConfig {
    pub base_url: String,
    /// Kline interval, e.g. "1m"
    pub interval: String,
    /// Consecutive failed connects before giving up (0 = retry forever)
    pub max_reconnects: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BinanceKlineConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_WS_URL.to_string(),
            interval: "1m".to_string(),
            max_reconnects: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Binance kline event
#[derive(Debug, Deserialize)]
struct KlineEvent {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "k")]
    kline: Kline,
}

#[derive(Debug, Deserialize)]
struct Kline {
    /// Close time (milliseconds)
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    /// Whether this kline is closed
    #[serde(rename = "x")]
    is_closed: bool,
}

/// Why a single connection ended
enum StreamEnd {
    ReceiverDropped,
    ServerClosed,
}

/// Reconnect schedule: doubles after each wait, capped at `max`
#[derive(Debug)]
struct Backoff {
    initial: Duration,
    max: Duration,
    delay: Duration,
    attempts: u32,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            delay: initial,
            attempts: 0,
        }
    }

    /// Called on every successful connect
    fn reset(&mut self) {
        self.delay = self.initial;
        self.attempts = 0;
    }

    /// Record a failed attempt, returning consecutive failures so far
    fn fail(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (self.delay * 2).min(self.max);
        delay
    }
}

/// Closed 1-interval candles for one symbol
///
/// A background task owns the socket, reconnecting with exponential backoff;
/// observations are handed over through a bounded channel. Dropping the feed
/// stops the task.
pub struct BinanceKlineFeed {
    rx: mpsc::Receiver<PriceObservation>,
    task: JoinHandle<()>,
}

impl BinanceKlineFeed {
    /// Subscribe to `{symbol}@kline_{interval}`
    pub fn connect(symbol: &str, config: BinanceKlineConfig) -> Self {
        let (tx, rx) = mpsc::channel(1024);
        let url = Self::stream_url(symbol, &config);

        tracing::info!(symbol, %url, "Subscribing to Binance kline feed");

        let task = tokio::spawn(async move {
            Self::run_connection_loop(url, config, tx).await;
        });

        Self { rx, task }
    }

    fn stream_url(symbol: &str, config: &BinanceKlineConfig) -> String {
        format!(
            "{}/{}@kline_{}",
            config.base_url.trim_end_matches('/'),
            symbol.to_lowercase(),
            config.interval
        )
    }

    /// Parse a kline event, keeping only closed candles
    fn parse_message(msg: &str) -> Option<PriceObservation> {
        let event: KlineEvent = serde_json::from_str(msg).ok()?;

        if event.event_type != "kline" || !event.kline.is_closed {
            return None;
        }

        let kline = event.kline;
        Some(PriceObservation {
            symbol: event.symbol.to_uppercase(),
            timestamp: Utc.timestamp_millis_opt(kline.close_time).single()?,
            open: kline.open.parse().ok()?,
            high: kline.high.parse().ok()?,
            low: kline.low.parse().ok()?,
            close: kline.close.parse().ok()?,
            volume: kline.volume.parse().ok()?,
        })
    }

    async fn run_connection_loop(
        url: String,
        config: BinanceKlineConfig,
        tx: mpsc::Sender<PriceObservation>,
    ) {
        let mut backoff = Backoff::new(config.initial_delay, config.max_delay);

        loop {
            match Self::connect_and_stream(&url, &tx, &mut backoff).await {
                Ok(StreamEnd::ReceiverDropped) => {
                    tracing::debug!("Observation receiver dropped, stopping feed");
                    return;
                }
                Ok(StreamEnd::ServerClosed) => {
                    tracing::warn!(%url, "Binance closed the stream, reconnecting");
                }
                Err(e) => {
                    let attempts = backoff.fail();
                    tracing::warn!(error = %e, attempt = attempts, "Binance feed error");

                    if config.max_reconnects > 0 && attempts >= config.max_reconnects {
                        tracing::error!(%url, "Max reconnection attempts reached, ending feed");
                        return;
                    }
                }
            }

            if tx.is_closed() {
                return;
            }

            sleep(backoff.next_delay()).await;
        }
    }

    async fn connect_and_stream(
        url: &str,
        tx: &mpsc::Sender<PriceObservation>,
        backoff: &mut Backoff,
    ) -> Result<StreamEnd, tokio_tungstenite::tungstenite::Error> {
        let (ws, _) = connect_async(url).await?;
        let (mut write, mut read) = ws.split();

        tracing::info!(%url, "Binance feed connected");
        backoff.reset();

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => {
                    if let Some(observation) = Self::parse_message(&text) {
                        if tx.send(observation).await.is_err() {
                            return Ok(StreamEnd::ReceiverDropped);
                        }
                    }
                }
                Message::Ping(payload) => {
                    write.send(Message::Pong(payload)).await?;
                }
                Message::Close(_) => return Ok(StreamEnd::ServerClosed),
                _ => {}
            }
        }

        Ok(StreamEnd::ServerClosed)
    }
}

impl Drop for BinanceKlineFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl Feed for BinanceKlineFeed {
    async fn next(&mut self) -> Option<PriceObservation> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kline_message(closed: bool) -> String {
        format!(
            r#"{{
                "e": "kline",
                "E": 1704067260005,
                "s": "BTCUSDT",
                "k": {{
                    "t": 1704067200000,
                    "T": 1704067259999,
                    "s": "BTCUSDT",
                    "i": "1m",
                    "o": "42500.10",
                    "c": "42510.55",
                    "h": "42520.00",
                    "l": "42490.25",
                    "v": "12.345",
                    "n": 100,
                    "x": {},
                    "q": "524000.0"
                }}
            }}"#,
            closed
        )
    }

    #[test]
    fn test_build_stream_url() {
        let url = BinanceKlineFeed::stream_url("BTCUSDT", &BinanceKlineConfig::default());
        assert_eq!(url, "wss://stream.binance.com:9443/ws/btcusdt@kline_1m");
    }

    #[test]
    fn test_stream_url_custom_interval() {
        let config = BinanceKlineConfig {
            base_url: "ws://localhost:9000/ws/".to_string(),
            interval: "5m".to_string(),
            ..Default::default()
        };
        let url = BinanceKlineFeed::stream_url("ethusdt", &config);
        assert_eq!(url, "ws://localhost:9000/ws/ethusdt@kline_5m");
    }

    #[test]
    fn test_parse_closed_kline() {
        let obs = BinanceKlineFeed::parse_message(&kline_message(true)).unwrap();

        assert_eq!(obs.symbol, "BTCUSDT");
        assert_eq!(obs.open, 42500.10);
        assert_eq!(obs.high, 42520.00);
        assert_eq!(obs.low, 42490.25);
        assert_eq!(obs.close, 42510.55);
        assert_eq!(obs.volume, 12.345);
        assert_eq!(obs.timestamp.timestamp_millis(), 1704067259999);
    }

    #[test]
    fn test_open_kline_ignored() {
        assert!(BinanceKlineFeed::parse_message(&kline_message(false)).is_none());
    }

    #[test]
    fn test_parse_invalid_event_type() {
        let msg = kline_message(true).replace("\"kline\"", "\"trade\"");
        assert!(BinanceKlineFeed::parse_message(&msg).is_none());
    }

    #[test]
    fn test_parse_bad_number() {
        let msg = kline_message(true).replace("42510.55", "n/a");
        assert!(BinanceKlineFeed::parse_message(&msg).is_none());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(BinanceKlineFeed::parse_message("not valid json").is_none());
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn test_backoff_reset_after_connect() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(backoff.fail(), 1);
        backoff.next_delay();
        assert_eq!(backoff.fail(), 2);
        backoff.next_delay();

        // connection succeeded, later drops by error
        backoff.reset();
        assert_eq!(backoff.fail(), 1);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    #[ignore] // Requires live API
    async fn test_live_kline_feed() {
        let mut feed = BinanceKlineFeed::connect("BTCUSDT", BinanceKlineConfig::default());
        let obs = feed.next().await.unwrap();
        assert_eq!(obs.symbol, "BTCUSDT");
        assert!(obs.close > 0.0);
    }
}
