// Streaming control loop: one runner per symbol
pub mod history;
pub mod shutdown;

pub use history::PriceHistory;
pub use shutdown::Shutdown;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::{ExecutionError, ObservationError};
use crate::execution::ExecutionSink;
use crate::feed::Feed;
use crate::models::{ExecutionReceipt, PositionState, PriceObservation, TradeSignal};
use crate::strategy::Strategy;

/// What happened to a single observation
#[derive(Debug)]
pub enum TickOutcome {
    /// Refused before reaching the history
    Rejected(ObservationError),
    /// Appended; the strategy had nothing to do
    NoSignal,
    /// Strategy emitted a signal the current position does not allow
    Discarded(TradeSignal),
    /// Signal executed and position updated
    Executed {
        signal: TradeSignal,
        receipt: ExecutionReceipt,
    },
    /// Sink failed; position left unchanged
    ExecutionFailed {
        signal: TradeSignal,
        error: ExecutionError,
    },
}

/// Counters reported when a stream ends
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub symbol: String,
    pub observations: u64,
    pub rejected: u64,
    pub signals: u64,
    pub executed: u64,
    pub failed_executions: u64,
    pub discarded: u64,
    pub final_position: PositionState,
    pub cancelled: bool,
}

/// Drives one symbol's stream through a strategy into an execution sink
///
/// Owns the price history and position exclusively. Observations are
/// handled strictly one at a time: validate, append, decide, execute, then
/// transition. The position changes only after the sink confirms.
pub struct StreamRunner<S, E> {
    symbol: String,
    strategy: S,
    sink: E,
    history: PriceHistory,
    position: PositionState,
    last_timestamp: Option<DateTime<Utc>>,
    summary: RunSummary,
}

impl<S: Strategy, E: ExecutionSink> StreamRunner<S, E> {
    /// Create a flat runner with an empty history sized to the strategy
    pub fn new(symbol: impl Into<String>, strategy: S, sink: E) -> Self {
        let symbol = symbol.into();
        let history = PriceHistory::new(symbol.clone(), strategy.lookback());

        Self {
            summary: RunSummary {
                symbol: symbol.clone(),
                observations: 0,
                rejected: 0,
                signals: 0,
                executed: 0,
                failed_executions: 0,
                discarded: 0,
                final_position: PositionState::Flat,
                cancelled: false,
            },
            symbol,
            strategy,
            sink,
            history,
            position: PositionState::Flat,
            last_timestamp: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn position(&self) -> PositionState {
        self.position
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            final_position: self.position,
            ..self.summary.clone()
        }
    }

    fn accept(&self, observation: &PriceObservation) -> Result<(), ObservationError> {
        if observation.symbol != self.symbol {
            return Err(ObservationError::SymbolMismatch {
                expected: self.symbol.clone(),
                got: observation.symbol.clone(),
            });
        }

        observation.validate()?;

        if let Some(last) = self.last_timestamp {
            if observation.timestamp < last {
                return Err(ObservationError::OutOfOrder {
                    timestamp: observation.timestamp,
                    last,
                });
            }
        }

        Ok(())
    }

    /// Process one observation to completion
    pub async fn on_observation(&mut self, observation: PriceObservation) -> TickOutcome {
        if let Err(e) = self.accept(&observation) {
            self.summary.rejected += 1;
            tracing::warn!(symbol = %self.symbol, error = %e, "Rejected observation");
            return TickOutcome::Rejected(e);
        }

        self.history.push(observation.close);
        self.last_timestamp = Some(observation.timestamp);
        self.summary.observations += 1;

        let Some(signal) = self.strategy.decide(&self.history, self.position) else {
            return TickOutcome::NoSignal;
        };
        let signal = signal.at(observation.timestamp);

        if !self.position.permits(signal.side) {
            self.summary.discarded += 1;
            tracing::warn!(
                symbol = %self.symbol,
                side = %signal.side,
                position = ?self.position,
                strategy = self.strategy.name(),
                "Discarding signal not allowed in current position"
            );
            return TickOutcome::Discarded(signal);
        }

        self.summary.signals += 1;
        tracing::info!(
            symbol = %self.symbol,
            side = %signal.side,
            price = signal.price,
            qty = signal.qty,
            "Signal generated"
        );

        match self.sink.execute(&signal).await {
            Ok(receipt) => {
                self.position = self.position.after(&signal);
                self.summary.executed += 1;
                tracing::info!(
                    symbol = %self.symbol,
                    receipt = %receipt.id,
                    position = ?self.position,
                    "Signal executed"
                );
                TickOutcome::Executed { signal, receipt }
            }
            Err(error) => {
                self.summary.failed_executions += 1;
                tracing::error!(
                    symbol = %self.symbol,
                    side = %signal.side,
                    error = %error,
                    position = ?self.position,
                    "Execution failed, position unchanged"
                );
                TickOutcome::ExecutionFailed { signal, error }
            }
        }
    }

    /// Consume `feed` until it ends or `shutdown` fires
    ///
    /// Cancellation is only observed while waiting for the next observation,
    /// never in the middle of processing one.
    pub async fn run<F: Feed + ?Sized>(&mut self, feed: &mut F, shutdown: &Shutdown) -> RunSummary {
        tracing::info!(
            symbol = %self.symbol,
            strategy = self.strategy.name(),
            window = self.history.capacity(),
            "Stream runner started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.summary.cancelled = true;
                    break;
                }
                next = feed.next() => next,
            };

            match next {
                Some(observation) => {
                    self.on_observation(observation).await;
                }
                None => {
                    tracing::info!(symbol = %self.symbol, "Feed ended");
                    break;
                }
            }
        }

        let summary = self.summary();
        tracing::info!(
            symbol = %summary.symbol,
            observations = summary.observations,
            signals = summary.signals,
            executed = summary.executed,
            failed = summary.failed_executions,
            rejected = summary.rejected,
            cancelled = summary.cancelled,
            "Stream runner stopped"
        );
        summary
    }
}

/// Run `runner` over `feed` on its own task
pub fn spawn_runner<S, E, F>(
    mut runner: StreamRunner<S, E>,
    mut feed: F,
    shutdown: Shutdown,
) -> JoinHandle<RunSummary>
where
    S: Strategy + 'static,
    E: ExecutionSink + 'static,
    F: Feed + 'static,
{
    tokio::spawn(async move { runner.run(&mut feed, &shutdown).await })
}
