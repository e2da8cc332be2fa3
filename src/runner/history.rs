/// Rolling window of closing prices for one symbol's stream
///
/// Keeps the most recent `capacity` closes, oldest first. Storage grows to at
/// most twice the capacity before the stale prefix is dropped in one pass, so
/// `closes()` is always a contiguous slice.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    symbol: String,
    closes: Vec<f64>,
    capacity: usize,
    observed: u64,
}

impl PriceHistory {
    /// Create an empty history
    ///
    /// # Arguments
    /// * `capacity` - Number of recent closes to retain (at least 1)
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            closes: Vec::with_capacity(capacity.saturating_mul(2).min(4096)),
            capacity,
            observed: 0,
        }
    }

    /// Build a history pre-filled with `closes`, as if they had been streamed
    pub fn from_closes(symbol: impl Into<String>, capacity: usize, closes: &[f64]) -> Self {
        let mut history = Self::new(symbol, capacity);
        for &close in closes {
            history.push(close);
        }
        history
    }

    /// Append a close, evicting the oldest entries beyond capacity
    pub fn push(&mut self, close: f64) {
        self.closes.push(close);
        self.observed += 1;

        if self.closes.len() >= self.capacity.saturating_mul(2) {
            let stale = self.closes.len() - self.capacity;
            self.closes.drain(..stale);
        }
    }

    /// Retained closes, oldest first
    pub fn closes(&self) -> &[f64] {
        let start = self.closes.len().saturating_sub(self.capacity);
        &self.closes[start..]
    }

    /// Most recent close
    pub fn last(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of closes appended over the stream's lifetime
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// Number of closes currently retained
    pub fn len(&self) -> usize {
        self.closes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}
