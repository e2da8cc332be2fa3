/// Lookback used when no RSI period is configured
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Uses the `period` transitions ending at the last price, so at least
/// `period + 1` prices are required. Returns exactly 100.0 when the window
/// has no losses.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() <= period {
        return None;
    }

    let window = &prices[prices.len() - period - 1..];

    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses += -change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - (100.0 / (1.0 + rs));

    Some(rsi)
}
