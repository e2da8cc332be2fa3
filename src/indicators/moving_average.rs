/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices[prices.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA) over the last `period` prices
///
/// Seeded with the SMA of the window, then smoothed with
/// `alpha = 2 / (period + 1)` across every window value after the first,
/// oldest to newest.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let window = &prices[prices.len() - period..];
    let multiplier = 2.0 / (period as f64 + 1.0);

    let mut ema = calculate_sma(window, period)?;
    for price in &window[1..] {
        ema = (price - ema) * multiplier + ema;
    }

    Some(ema)
}
