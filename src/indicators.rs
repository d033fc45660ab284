//! Technical indicators over a close-price series
//!
//! Outputs have the input's length. Positions without enough history are
//! `None`.

/// Simple moving average. The first `period - 1` positions are `None`.
pub fn sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let mut window_sum: f64 = closes[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);

    for i in period..closes.len() {
        window_sum += closes[i] - closes[i - period];
        out[i] = Some(window_sum / period as f64);
    }

    out
}

/// Relative strength index with Wilder smoothing, seeded by the simple
/// average of the first `period` changes. The first `period` positions are
/// `None` since a change needs two prices.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;
    out[period] = Some(strength_index(avg_gain, avg_loss));

    let n = period as f64;
    for (offset, change) in changes[period..].iter().enumerate() {
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
        out[period + 1 + offset] = Some(strength_index(avg_gain, avg_loss));
    }

    out
}

fn strength_index(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Round to two decimals for display
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
