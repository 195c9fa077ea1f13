//! Technical indicators used by the feature engine
//!
//! Moving averages go through the `ta` crate. RSI and ATR are written out by
//! hand because both use Wilder smoothing seeded from the first bar, which
//! `ta` does not expose.
//!
//! Available indicators:
//! - Moving Averages: SMA, rolling mean over optional inputs
//! - Momentum: RSI
//! - Volatility: True Range, ATR
//! - Regression: least-squares slope

use ta::indicators::SimpleMovingAverage;
use ta::Next;

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
///
/// Indices before the window fills are `None`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    let mut result = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let sma_val = indicator.next(value);
        if i + 1 >= period {
            result.push(Some(sma_val));
        } else {
            result.push(None);
        }
    }

    result
}

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate True Range
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Calculate Average True Range (ATR) using Wilder's smoothing
///
/// ATR = (prev_ATR * (period - 1) + current_TR) / period, seeded with the
/// mean of the first `period` true ranges. Indices before the seed are 0.0,
/// so the output is always the input length and never negative.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    if high.is_empty() || high.len() != low.len() || high.len() != close.len() {
        return vec![];
    }
    if period == 0 || high.len() < period {
        return vec![0.0; high.len()];
    }

    let tr = true_range(high, low, close);
    let mut result = vec![0.0; tr.len()];

    let mut atr_value = tr[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = atr_value;

    for i in period..tr.len() {
        atr_value = (atr_value * (period - 1) as f64 + tr[i]) / period as f64;
        result[i] = atr_value;
    }

    result
}

// =============================================================================
// Momentum Indicators
// =============================================================================

/// Calculate RSI (Relative Strength Index) with Wilder smoothing
///
/// Gains and losses are smoothed with alpha = 1/period starting from the
/// first bar. Indices before the first full window read a neutral 50; after
/// that a window with losses smoothed to zero reads 100.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return vec![];
    }
    if period == 0 {
        return vec![50.0; values.len()];
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    let mut result = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let change = if i == 0 { 0.0 } else { value - values[i - 1] };
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 0 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = (1.0 - alpha) * avg_gain + alpha * gain;
            avg_loss = (1.0 - alpha) * avg_loss + alpha * loss;
        }

        let value = if i + 1 < period || (avg_loss == 0.0 && avg_gain == 0.0) {
            50.0
        } else if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        result.push(value.clamp(0.0, 100.0));
    }

    result
}

// =============================================================================
// Regression
// =============================================================================

/// Ordinary least-squares slope of `values` against their index
///
/// Fewer than two points (or a degenerate x spread) yields 0.0.
pub fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let (cov, var) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(cov, var), (i, &y)| {
            let dx = i as f64 - x_mean;
            (cov + dx * (y - y_mean), var + dx * dx)
        });

    if var == 0.0 {
        0.0
    } else {
        cov / var
    }
}

// =============================================================================
// Tests
// =============================================================================
