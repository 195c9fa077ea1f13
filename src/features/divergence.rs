//! Price/RSI divergence at local extrema
//!
//! At every local price maximum the price slope and the RSI slope are fitted
//! over each trailing window; rising price with falling RSI in any window
//! marks a bearish divergence. Local minima are checked symmetrically for
//! bullish divergence.

use super::extrema::find_extrema;
use crate::indicators::ols_slope;

/// Per-index divergence flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivergenceFlags {
    pub bullish: Vec<bool>,
    pub bearish: Vec<bool>,
}

/// Detect divergences between `close` and `rsi`
///
/// `order` is the extrema neighborhood; each entry of `windows` is tested
/// independently over rows `[i - window, i]` (clipped at 0) and the results
/// are OR-ed into the same index.
pub fn detect_divergences(
    close: &[f64],
    rsi: &[f64],
    order: usize,
    windows: &[usize],
) -> DivergenceFlags {
    let n = close.len().min(rsi.len());
    let mut flags = DivergenceFlags {
        bullish: vec![false; n],
        bearish: vec![false; n],
    };

    let extrema = find_extrema(&close[..n], order);

    for &i in &extrema.maxima {
        flags.bearish[i] = windows.iter().any(|&w| {
            let start = i.saturating_sub(w);
            ols_slope(&close[start..=i]) > 0.0 && ols_slope(&rsi[start..=i]) < 0.0
        });
    }

    for &i in &extrema.minima {
        flags.bullish[i] = windows.iter().any(|&w| {
            let start = i.saturating_sub(w);
            ols_slope(&close[start..=i]) < 0.0 && ols_slope(&rsi[start..=i]) > 0.0
        });
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rising price into a peak at index 20 while RSI bleeds lower
    fn bearish_setup() -> (Vec<f64>, Vec<f64>) {
        let mut close: Vec<f64> = (0..=20).map(|i| 100.0 + i as f64).collect();
        close.extend((1..=10).map(|i| 120.0 - i as f64 * 2.0));
        let rsi: Vec<f64> = (0..close.len()).map(|i| 70.0 - i as f64 * 0.5).collect();
        (close, rsi)
    }

    #[test]
    fn test_bearish_divergence_at_peak() {
        let (close, rsi) = bearish_setup();
        let flags = detect_divergences(&close, &rsi, 5, &[15, 30]);

        assert!(flags.bearish[20]);
        assert_eq!(flags.bearish.iter().filter(|f| **f).count(), 1);
        assert!(flags.bullish.iter().all(|f| !f));
    }

    #[test]
    fn test_no_divergence_when_rsi_confirms() {
        let (close, _) = bearish_setup();
        let rsi: Vec<f64> = close.iter().map(|c| c - 60.0).collect();
        let flags = detect_divergences(&close, &rsi, 5, &[15, 30]);

        assert!(flags.bearish.iter().all(|f| !f));
    }

    #[test]
    fn test_bullish_divergence_at_trough() {
        let mut close: Vec<f64> = (0..=20).map(|i| 200.0 - i as f64).collect();
        close.extend((1..=10).map(|i| 180.0 + i as f64 * 2.0));
        let rsi: Vec<f64> = (0..close.len()).map(|i| 20.0 + i as f64 * 0.5).collect();

        let flags = detect_divergences(&close, &rsi, 5, &[15]);
        assert!(flags.bullish[20]);
        assert!(flags.bearish.iter().all(|f| !f));
    }

    #[test]
    fn test_window_includes_row_window_rows_back() {
        // Peak at 20; RSI climbs over rows 6..=20 but row 5 is a spike
        let mut close: Vec<f64> = (0..=20).map(|i| 100.0 + i as f64).collect();
        close.extend((1..=5).map(|i| 120.0 - i as f64));
        let mut rsi = vec![50.0; close.len()];
        rsi[5] = 100.0;
        for (k, i) in (6..=20).enumerate() {
            rsi[i] = 40.0 + k as f64 * 0.5;
        }

        // 15 covers rows 5..=20 and sees the spike, 14 stops at row 6
        assert!(detect_divergences(&close, &rsi, 3, &[15]).bearish[20]);
        assert!(!detect_divergences(&close, &rsi, 3, &[14]).bearish[20]);
    }

    #[test]
    fn test_output_length_matches_input() {
        let flags = detect_divergences(&[1.0, 2.0], &[50.0, 50.0], 9, &[15, 30]);
        assert_eq!(flags.bullish.len(), 2);
        assert_eq!(flags.bearish.len(), 2);
    }
}
