//! Feature engine
//!
//! Turns an ordered candle history into one [`FeatureRow`] per candle:
//! momentum and volatility indicators, moving averages, extrema tags at three
//! scales, divergence flags and consolidation flags. The whole sequence is
//! recomputed on every call; there is no incremental update.
//!
//! Extrema (and the divergence flags that depend on them) need `order` rows
//! on both sides, so the newest rows of a sequence are provisional and may
//! gain a tag on a later run.

pub mod consolidation;
pub mod divergence;
pub mod extrema;

pub use consolidation::detect_consolidation;
pub use divergence::{detect_divergences, DivergenceFlags};
pub use extrema::{find_extrema, Extrema};

use crate::config::FeatureConfig;
use crate::indicators;
use crate::types::{BigExtremaTag, Candle, ExtremaTag, FeatureRow, MediumExtremaTag};

/// Compute the full feature sequence for `candles`
///
/// Output has the same length and order as the input. Callers must pass
/// candles sorted by open time with finite prices; nothing is validated here.
pub fn compute_features(candles: &[Candle], config: &FeatureConfig) -> Vec<FeatureRow> {
    if candles.is_empty() {
        return Vec::new();
    }

    let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let low: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let close: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let rsi = indicators::rsi(&close, config.rsi_period);
    let atr = indicators::atr(&high, &low, &close, config.atr_period);
    let mean_atr = indicators::sma(&atr, config.mean_atr_window);
    let ma_fast = indicators::sma(&close, config.ma_fast);
    let ma_slow = indicators::sma(&close, config.ma_slow);

    let fine = find_extrema(&close, config.extrema_order);
    let medium = find_extrema(&close, config.medium_extrema_order);
    let big = find_extrema(&close, config.big_extrema_order);

    let divergence = detect_divergences(
        &close,
        &rsi,
        config.divergence_order,
        &config.divergence_windows,
    );
    let consolidated = detect_consolidation(
        &close,
        config.consolidation_window,
        config.consolidation_threshold,
    );

    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let mut row = FeatureRow::from_candle(candle);
            row.rsi = rsi[i];
            row.atr = atr[i];
            row.mean_atr = mean_atr.get(i).copied().flatten();
            row.ma_22 = ma_fast.get(i).copied().flatten();
            row.ma_50 = ma_slow.get(i).copied().flatten();

            row.extrema = if fine.is_max(i) {
                ExtremaTag::High
            } else if fine.is_min(i) {
                ExtremaTag::Low
            } else {
                ExtremaTag::None
            };
            row.medium_extrema = if medium.is_max(i) {
                MediumExtremaTag::MediumHigh
            } else if medium.is_min(i) {
                MediumExtremaTag::MediumLow
            } else {
                MediumExtremaTag::None
            };
            row.big_extrema = if big.is_max(i) {
                BigExtremaTag::BigHigh
            } else if big.is_min(i) {
                BigExtremaTag::BigLow
            } else {
                BigExtremaTag::None
            };

            row.bullish_divergence = divergence.bullish[i];
            row.bearish_divergence = divergence.bearish[i];
            row.consolidated = consolidated[i];
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn wave_candles(n: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 8.0 + i as f64 * 0.05;
                Candle::new(
                    start + Duration::minutes(5 * i as i64),
                    close - 0.2,
                    close + 1.0,
                    close - 1.0,
                    close,
                    1_000.0,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_output_matches_input_length_and_order() {
        let candles = wave_candles(120);
        let rows = compute_features(&candles, &FeatureConfig::default());

        assert_eq!(rows.len(), candles.len());
        for (row, candle) in rows.iter().zip(&candles) {
            assert_eq!(row.open_time, candle.open_time);
        }
        assert!(rows.windows(2).all(|w| w[0].open_time < w[1].open_time));
    }

    #[test]
    fn test_indicator_bounds() {
        let rows = compute_features(&wave_candles(200), &FeatureConfig::default());

        assert!(rows.iter().all(|r| (0.0..=100.0).contains(&r.rsi)));
        assert!(rows.iter().all(|r| r.atr >= 0.0));
    }

    #[test]
    fn test_moving_averages_undefined_during_warmup() {
        let rows = compute_features(&wave_candles(60), &FeatureConfig::default());

        assert!(rows[20].ma_22.is_none());
        assert!(rows[21].ma_22.is_some());
        assert!(rows[48].ma_50.is_none());
        assert!(rows[49].ma_50.is_some());
        assert!(rows[10].mean_atr.is_none());
        assert!(rows[11].mean_atr.is_some());
    }

    #[test]
    fn test_extrema_tags_respect_edges() {
        let config = FeatureConfig::default();
        let rows = compute_features(&wave_candles(150), &config);
        let n = rows.len();

        assert!(rows.iter().any(|r| r.extrema == ExtremaTag::High));
        assert!(rows.iter().any(|r| r.extrema == ExtremaTag::Low));

        for (i, row) in rows.iter().enumerate() {
            if row.extrema != ExtremaTag::None {
                assert!(i >= config.extrema_order && i + config.extrema_order < n);
            }
            if row.big_extrema != BigExtremaTag::None {
                assert!(i >= config.big_extrema_order && i + config.big_extrema_order < n);
            }
        }
    }

    #[test]
    fn test_short_history_does_not_fail() {
        let rows = compute_features(&wave_candles(5), &FeatureConfig::default());
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.ma_22.is_none() && r.atr == 0.0 && r.rsi == 50.0));

        assert!(compute_features(&[], &FeatureConfig::default()).is_empty());
    }
}
