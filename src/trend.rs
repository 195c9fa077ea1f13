//! Trend and flag classification
//!
//! The trend compares the previous close against the most recently tagged
//! fine-scale swing high and swing low anywhere in the retained history. The
//! flag looks at breakouts from a consolidation range that is still active on
//! the last row.

use tracing::{debug, info};

use crate::types::{ExtremaTag, FeatureRow, Flag, Trend, TrendState};

/// Classify the trend and flag for a feature sequence
///
/// Fewer than two rows, or a history without any tagged extrema, yields
/// [`Trend::Unknown`]. This never fails.
pub fn classify(rows: &[FeatureRow]) -> TrendState {
    if rows.len() < 2 {
        debug!(rows = rows.len(), "Not enough rows to classify trend");
        return TrendState::unknown();
    }

    // Single left-to-right pass: later tags overwrite earlier ones
    let mut last_high = None;
    let mut last_low = None;
    for row in rows {
        match row.extrema {
            ExtremaTag::High => last_high = Some(row.close),
            ExtremaTag::Low => last_low = Some(row.close),
            ExtremaTag::None => {}
        }
    }

    let previous_close = rows[rows.len() - 2].close;
    let trend = classify_trend(previous_close, last_high, last_low);
    let flag = classify_flag(rows, previous_close);

    TrendState {
        trend,
        flag,
        last_high,
        last_low,
        previous_close: Some(previous_close),
    }
}

fn classify_trend(previous_close: f64, last_high: Option<f64>, last_low: Option<f64>) -> Trend {
    if last_high.is_none() && last_low.is_none() {
        return Trend::Unknown;
    }

    match (last_high, last_low) {
        (Some(high), _) if previous_close > high => Trend::Uptrend,
        (_, Some(low)) if previous_close < low => Trend::Downtrend,
        _ => Trend::Equilibrium,
    }
}

fn classify_flag(rows: &[FeatureRow], previous_close: f64) -> Flag {
    let in_consolidation = rows.last().is_some_and(|r| r.consolidated);
    if !in_consolidation {
        return Flag::None;
    }

    let Some(reference) = rows.iter().rev().find(|r| !r.consolidated) else {
        info!("Flag undetermined: no non-consolidated row in history");
        return Flag::None;
    };

    if previous_close > reference.close {
        Flag::BullFlag
    } else if previous_close < reference.close {
        Flag::BearFlag
    } else {
        Flag::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::{Duration, TimeZone, Utc};

    fn row(i: i64, close: f64, extrema: ExtremaTag, consolidated: bool) -> FeatureRow {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candle = Candle::new(
            start + Duration::hours(i),
            close,
            close + 1.0,
            close - 1.0,
            close,
            10.0,
        )
        .unwrap();
        let mut row = FeatureRow::from_candle(&candle);
        row.extrema = extrema;
        row.consolidated = consolidated;
        row
    }

    fn swing_history(previous_close: f64) -> Vec<FeatureRow> {
        vec![
            row(0, 90.0, ExtremaTag::None, false),
            row(1, 100.0, ExtremaTag::High, false),
            row(2, 70.0, ExtremaTag::None, false),
            row(3, 50.0, ExtremaTag::Low, false),
            row(4, previous_close, ExtremaTag::None, false),
            row(5, 60.0, ExtremaTag::None, false),
        ]
    }

    #[test]
    fn test_trend_against_last_swings() {
        assert_eq!(classify(&swing_history(120.0)).trend, Trend::Uptrend);
        assert_eq!(classify(&swing_history(40.0)).trend, Trend::Downtrend);
        assert_eq!(classify(&swing_history(75.0)).trend, Trend::Equilibrium);
    }

    #[test]
    fn test_most_recent_tag_wins() {
        let mut rows = swing_history(105.0);
        rows.insert(0, row(-1, 200.0, ExtremaTag::High, false));

        let state = classify(&rows);
        assert_eq!(state.last_high, Some(100.0));
        assert_eq!(state.last_low, Some(50.0));
        assert_eq!(state.trend, Trend::Uptrend);
    }

    #[test]
    fn test_unknown_without_extrema() {
        let rows = vec![
            row(0, 10.0, ExtremaTag::None, false),
            row(1, 11.0, ExtremaTag::None, false),
        ];
        assert_eq!(classify(&rows).trend, Trend::Unknown);
        assert_eq!(classify(&rows[..1]), TrendState::unknown());
    }

    #[test]
    fn test_flag_breakout_direction() {
        let mut rows = vec![
            row(0, 100.0, ExtremaTag::None, false),
            row(1, 103.0, ExtremaTag::None, true),
            row(2, 103.0, ExtremaTag::None, true),
        ];
        assert_eq!(classify(&rows).flag, Flag::BullFlag);

        rows[1].close = 97.0;
        assert_eq!(classify(&rows).flag, Flag::BearFlag);

        rows[1].close = 100.0;
        assert_eq!(classify(&rows).flag, Flag::None);
    }

    #[test]
    fn test_flag_requires_active_consolidation() {
        let rows = vec![
            row(0, 100.0, ExtremaTag::None, true),
            row(1, 110.0, ExtremaTag::None, true),
            row(2, 110.0, ExtremaTag::None, false),
        ];
        assert_eq!(classify(&rows).flag, Flag::None);
    }

    #[test]
    fn test_flag_undetermined_when_fully_consolidated() {
        let rows = vec![
            row(0, 100.0, ExtremaTag::None, true),
            row(1, 110.0, ExtremaTag::None, true),
        ];
        assert_eq!(classify(&rows).flag, Flag::None);
    }
}
