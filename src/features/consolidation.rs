//! Low-volatility (consolidation) detection
//!
//! Every trailing window whose coefficient of variation is at or below the
//! threshold marks all of its rows as consolidated. Windows are applied in
//! index order over the same output, so a quiet window can flag earlier rows
//! that were not quiet on their own.

use statrs::statistics::Statistics;

/// Mark `[start, end)` as consolidated
fn mark_range(flags: &mut [bool], start: usize, end: usize) {
    for flag in &mut flags[start..end] {
        *flag = true;
    }
}

/// Consolidation flags for `close` using a trailing `window` and a
/// std/mean `threshold`
pub fn detect_consolidation(close: &[f64], window: usize, threshold: f64) -> Vec<bool> {
    let mut flags = vec![false; close.len()];
    if window == 0 {
        return flags;
    }

    for i in 0..close.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &close[start..=i];

        // Sample std of a single point is undefined
        if slice.len() < 2 {
            continue;
        }

        let mean = slice.iter().mean();
        if mean == 0.0 {
            continue;
        }
        let ratio = slice.iter().std_dev() / mean;

        if ratio.is_finite() && ratio <= threshold {
            mark_range(&mut flags, start, i + 1);
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_window_marks_every_row() {
        let mut close: Vec<f64> = (0..20).map(|i| 100.0 + (i % 2) as f64 * 5.0).collect();
        close.extend(vec![100.0; 12]);

        let flags = detect_consolidation(&close, 12, 0.003);

        // The 12 flat rows form a qualifying window
        assert!(flags[20..].iter().all(|f| *f));
        // The choppy prefix never qualifies
        assert!(flags[..20].iter().all(|f| !f));
    }

    #[test]
    fn test_window_flags_are_never_cleared() {
        let mut close = vec![100.0; 12];
        close.extend((0..12).map(|i| 100.0 + i as f64 * 10.0));

        let flags = detect_consolidation(&close, 12, 0.003);
        assert!(flags[..12].iter().all(|f| *f));
        assert!(!flags[23]);
    }

    #[test]
    fn test_short_prefix_windows() {
        // Two identical closes already form a zero-variance window
        let flags = detect_consolidation(&[50.0, 50.0, 80.0], 12, 0.003);
        assert_eq!(flags, vec![true, true, false]);

        assert_eq!(detect_consolidation(&[50.0], 12, 0.003), vec![false]);
    }
}
