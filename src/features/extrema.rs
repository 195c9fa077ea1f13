//! Local extrema detection
//!
//! A point is a local maximum (minimum) when it is strictly greater (lesser)
//! than every other point within `order` positions on both sides. Points
//! without a full neighborhood on both sides are never classified, so the
//! last `order` rows of a series stay provisional until more data arrives.

/// Indices of local maxima and minima
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extrema {
    pub maxima: Vec<usize>,
    pub minima: Vec<usize>,
}

impl Extrema {
    pub fn is_max(&self, index: usize) -> bool {
        self.maxima.binary_search(&index).is_ok()
    }

    pub fn is_min(&self, index: usize) -> bool {
        self.minima.binary_search(&index).is_ok()
    }
}

/// Find local maxima and minima of `values` with neighborhood half-width `order`
///
/// Both index lists are ascending.
pub fn find_extrema(values: &[f64], order: usize) -> Extrema {
    let mut extrema = Extrema::default();
    if order == 0 || values.len() < 2 * order + 1 {
        return extrema;
    }

    for i in order..values.len() - order {
        let center = values[i];
        let neighbors = values[i - order..i]
            .iter()
            .chain(&values[i + 1..=i + order]);

        let (mut is_max, mut is_min) = (true, true);
        for &v in neighbors {
            is_max &= center > v;
            is_min &= center < v;
            if !is_max && !is_min {
                break;
            }
        }

        if is_max {
            extrema.maxima.push(i);
        } else if is_min {
            extrema.minima.push(i);
        }
    }

    extrema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_peak_and_trough() {
        let values = vec![1.0, 2.0, 3.0, 2.0, 1.0, 0.0, 1.0, 2.0, 3.0];
        let extrema = find_extrema(&values, 2);

        assert_eq!(extrema.maxima, vec![2]);
        assert_eq!(extrema.minima, vec![5]);
        assert!(extrema.is_max(2));
        assert!(extrema.is_min(5));
        assert!(!extrema.is_max(5));
    }

    #[test]
    fn test_plateau_is_not_extremum() {
        let values = vec![1.0, 2.0, 3.0, 3.0, 2.0, 1.0];
        let extrema = find_extrema(&values, 1);
        assert!(extrema.maxima.is_empty());
    }

    #[test]
    fn test_edges_never_classified() {
        // Global maxima sit on both edges
        let values: Vec<f64> = (0..20)
            .map(|i| ((i as f64) * 0.7).sin() * 10.0 + if i == 0 || i == 19 { 100.0 } else { 0.0 })
            .collect();

        for order in [1usize, 3, 5] {
            let extrema = find_extrema(&values, order);
            for idx in extrema.maxima.iter().chain(&extrema.minima) {
                assert!(*idx >= order, "index {} within {} of start", idx, order);
                assert!(
                    *idx + order < values.len(),
                    "index {} within {} of end",
                    idx,
                    order
                );
            }
        }
    }

    #[test]
    fn test_series_shorter_than_neighborhood() {
        let extrema = find_extrema(&[1.0, 5.0, 1.0], 5);
        assert_eq!(extrema, Extrema::default());
    }
}
