// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, ObservationSeries, prefix_sums_centered};

/// Centered moments of one contiguous segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentStats {
    pub count: usize,
    /// `sum(x - center)` over the segment.
    pub sum: f64,
    /// `sum((x - center)^2)` over the segment.
    pub sum_sq: f64,
    pub center: f64,
}

impl SegmentStats {
    /// `sum((x - mu)^2)` over the segment.
    pub fn sse(&self, mu: f64) -> f64 {
        let d = mu - self.center;
        (self.sum_sq - 2.0 * d * self.sum + self.count as f64 * d * d).max(0.0)
    }

    /// Derivative of [`Self::sse`] with respect to `mu`.
    pub fn d_sse(&self, mu: f64) -> f64 {
        let d = mu - self.center;
        2.0 * (self.count as f64 * d - self.sum)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.center + self.sum / self.count as f64)
    }
}

/// Prefix-stat cache for O(1) segment-moment queries.
#[derive(Clone, Debug, PartialEq)]
pub struct SufficientStats {
    center: f64,
    prefix_sum: Vec<f64>,
    prefix_sum_sq: Vec<f64>,
    n: usize,
}

impl SufficientStats {
    pub fn precompute(series: &ObservationSeries) -> Result<Self, BcpError> {
        let center = series
            .mean()
            .ok_or_else(|| BcpError::numerical("cannot precompute statistics of an empty series"))?;
        let (prefix_sum, prefix_sum_sq) = prefix_sums_centered(series.values(), center);
        if let Some(bad) = prefix_sum_sq.iter().find(|v| !v.is_finite()) {
            return Err(BcpError::numerical(format!(
                "non-finite prefix sum of squares while precomputing statistics: {bad}"
            )));
        }
        Ok(Self {
            center,
            prefix_sum,
            prefix_sum_sq,
            n: series.len(),
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    /// Moments over `[start, end)`. Callers guarantee `start <= end <= n`.
    pub fn segment(&self, start: usize, end: usize) -> SegmentStats {
        debug_assert!(start <= end && end <= self.n);
        SegmentStats {
            count: end - start,
            sum: self.prefix_sum[end] - self.prefix_sum[start],
            sum_sq: (self.prefix_sum_sq[end] - self.prefix_sum_sq[start]).max(0.0),
            center: self.center,
        }
    }

    /// Segments of both regimes for change index `tau`.
    ///
    /// Position `i` belongs to regime 1 when `tau >= i`, so regime 1 is
    /// `[0, tau]` and regime 2 is `[tau + 1, n)`.
    pub fn regimes(&self, tau: usize) -> (SegmentStats, SegmentStats) {
        let split = (tau + 1).min(self.n);
        (self.segment(0, split), self.segment(split, self.n))
    }

    pub(crate) fn is_consistent_with(&self, series: &ObservationSeries) -> bool {
        self.n == series.len()
            && self.prefix_sum.len() == self.n + 1
            && self.prefix_sum_sq.len() == self.n + 1
    }
}

#[cfg(test)]
mod tests {
    use super::SufficientStats;
    use approx::assert_relative_eq;
    use bcp_core::ObservationSeries;
    use proptest::prelude::*;

    fn series(values: &[f64]) -> ObservationSeries {
        ObservationSeries::from_slice(values).expect("test series should be valid")
    }

    #[test]
    fn regimes_follow_tau_inclusive_boundary() {
        let stats = SufficientStats::precompute(&series(&[1.0, 2.0, 3.0, 4.0, 5.0]))
            .expect("precompute should succeed");

        let (left, right) = stats.regimes(1);
        assert_eq!(left.count, 2);
        assert_eq!(right.count, 3);
        assert_relative_eq!(left.mean().expect("non-empty"), 1.5, epsilon = 1e-12);
        assert_relative_eq!(right.mean().expect("non-empty"), 4.0, epsilon = 1e-12);

        let (all, none) = stats.regimes(4);
        assert_eq!(all.count, 5);
        assert_eq!(none.count, 0);
        assert!(none.mean().is_none());
        assert_eq!(none.sse(3.0), 0.0);
    }

    #[test]
    fn sse_matches_direct_computation_at_price_scale() {
        let values = [101.3, 99.8, 100.4, 100.1, 98.7, 102.2];
        let stats = SufficientStats::precompute(&series(&values)).expect("precompute");
        let seg = stats.segment(1, 5);
        for mu in [0.0, 50.0, 100.0, 100.2] {
            let direct: f64 = values[1..5].iter().map(|v| (v - mu).powi(2)).sum();
            assert_relative_eq!(seg.sse(mu), direct, max_relative = 1e-10);
        }
    }

    #[test]
    fn d_sse_matches_finite_difference() {
        let stats = SufficientStats::precompute(&series(&[0.3, -1.2, 2.5, 0.9])).expect("ok");
        let seg = stats.segment(0, 4);
        let mu = 0.4;
        let h = 1e-6;
        let numeric = (seg.sse(mu + h) - seg.sse(mu - h)) / (2.0 * h);
        assert_relative_eq!(seg.d_sse(mu), numeric, epsilon = 1e-6);
    }

    #[test]
    fn empty_series_cannot_be_precomputed() {
        let empty = ObservationSeries::new(vec![]).expect("empty series is valid");
        assert!(SufficientStats::precompute(&empty).is_err());
    }

    proptest! {
        #[test]
        fn segment_moments_match_direct_sums(
            values in prop::collection::vec(-1.0e3f64..1.0e3, 2..64),
            a in 0usize..64,
            b in 0usize..64,
            mu in -1.0e3f64..1.0e3,
        ) {
            let n = values.len();
            let (start, end) = (a.min(b) % (n + 1), a.max(b) % (n + 1));
            let (start, end) = (start.min(end), start.max(end));
            let stats = SufficientStats::precompute(&series(&values)).expect("precompute");
            let seg = stats.segment(start, end);
            let slice = &values[start..end];

            prop_assert_eq!(seg.count, slice.len());
            let direct: f64 = slice.iter().map(|v| (v - mu).powi(2)).sum();
            let tolerance = 1e-9 * (1.0 + direct) + 1e-6;
            prop_assert!((seg.sse(mu) - direct).abs() <= tolerance, "{} vs {}", seg.sse(mu), direct);
        }
    }
}
