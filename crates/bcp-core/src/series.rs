// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::BcpError;
use crate::numeric::{mean, population_std, population_variance};
use std::ops::Range;
use std::sync::Arc;

/// Ordered, finite, immutable univariate series with positions `0..n-1`.
///
/// Cloning is cheap: clones share the same buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSeries {
    values: Arc<[f64]>,
}

impl ObservationSeries {
    /// Constructs a validated series. Every value must be finite.
    pub fn new(values: Vec<f64>) -> Result<Self, BcpError> {
        if let Some((idx, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(BcpError::numerical(format!(
                "observation series must be finite; index {idx} has {v}"
            )));
        }
        Ok(Self {
            values: Arc::from(values),
        })
    }

    pub fn from_slice(values: &[f64]) -> Result<Self, BcpError> {
        Self::new(values.to_vec())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, position: usize) -> Option<f64> {
        self.values.get(position).copied()
    }

    /// Integer time positions aligned with [`Self::values`].
    pub fn positions(&self) -> Range<usize> {
        0..self.values.len()
    }

    pub fn mean(&self) -> Option<f64> {
        mean(&self.values)
    }

    /// Population variance (`ddof = 0`).
    pub fn variance(&self) -> Option<f64> {
        population_variance(&self.values)
    }

    /// Population standard deviation (`ddof = 0`).
    pub fn std(&self) -> Option<f64> {
        population_std(&self.values)
    }

    /// True when every observation is bitwise-equal to the first one.
    ///
    /// Empty and single-point series count as constant.
    pub fn is_constant(&self) -> bool {
        match self.values.first() {
            None => true,
            Some(first) => self.values.iter().all(|v| v == first),
        }
    }

    /// Returns the suffix starting at `start`, re-indexed from zero.
    pub fn suffix(&self, start: usize) -> Result<Self, BcpError> {
        if start > self.values.len() {
            return Err(BcpError::configuration(format!(
                "suffix start {start} exceeds series length {}",
                self.values.len()
            )));
        }
        if start == 0 {
            return Ok(self.clone());
        }
        Ok(Self {
            values: Arc::from(&self.values[start..]),
        })
    }
}

impl TryFrom<Vec<f64>> for ObservationSeries {
    type Error = BcpError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl TryFrom<&[f64]> for ObservationSeries {
    type Error = BcpError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        Self::from_slice(values)
    }
}

#[cfg(test)]
mod tests {
    use super::ObservationSeries;
    use crate::BcpError;

    #[test]
    fn rejects_non_finite_values() {
        let err = ObservationSeries::new(vec![1.0, f64::NAN, 2.0])
            .expect_err("NaN should be rejected");
        assert!(matches!(err, BcpError::Numerical(_)));
        assert!(err.to_string().contains("index 1"));

        assert!(ObservationSeries::new(vec![f64::INFINITY]).is_err());
    }

    #[test]
    fn empty_series_is_allowed_and_constant() {
        let series = ObservationSeries::new(vec![]).expect("empty series is valid");
        assert!(series.is_empty());
        assert!(series.is_constant());
        assert!(series.mean().is_none());
        assert!(series.std().is_none());
    }

    #[test]
    fn positions_align_with_values() {
        let series = ObservationSeries::from_slice(&[3.0, 1.0, 2.0]).expect("valid");
        assert_eq!(series.positions(), 0..3);
        assert_eq!(series.get(2), Some(2.0));
        assert_eq!(series.get(3), None);
    }

    #[test]
    fn constant_detection_is_exact() {
        let constant = ObservationSeries::from_slice(&[0.1, 0.1, 0.1]).expect("valid");
        assert!(constant.is_constant());
        let varying = ObservationSeries::from_slice(&[0.1, 0.1, 0.1 + 1e-12]).expect("valid");
        assert!(!varying.is_constant());
    }

    #[test]
    fn suffix_reindexes_and_validates_bounds() {
        let series = ObservationSeries::from_slice(&[0.0, 1.0, 2.0, 3.0]).expect("valid");
        let tail = series.suffix(2).expect("in-bounds suffix");
        assert_eq!(tail.values(), &[2.0, 3.0]);
        assert_eq!(tail.positions(), 0..2);

        assert!(series.suffix(4).expect("empty suffix").is_empty());
        let err = series.suffix(5).expect_err("out of bounds");
        assert!(matches!(err, BcpError::Configuration(_)));
    }

    #[test]
    fn clones_share_storage() {
        let series = ObservationSeries::from_slice(&[1.0, 2.0]).expect("valid");
        let copy = series.clone();
        assert!(std::ptr::eq(series.values(), copy.values()));
    }
}
