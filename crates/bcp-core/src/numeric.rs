// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::BcpError;

/// Neumaier-compensated running sum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut acc = CompensatedSum::new();
    for &v in values {
        acc.add(v);
    }
    Some(acc.value() / values.len() as f64)
}

/// Population variance (`ddof = 0`), computed in two passes.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let center = mean(values)?;
    let mut acc = CompensatedSum::new();
    for &v in values {
        let delta = v - center;
        acc.add(delta * delta);
    }
    Some((acc.value() / values.len() as f64).max(0.0))
}

/// Population standard deviation (`ddof = 0`).
pub fn population_std(values: &[f64]) -> Option<f64> {
    population_variance(values).map(f64::sqrt)
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is expressed in percent (`0.0..=100.0`). Matches numpy's default
/// `linear` method: the rank is `q/100 * (len - 1)`.
pub fn percentile(values: &[f64], q: f64) -> Result<f64, BcpError> {
    if values.is_empty() {
        return Err(BcpError::precondition(
            "percentile requires at least one sample",
        ));
    }
    if !q.is_finite() || !(0.0..=100.0).contains(&q) {
        return Err(BcpError::configuration(format!(
            "percentile q must be finite and in [0, 100]; got {q}"
        )));
    }
    if let Some((idx, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(BcpError::numerical(format!(
            "percentile input must be finite; index {idx} has {v}"
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Ok(sorted[lower]);
    }
    let weight = rank - lower as f64;
    let (lo, hi) = (sorted[lower], sorted[upper]);
    Ok((lo + (hi - lo) * weight).clamp(lo, hi))
}

/// Prefix sums of `x - center` and `(x - center)^2`, each of length `len + 1`.
///
/// Centering before accumulation keeps segment sums of squares accurate for
/// series with a large level relative to their spread (price levels).
pub fn prefix_sums_centered(values: &[f64], center: f64) -> (Vec<f64>, Vec<f64>) {
    let mut sums = Vec::with_capacity(values.len() + 1);
    let mut sums_sq = Vec::with_capacity(values.len() + 1);
    sums.push(0.0);
    sums_sq.push(0.0);

    let mut acc = CompensatedSum::new();
    let mut acc_sq = CompensatedSum::new();
    for &v in values {
        let delta = v - center;
        acc.add(delta);
        acc_sq.add(delta * delta);
        sums.push(acc.value());
        sums_sq.push(acc_sq.value());
    }

    (sums, sums_sq)
}
