// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, ObservationSeries, mean, percentile, population_std};
use bcp_model::regime_bounds;
use bcp_model::variant::TAU;
use bcp_sampler::Trace;

const INTERVAL_LOW_Q: f64 = 2.5;
const INTERVAL_HIGH_Q: f64 = 97.5;

/// Flattened posterior draws of one parameter.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterPosterior {
    pub name: String,
    pub samples: Vec<f64>,
}

/// Location and spread of one side of a split series.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegimeStats {
    /// `NaN` when the regime is empty.
    pub mean: f64,
    /// Population standard deviation; `NaN` when the regime is empty.
    pub std: f64,
    pub count: usize,
}

impl RegimeStats {
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            mean: mean(values).unwrap_or(f64::NAN),
            std: population_std(values).unwrap_or(f64::NAN),
            count: values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Posterior interval of the change index. Serialized as a `[low, high]` pair.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "[f64; 2]", into = "[f64; 2]"))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CredibleInterval {
    pub low: f64,
    pub high: f64,
}

impl CredibleInterval {
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

impl From<[f64; 2]> for CredibleInterval {
    fn from([low, high]: [f64; 2]) -> Self {
        Self { low, high }
    }
}

impl From<CredibleInterval> for [f64; 2] {
    fn from(interval: CredibleInterval) -> Self {
        [interval.low, interval.high]
    }
}

/// Before/after summary at the posterior point estimate of the change index.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegimeComparison {
    /// Last index of the first regime.
    pub change_point: usize,
    pub regime_1: RegimeStats,
    pub regime_2: RegimeStats,
    pub change_point_credible_interval: CredibleInterval,
}

impl RegimeComparison {
    /// `regime_2.mean - regime_1.mean`; `NaN` if either side is empty.
    pub fn mean_difference(&self) -> f64 {
        self.regime_2.mean - self.regime_1.mean
    }
}

/// Chain-major concatenation of one parameter's draws.
pub fn flatten(trace: &Trace, name: &str) -> Result<Vec<f64>, BcpError> {
    Ok(trace.parameter_chains(name)?.concat())
}

/// Change-index draws of every chain, chain-major.
pub fn change_point_posterior(trace: &Trace) -> Vec<usize> {
    trace
        .chains()
        .iter()
        .flat_map(|chain| chain.iter().map(|s| s.tau))
        .collect()
}

/// Flattened draws of every parameter, change index first.
pub fn parameter_posteriors(trace: &Trace) -> Result<Vec<ParameterPosterior>, BcpError> {
    trace
        .parameter_names()
        .iter()
        .map(|&name| {
            Ok(ParameterPosterior {
                name: name.to_string(),
                samples: flatten(trace, name)?,
            })
        })
        .collect()
}

/// Splits `series` at the rounded posterior mean of the change index and
/// summarizes both sides.
///
/// The first regime covers indices `0..=change_point`. The 95% interval is
/// widened where needed so that it always contains `change_point`.
pub fn regime_comparison(
    series: &ObservationSeries,
    trace: &Trace,
) -> Result<RegimeComparison, BcpError> {
    let n = series.len();
    if trace.series_len() != n {
        return Err(BcpError::precondition(format!(
            "trace was sampled on a series of length {}, got a series of length {n}",
            trace.series_len()
        )));
    }

    let taus = flatten(trace, TAU)?;
    let tau_mean = mean(&taus)
        .ok_or_else(|| BcpError::precondition("trace holds no change-index draws"))?;
    let change_point = (tau_mean.round() as usize).min(n.saturating_sub(1));

    let (first, second) = regime_bounds(n, change_point);
    let values = series.values();
    let regime_1 = RegimeStats::from_values(&values[first]);
    let regime_2 = RegimeStats::from_values(&values[second]);

    let point = change_point as f64;
    let change_point_credible_interval = CredibleInterval {
        low: percentile(&taus, INTERVAL_LOW_Q)?.min(point),
        high: percentile(&taus, INTERVAL_HIGH_Q)?.max(point),
    };

    Ok(RegimeComparison {
        change_point,
        regime_1,
        regime_2,
        change_point_credible_interval,
    })
}
