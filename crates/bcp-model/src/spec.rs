// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::priors::Priors;
use crate::stats::SufficientStats;
use crate::variant::ModelVariant;
use bcp_core::{BcpError, ObservationSeries};
use std::ops::Range;
use tracing::debug;

/// Minimum series length with a well-defined likelihood.
pub const MIN_SERIES_LEN: usize = 2;

/// Fully specified change-point model over one series.
///
/// Immutable once built. Holds the prefix-stat cache used for O(1)
/// likelihood evaluation at any change index.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    variant: ModelVariant,
    series: ObservationSeries,
    priors: Priors,
    stats: SufficientStats,
    data_std: f64,
}

impl ModelSpec {
    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn series(&self) -> &ObservationSeries {
        &self.series
    }

    pub fn priors(&self) -> &Priors {
        &self.priors
    }

    pub fn stats(&self) -> &SufficientStats {
        &self.stats
    }

    pub fn n(&self) -> usize {
        self.series.len()
    }

    /// Population standard deviation of the observed series.
    pub fn data_std(&self) -> f64 {
        self.data_std
    }

    pub fn parameter_names(&self) -> &'static [&'static str] {
        self.variant.parameter_names()
    }

    /// Structural check run by the sampler before any chain starts.
    pub fn validate(&self) -> Result<(), BcpError> {
        if self.series.len() < MIN_SERIES_LEN {
            return Err(BcpError::precondition(format!(
                "model spec covers {} observations; at least {MIN_SERIES_LEN} are required",
                self.series.len()
            )));
        }
        if !self.stats.is_consistent_with(&self.series) {
            return Err(BcpError::precondition(
                "model spec statistics do not match its series",
            ));
        }
        if !(self.data_std.is_finite() && self.data_std > 0.0) {
            return Err(BcpError::precondition(format!(
                "model spec data scale must be finite and > 0; got {}",
                self.data_std
            )));
        }
        self.priors.validate()
    }
}

/// Builds [`ModelSpec`] values with the standard priors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChangePointModelBuilder {
    priors: Priors,
}

impl ChangePointModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(
        &self,
        series: &ObservationSeries,
        variant: ModelVariant,
    ) -> Result<ModelSpec, BcpError> {
        let n = series.len();
        if n < MIN_SERIES_LEN {
            return Err(BcpError::numerical(format!(
                "change-point model requires at least {MIN_SERIES_LEN} observations; got {n}"
            )));
        }
        if series.is_constant() {
            return Err(BcpError::numerical(format!(
                "change-point model requires non-zero variance; series of length {n} is constant"
            )));
        }

        let data_std = series
            .std()
            .filter(|s| s.is_finite() && *s > 0.0)
            .ok_or_else(|| {
                BcpError::numerical("series standard deviation is zero or non-finite")
            })?;

        self.priors.validate()?;
        let stats = SufficientStats::precompute(series)?;

        debug!(
            variant = variant.as_str(),
            n,
            data_std,
            "built change-point model"
        );

        Ok(ModelSpec {
            variant,
            series: series.clone(),
            priors: self.priors,
            stats,
            data_std,
        })
    }

    /// Builds from a variant name; unknown names are a configuration error.
    pub fn build_named(
        &self,
        series: &ObservationSeries,
        variant: &str,
    ) -> Result<ModelSpec, BcpError> {
        let variant: ModelVariant = variant.parse()?;
        self.build(series, variant)
    }
}

/// Builds a model with the standard priors.
pub fn build(series: &ObservationSeries, variant: ModelVariant) -> Result<ModelSpec, BcpError> {
    ChangePointModelBuilder::new().build(series, variant)
}

/// Builds a model from a variant name (`"mean_shift"` or `"volatility_shift"`).
pub fn build_named(series: &ObservationSeries, variant: &str) -> Result<ModelSpec, BcpError> {
    ChangePointModelBuilder::new().build_named(series, variant)
}

/// Index ranges of both regimes for change index `tau` in a series of length `n`.
///
/// Regime 1 holds every position `i` with `tau >= i`, i.e. `0..=tau`; the
/// first post-break position is `tau + 1`.
pub fn regime_bounds(n: usize, tau: usize) -> (Range<usize>, Range<usize>) {
    let split = tau.saturating_add(1).min(n);
    (0..split, split..n)
}

#[cfg(test)]
mod tests {
    use super::{ChangePointModelBuilder, build, build_named, regime_bounds};
    use crate::ModelVariant;
    use bcp_core::{BcpError, ObservationSeries};

    fn series(values: &[f64]) -> ObservationSeries {
        ObservationSeries::from_slice(values).expect("test series should be valid")
    }

    #[test]
    fn builds_both_variants() {
        let data = series(&[0.1, -0.4, 0.3, 5.2, 4.9, 5.1]);
        for variant in ModelVariant::ALL {
            let spec = build(&data, variant).expect("build should succeed");
            assert_eq!(spec.variant(), variant);
            assert_eq!(spec.n(), 6);
            assert!(spec.validate().is_ok());
            assert_eq!(spec.parameter_names()[0], "tau");
        }
    }

    #[test]
    fn constant_series_is_numerical_error() {
        let err = build(&series(&[3.0; 10]), ModelVariant::MeanShift)
            .expect_err("constant series must fail");
        assert!(matches!(err, BcpError::Numerical(_)));
    }

    #[test]
    fn too_short_series_is_numerical_error() {
        for values in [&[][..], &[1.0][..]] {
            let err = build(&series(values), ModelVariant::VolatilityShift)
                .expect_err("short series must fail");
            assert!(matches!(err, BcpError::Numerical(_)));
        }
    }

    #[test]
    fn unknown_variant_name_is_configuration_error() {
        let err = build_named(&series(&[0.0, 1.0]), "level_shift")
            .expect_err("unknown variant must fail");
        assert!(matches!(err, BcpError::Configuration(_)));

        let spec = ChangePointModelBuilder::new()
            .build_named(&series(&[0.0, 1.0]), "volatility_shift")
            .expect("known variant");
        assert_eq!(spec.variant(), ModelVariant::VolatilityShift);
    }

    #[test]
    fn spec_shares_series_storage() {
        let data = series(&[1.0, 2.0, 4.0]);
        let spec = build(&data, ModelVariant::MeanShift).expect("build");
        assert!(std::ptr::eq(spec.series().values(), data.values()));
    }

    #[test]
    fn regime_bounds_include_tau_in_first_regime() {
        assert_eq!(regime_bounds(10, 0), (0..1, 1..10));
        assert_eq!(regime_bounds(10, 4), (0..5, 5..10));
        assert_eq!(regime_bounds(10, 9), (0..10, 10..10));
    }
}
