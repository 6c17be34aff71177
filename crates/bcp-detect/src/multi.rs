// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, ExecutionContext, ObservationSeries, mix_seed};
use bcp_diagnostics::{RegimeComparison, regime_comparison};
use bcp_model::spec::MIN_SERIES_LEN;
use bcp_model::{ModelVariant, build};
use bcp_sampler::{PosteriorSampler, SamplerConfig};
use std::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_MAX_ITERATIONS: usize = 3;
pub const DEFAULT_MIN_SEGMENT_LENGTH: usize = 100;
pub const DEFAULT_SIGNIFICANCE_FRACTION: f64 = 0.1;

const DEFAULT_DRAWS: usize = 1_000;
const DEFAULT_TUNE: usize = 500;
const DEFAULT_CHAINS: usize = 2;
const DEFAULT_SEED: u64 = 42;

/// Configuration for [`MultiChangePointDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    pub max_iterations: usize,
    /// Remaining segments shorter than this are not searched.
    pub min_segment_length: usize,
    /// A split counts when the regime means differ by at least this
    /// fraction of the remaining segment's standard deviation.
    pub significance_fraction: f64,
    /// Per-iteration sampler settings; each iteration derives its own seed
    /// from `sampler.seed`.
    pub sampler: SamplerConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_segment_length: DEFAULT_MIN_SEGMENT_LENGTH,
            significance_fraction: DEFAULT_SIGNIFICANCE_FRACTION,
            sampler: SamplerConfig::new(DEFAULT_DRAWS, DEFAULT_TUNE, DEFAULT_CHAINS, DEFAULT_SEED),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        if self.min_segment_length < MIN_SERIES_LEN {
            return Err(BcpError::configuration(format!(
                "DetectorConfig.min_segment_length must be >= {MIN_SERIES_LEN}; got {}",
                self.min_segment_length
            )));
        }
        if !self.significance_fraction.is_finite() || self.significance_fraction < 0.0 {
            return Err(BcpError::configuration(format!(
                "DetectorConfig.significance_fraction must be finite and >= 0; got {}",
                self.significance_fraction
            )));
        }
        self.sampler.validate()
    }

    /// Sampler settings for 1-based `iteration`.
    pub fn iteration_sampler(&self, iteration: usize) -> SamplerConfig {
        SamplerConfig {
            seed: mix_seed(self.sampler.seed, iteration as u64),
            ..self.sampler.clone()
        }
    }
}

/// Fits a single change point to a segment and summarizes both sides.
pub trait ChangePointFitter {
    fn fit(
        &self,
        series: &ObservationSeries,
        sampler: &SamplerConfig,
        ctx: &ExecutionContext<'_>,
    ) -> Result<RegimeComparison, BcpError>;
}

/// Builds a mean-shift model, samples it, and compares the regimes.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanShiftFitter;

impl ChangePointFitter for MeanShiftFitter {
    fn fit(
        &self,
        series: &ObservationSeries,
        sampler: &SamplerConfig,
        ctx: &ExecutionContext<'_>,
    ) -> Result<RegimeComparison, BcpError> {
        let spec = build(series, ModelVariant::MeanShift)?;
        let trace = PosteriorSampler::new(sampler.clone())?.sample(&spec, ctx)?;
        regime_comparison(series, &trace)
    }
}

/// One accepted change point.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChangePointResult {
    /// 1-based.
    pub iteration: usize,
    /// Index within the segment searched in this iteration.
    pub change_point: usize,
    /// Index within the full series.
    pub absolute_change_point: usize,
    pub comparison: RegimeComparison,
}

/// Why the detection loop ended.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    MaxIterationsReached,
    SeriesTooShort,
    ChangeNotSignificant,
    /// The fitted change point was index 0, which would not advance the search.
    NoProgress,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionOutcome {
    pub results: Vec<ChangePointResult>,
    pub stop_reason: StopReason,
}

/// Repeatedly fits a single change point to the tail of the series that
/// follows the previous one.
#[derive(Clone, Debug)]
pub struct MultiChangePointDetector<F = MeanShiftFitter> {
    fitter: F,
    config: DetectorConfig,
}

impl MultiChangePointDetector<MeanShiftFitter> {
    pub fn new(config: DetectorConfig) -> Result<Self, BcpError> {
        Self::with_fitter(MeanShiftFitter, config)
    }
}

impl<F: ChangePointFitter> MultiChangePointDetector<F> {
    pub fn with_fitter(fitter: F, config: DetectorConfig) -> Result<Self, BcpError> {
        config.validate()?;
        Ok(Self { fitter, config })
    }

    pub fn fitter(&self) -> &F {
        &self.fitter
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn detect(
        &self,
        series: &ObservationSeries,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<ChangePointResult>, BcpError> {
        Ok(self.run(series, ctx)?.results)
    }

    pub fn run(
        &self,
        series: &ObservationSeries,
        ctx: &ExecutionContext<'_>,
    ) -> Result<DetectionOutcome, BcpError> {
        self.config.validate()?;
        let started_at = Instant::now();
        // Per-iteration sampling reports no progress of its own.
        let inner_ctx = ExecutionContext {
            progress: None,
            ..*ctx
        };

        let mut results: Vec<ChangePointResult> = vec![];
        let mut offset = 0usize;
        let mut remaining = series.clone();

        let stop_reason = loop {
            if results.len() >= self.config.max_iterations {
                break StopReason::MaxIterationsReached;
            }
            if remaining.len() < self.config.min_segment_length {
                break StopReason::SeriesTooShort;
            }

            let iteration = results.len() + 1;
            let sampler = self.config.iteration_sampler(iteration);
            let comparison = self.fitter.fit(&remaining, &sampler, &inner_ctx)?;

            let threshold = self.config.significance_fraction * remaining.std().unwrap_or(0.0);
            let difference = comparison.mean_difference().abs();
            let significant = !comparison.regime_1.is_empty()
                && !comparison.regime_2.is_empty()
                && difference >= threshold;
            debug!(
                iteration,
                offset,
                segment_len = remaining.len(),
                change_point = comparison.change_point,
                difference,
                threshold,
                significant,
                "detector iteration"
            );
            if !significant {
                break StopReason::ChangeNotSignificant;
            }

            let change_point = comparison.change_point;
            if change_point == 0 {
                break StopReason::NoProgress;
            }

            results.push(ChangePointResult {
                iteration,
                change_point,
                absolute_change_point: offset + change_point,
                comparison,
            });
            if self.config.max_iterations > 0 {
                ctx.report_progress(iteration as f32 / self.config.max_iterations as f32);
            }

            offset += change_point;
            remaining = remaining.suffix(change_point)?;
        };

        ctx.report_progress(1.0);
        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        ctx.record_scalar("detector.change_points", results.len() as f64);
        info!(
            n = series.len(),
            change_points = results.len(),
            stop_reason = ?stop_reason,
            runtime_ms,
            "change-point detection finished"
        );

        Ok(DetectionOutcome {
            results,
            stop_reason,
        })
    }
}

/// Detects up to `max_iterations` mean shifts with default sampler settings.
pub fn detect(
    series: &ObservationSeries,
    max_iterations: usize,
    min_segment_length: usize,
    significance_fraction: f64,
) -> Result<Vec<ChangePointResult>, BcpError> {
    let config = DetectorConfig {
        max_iterations,
        min_segment_length,
        significance_fraction,
        ..DetectorConfig::default()
    };
    MultiChangePointDetector::new(config)?.detect(series, &ExecutionContext::new())
}
