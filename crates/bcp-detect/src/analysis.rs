// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, ExecutionContext, ObservationSeries};
use bcp_diagnostics::{
    ConvergenceDiagnostics, ConvergenceReport, ParameterPosterior, RegimeComparison,
    change_point_posterior, parameter_posteriors, regime_comparison,
};
use bcp_model::{ChangePointModelBuilder, ModelSpec, ModelVariant};
use bcp_sampler::{PosteriorSampler, SamplerConfig, Trace};

/// Build, sample, and summarize one series step by step.
///
/// Calls must follow the order model, then trace, then summaries; any
/// out-of-order call is a [`BcpError::Precondition`]. Building a new model
/// discards the previous trace.
#[derive(Clone, Debug)]
pub struct ChangePointAnalysis {
    series: ObservationSeries,
    builder: ChangePointModelBuilder,
    diagnostics: ConvergenceDiagnostics,
    model: Option<ModelSpec>,
    trace: Option<Trace>,
}

impl ChangePointAnalysis {
    pub fn new(series: ObservationSeries) -> Self {
        Self {
            series,
            builder: ChangePointModelBuilder::new(),
            diagnostics: ConvergenceDiagnostics::default(),
            model: None,
            trace: None,
        }
    }

    pub fn from_values(values: Vec<f64>) -> Result<Self, BcpError> {
        Ok(Self::new(ObservationSeries::new(values)?))
    }

    pub fn with_builder(mut self, builder: ChangePointModelBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: ConvergenceDiagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn series(&self) -> &ObservationSeries {
        &self.series
    }

    pub fn model(&self) -> Option<&ModelSpec> {
        self.model.as_ref()
    }

    pub fn build_model(&mut self, variant: ModelVariant) -> Result<&ModelSpec, BcpError> {
        self.model = None;
        self.trace = None;
        let spec = self.builder.build(&self.series, variant)?;
        Ok(&*self.model.insert(spec))
    }

    pub fn build_model_named(&mut self, variant: &str) -> Result<&ModelSpec, BcpError> {
        self.model = None;
        self.trace = None;
        let variant: ModelVariant = variant.parse()?;
        self.build_model(variant)
    }

    pub fn sample(&mut self, config: &SamplerConfig) -> Result<&Trace, BcpError> {
        self.sample_with_context(config, &ExecutionContext::new())
    }

    pub fn sample_with_context(
        &mut self,
        config: &SamplerConfig,
        ctx: &ExecutionContext<'_>,
    ) -> Result<&Trace, BcpError> {
        let Some(spec) = self.model.as_ref() else {
            return Err(BcpError::precondition(
                "model must be built before sampling",
            ));
        };
        let trace = PosteriorSampler::new(config.clone())?.sample(spec, ctx)?;
        Ok(&*self.trace.insert(trace))
    }

    pub fn trace(&self) -> Result<&Trace, BcpError> {
        self.trace
            .as_ref()
            .ok_or_else(|| BcpError::precondition("model must be sampled first"))
    }

    pub fn check_convergence(&self) -> Result<ConvergenceReport, BcpError> {
        self.diagnostics.compute(self.trace()?)
    }

    pub fn change_point_posterior(&self) -> Result<Vec<usize>, BcpError> {
        Ok(change_point_posterior(self.trace()?))
    }

    pub fn parameter_posteriors(&self) -> Result<Vec<ParameterPosterior>, BcpError> {
        parameter_posteriors(self.trace()?)
    }

    pub fn compare_regimes(&self) -> Result<RegimeComparison, BcpError> {
        regime_comparison(&self.series, self.trace()?)
    }
}
