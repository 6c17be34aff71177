// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::gibbs::{BlockedGibbs, ChainState};
use crate::hmc::{GRADIENT_BASED_TAG, Hmc, HmcConfig, Phase};
use crate::metropolis::{METROPOLIS_INTEGER_TAG, MetropolisInteger, TauProposalConfig};
use crate::rng::{ChainRng, chain_seed};
use crate::trace::{ChainStats, Trace};
use bcp_core::{BcpError, Diagnostics, ExecutionContext};
use bcp_model::{CONTINUOUS_DIM, ChangePointTarget, ModelSpec, PosteriorSample};
use rand::{Rng, SeedableRng};
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const DEFAULT_DRAWS: usize = 2_000;
const DEFAULT_TUNE: usize = 1_000;
const DEFAULT_CHAINS: usize = 4;
const DEFAULT_SEED: u64 = 42;
const LOW_TAU_ACCEPTANCE: f64 = 0.01;

/// Configuration for [`PosteriorSampler`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerConfig {
    /// Retained draws per chain.
    pub draws: usize,
    /// Discarded warmup steps per chain, during which the HMC kernel adapts.
    pub tune: usize,
    pub chains: usize,
    pub seed: u64,
    pub hmc: HmcConfig,
    pub tau_proposal: TauProposalConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            draws: DEFAULT_DRAWS,
            tune: DEFAULT_TUNE,
            chains: DEFAULT_CHAINS,
            seed: DEFAULT_SEED,
            hmc: HmcConfig::default(),
            tau_proposal: TauProposalConfig::default(),
        }
    }
}

impl SamplerConfig {
    pub fn new(draws: usize, tune: usize, chains: usize, seed: u64) -> Self {
        Self {
            draws,
            tune,
            chains,
            seed,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), BcpError> {
        if self.draws == 0 {
            return Err(BcpError::configuration(
                "SamplerConfig.draws must be >= 1; got 0",
            ));
        }
        if self.chains == 0 {
            return Err(BcpError::configuration(
                "SamplerConfig.chains must be >= 1; got 0",
            ));
        }
        self.hmc.validate()?;
        self.tau_proposal.validate()
    }
}

/// Multi-chain blocked sampler: Metropolis-integer updates of the change
/// index alternating with HMC updates of the continuous block.
#[derive(Clone, Debug)]
pub struct PosteriorSampler {
    config: SamplerConfig,
}

struct ChainOutput {
    samples: Vec<PosteriorSample>,
    stats: ChainStats,
}

impl PosteriorSampler {
    pub fn new(config: SamplerConfig) -> Result<Self, BcpError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn sample(&self, spec: &ModelSpec, ctx: &ExecutionContext<'_>) -> Result<Trace, BcpError> {
        spec.validate()?;
        let started_at = Instant::now();
        let config = &self.config;
        let completed = AtomicUsize::new(0);

        let run = |chain: usize| -> Result<ChainOutput, BcpError> {
            let out = run_chain(spec, config, chain, ctx)?;
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            ctx.report_progress(done as f32 / config.chains as f32);
            Ok(out)
        };

        #[cfg(feature = "rayon")]
        let outputs = (0..config.chains)
            .into_par_iter()
            .map(run)
            .collect::<Result<Vec<_>, _>>()?;
        #[cfg(not(feature = "rayon"))]
        let outputs = (0..config.chains)
            .map(run)
            .collect::<Result<Vec<_>, _>>()?;

        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (chains, chain_stats): (Vec<_>, Vec<_>) = outputs
            .into_iter()
            .map(|out| (out.samples, out.stats))
            .unzip();

        let divergences: usize = chain_stats.iter().map(|s| s.divergences).sum();
        let mean_tau_acceptance = chain_stats
            .iter()
            .map(|s| s.tau_acceptance_rate)
            .sum::<f64>()
            / chain_stats.len() as f64;

        let mut warnings = vec![];
        if divergences > 0 {
            warnings.push(format!(
                "{divergences} divergent transitions after warmup"
            ));
        }
        for stats in chain_stats
            .iter()
            .filter(|s| s.tau_acceptance_rate < LOW_TAU_ACCEPTANCE)
        {
            warnings.push(format!(
                "chain {} accepted only {:.4} of change-index proposals",
                stats.chain, stats.tau_acceptance_rate
            ));
        }
        if ctx.warnings_enabled() {
            for message in &warnings {
                warn!(model = %spec.variant(), "{message}");
            }
        }

        ctx.record_scalar("sampler.runtime_ms", runtime_ms as f64);
        ctx.record_scalar("sampler.divergences", divergences as f64);
        ctx.record_scalar("sampler.tau_acceptance_rate", mean_tau_acceptance);

        info!(
            model = %spec.variant(),
            n = spec.n(),
            chains = config.chains,
            draws = config.draws,
            tune = config.tune,
            seed = config.seed,
            divergences,
            runtime_ms,
            "posterior sampling finished"
        );

        let diagnostics = Diagnostics {
            n: spec.n(),
            runtime_ms: Some(runtime_ms),
            notes: vec![format!(
                "chains={}, draws={}, tune={}, leapfrog_steps={}, tau_proposals_per_step={}",
                config.chains,
                config.draws,
                config.tune,
                config.hmc.leapfrog_steps,
                config.tau_proposal.proposals_per_step
            )],
            warnings,
            model: Cow::Borrowed(spec.variant().as_str()),
            discrete_kernel: Cow::Borrowed(METROPOLIS_INTEGER_TAG),
            continuous_kernel: Cow::Borrowed(GRADIENT_BASED_TAG),
            seed: Some(config.seed),
            thread_count: thread_count(config.chains),
            ..Diagnostics::default()
        };

        Trace::new(spec.variant(), spec.n(), chains, chain_stats, diagnostics)
    }
}

#[cfg(feature = "rayon")]
fn thread_count(chains: usize) -> Option<usize> {
    Some(rayon::current_num_threads().min(chains))
}

#[cfg(not(feature = "rayon"))]
fn thread_count(_chains: usize) -> Option<usize> {
    Some(1)
}

fn run_chain<T: ChangePointTarget + ?Sized>(
    target: &T,
    config: &SamplerConfig,
    chain: usize,
    ctx: &ExecutionContext<'_>,
) -> Result<ChainOutput, BcpError> {
    let seed = chain_seed(config.seed, chain);
    let mut rng = ChainRng::seed_from_u64(seed);
    let n = target.n();

    let inverse_metric = target.initial_inverse_metric();
    let mut theta = target.initial_theta();
    for k in 0..CONTINUOUS_DIM {
        let jitter: f64 = rng.random_range(-1.0..1.0);
        theta[k] += jitter * inverse_metric[k].sqrt();
    }
    let mut state = ChainState {
        tau: rng.random_range(0..n),
        theta,
    };

    let discrete = MetropolisInteger::new(&config.tau_proposal, n)?;
    let continuous = Hmc::new(config.hmc.clone(), inverse_metric, config.tune)?;
    let mut kernel = BlockedGibbs::new(discrete, continuous);
    kernel.initialize(target, &state, &mut rng)?;

    for iteration in 0..config.tune {
        kernel.step(target, &mut state, Phase::Warmup { iteration }, &mut rng)?;
    }
    kernel.end_warmup();

    let mut samples = Vec::with_capacity(config.draws);
    for _ in 0..config.draws {
        kernel.step(target, &mut state, Phase::Sampling, &mut rng)?;
        let sample = target.to_sample(state.tau, &state.theta);
        if !sample.params.is_finite() {
            return Err(BcpError::numerical(format!(
                "chain {chain} produced non-finite parameters: {:?}",
                sample.params
            )));
        }
        samples.push(sample);
    }

    let continuous = kernel.continuous_stats();
    let stats = ChainStats {
        chain,
        seed,
        tau_acceptance_rate: kernel.tau_acceptance_rate(),
        mean_accept_prob: continuous.mean_accept_prob,
        step_size: continuous.step_size,
        divergences: continuous.divergences,
        inverse_metric: continuous.inverse_metric,
    };

    debug!(
        chain,
        seed,
        tau_acceptance_rate = stats.tau_acceptance_rate,
        mean_accept_prob = stats.mean_accept_prob,
        step_size = stats.step_size,
        divergences = stats.divergences,
        "chain finished"
    );
    if ctx.warnings_enabled() && stats.divergences > 0 {
        warn!(chain, divergences = stats.divergences, "chain had divergent transitions");
    }

    Ok(ChainOutput { samples, stats })
}

/// Samples `spec` with default kernel settings and a default context.
pub fn sample(
    spec: &ModelSpec,
    draws: usize,
    tune: usize,
    chains: usize,
    seed: u64,
) -> Result<Trace, BcpError> {
    PosteriorSampler::new(SamplerConfig::new(draws, tune, chains, seed))?
        .sample(spec, &ExecutionContext::new())
}

#[cfg(test)]
mod tests {
    use super::{PosteriorSampler, SamplerConfig, run_chain, sample};
    use bcp_core::{BcpError, ExecutionContext, ObservationSeries, ProgressSink, TelemetrySink};
    use bcp_model::{ModelVariant, build};
    use std::sync::Mutex;

    fn small_series() -> ObservationSeries {
        let values: Vec<f64> = (0..60)
            .map(|i| {
                let wiggle = ((i * 13) % 7) as f64 / 7.0 - 0.5;
                if i < 30 { wiggle } else { 3.0 + wiggle }
            })
            .collect();
        ObservationSeries::new(values).expect("finite")
    }

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<f32>>,
        scalars: Mutex<Vec<&'static str>>,
    }

    impl ProgressSink for Recorder {
        fn on_progress(&self, fraction: f32) {
            self.progress.lock().expect("lock").push(fraction);
        }
    }

    impl TelemetrySink for Recorder {
        fn record_scalar(&self, key: &'static str, _value: f64) {
            self.scalars.lock().expect("lock").push(key);
        }
    }

    #[test]
    fn config_defaults_follow_reference_run() {
        let cfg = SamplerConfig::default();
        assert_eq!((cfg.draws, cfg.tune, cfg.chains, cfg.seed), (2_000, 1_000, 4, 42));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_draws_or_chains_fail_before_sampling() {
        let spec = build(&small_series(), ModelVariant::MeanShift).expect("model");
        for (draws, chains) in [(0, 2), (10, 0)] {
            let err = sample(&spec, draws, 10, chains, 1).expect_err("invalid sizes");
            assert!(matches!(err, BcpError::Configuration(_)));
        }
    }

    #[test]
    fn trace_shape_and_metadata() {
        let spec = build(&small_series(), ModelVariant::VolatilityShift).expect("model");
        let trace = sample(&spec, 40, 30, 3, 9).expect("sample");
        assert_eq!(trace.num_chains(), 3);
        assert_eq!(trace.num_draws(), 40);
        assert_eq!(trace.variant(), ModelVariant::VolatilityShift);
        assert_eq!(trace.series_len(), 60);
        assert_eq!(trace.chain_stats().len(), 3);
        let diagnostics = trace.diagnostics();
        assert_eq!(diagnostics.model, "volatility_shift");
        assert_eq!(diagnostics.discrete_kernel, "Metropolis-integer");
        assert_eq!(diagnostics.continuous_kernel, "gradient-based");
        assert_eq!(diagnostics.seed, Some(9));
        for chain in trace.chains() {
            for s in chain {
                assert!(s.tau < 60);
                assert!(s.params.is_finite());
                assert!(s.value("sigma_1").expect("sigma_1") > 0.0);
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_traces() {
        let spec = build(&small_series(), ModelVariant::MeanShift).expect("model");
        let a = sample(&spec, 30, 30, 2, 123).expect("a");
        let b = sample(&spec, 30, 30, 2, 123).expect("b");
        assert_eq!(a.chains(), b.chains());
        assert_eq!(a.chain_stats(), b.chain_stats());

        let c = sample(&spec, 30, 30, 2, 124).expect("c");
        assert_ne!(a.chains(), c.chains());
    }

    #[test]
    fn sampled_chains_match_sequential_chain_runs() {
        let spec = build(&small_series(), ModelVariant::MeanShift).expect("model");
        let config = SamplerConfig::new(25, 20, 3, 77);
        let ctx = ExecutionContext::new();
        let trace = PosteriorSampler::new(config.clone())
            .expect("config")
            .sample(&spec, &ctx)
            .expect("sample");

        for chain in 0..config.chains {
            let out = run_chain(&spec, &config, chain, &ctx).expect("chain");
            assert_eq!(trace.chain(chain).expect("chain"), out.samples.as_slice());
            assert_eq!(trace.chain_stats()[chain], out.stats);
        }
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn thread_pool_size_does_not_change_draws() {
        let spec = build(&small_series(), ModelVariant::VolatilityShift).expect("model");
        let run_with = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .expect("thread pool")
                .install(|| sample(&spec, 25, 20, 4, 31))
                .expect("sample")
        };
        let single = run_with(1);
        let pooled = run_with(4);
        assert_eq!(single.chains(), pooled.chains());
        assert_eq!(single.chain_stats(), pooled.chain_stats());
    }

    #[test]
    fn sinks_receive_progress_and_telemetry() {
        let spec = build(&small_series(), ModelVariant::MeanShift).expect("model");
        let recorder = Recorder::default();
        let ctx = ExecutionContext::new()
            .with_progress_sink(&recorder)
            .with_telemetry_sink(&recorder);
        let sampler = PosteriorSampler::new(SamplerConfig::new(10, 10, 2, 5)).expect("config");
        sampler.sample(&spec, &ctx).expect("sample");

        let mut progress = recorder.progress.lock().expect("lock").clone();
        progress.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(progress, vec![0.5, 1.0]);
        let scalars = recorder.scalars.lock().expect("lock").clone();
        assert!(scalars.contains(&"sampler.runtime_ms"));
        assert!(scalars.contains(&"sampler.divergences"));
        assert!(scalars.contains(&"sampler.tau_acceptance_rate"));
    }
}
