// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod adaptation;
pub mod gibbs;
pub mod hmc;
pub mod metropolis;
pub mod rng;
pub mod sampler;
pub mod trace;

pub use adaptation::{DualAveraging, WarmupSchedule, WelfordVariance};
pub use gibbs::{BlockedGibbs, ChainState};
pub use hmc::{ContinuousKernel, ContinuousStats, GRADIENT_BASED_TAG, Hmc, HmcConfig, Phase};
pub use metropolis::{METROPOLIS_INTEGER_TAG, MetropolisInteger, TauKernel, TauProposalConfig};
pub use rng::{ChainRng, chain_rng, chain_seed};
pub use sampler::{PosteriorSampler, SamplerConfig, sample};
pub use trace::{ChainStats, Trace};

/// Posterior sampler namespace.
pub fn crate_name() -> &'static str {
    let _ = (bcp_core::crate_name(), bcp_model::crate_name());
    "bcp-sampler"
}
