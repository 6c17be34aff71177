// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod params;
pub mod priors;
pub mod spec;
pub mod stats;
pub mod target;
pub mod variant;

pub use params::{CONTINUOUS_DIM, PosteriorSample, RegimeParams, Theta};
pub use priors::{HalfNormalPrior, NormalPrior, Priors};
pub use spec::{ChangePointModelBuilder, ModelSpec, build, build_named, regime_bounds};
pub use stats::{SegmentStats, SufficientStats};
pub use target::ChangePointTarget;
pub use variant::ModelVariant;

/// Model construction namespace.
pub fn crate_name() -> &'static str {
    let _ = bcp_core::crate_name();
    "bcp-model"
}
