// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod convergence;
pub mod summary;

pub use bcp_core::percentile;
pub use convergence::{
    ConvergenceDiagnostics, ConvergenceReport, DEFAULT_R_HAT_THRESHOLD, ParameterConvergence,
    check_convergence, effective_sample_size, gelman_rubin,
};
pub use summary::{
    CredibleInterval, ParameterPosterior, RegimeComparison, RegimeStats, change_point_posterior,
    flatten, parameter_posteriors, regime_comparison,
};

/// Diagnostics and summary namespace.
pub fn crate_name() -> &'static str {
    let _ = (
        bcp_core::crate_name(),
        bcp_model::crate_name(),
        bcp_sampler::crate_name(),
    );
    "bcp-diagnostics"
}
