// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod diagnostics;
pub mod error;
pub mod execution_context;
pub mod numeric;
pub mod repro;
pub mod series;

pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics};
pub use error::BcpError;
pub use execution_context::{ExecutionContext, ProgressSink, TelemetrySink, WarningPolicy};
pub use numeric::{
    CompensatedSum, mean, percentile, population_std, population_variance, prefix_sums_centered,
};
pub use repro::mix_seed;
pub use series::ObservationSeries;

/// Core shared types and traits for bcp-rs.
pub fn crate_name() -> &'static str {
    "bcp-core"
}
