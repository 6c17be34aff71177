// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod analysis;
pub mod multi;

pub use analysis::ChangePointAnalysis;
pub use multi::{
    ChangePointFitter, ChangePointResult, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_SEGMENT_LENGTH,
    DEFAULT_SIGNIFICANCE_FRACTION, DetectionOutcome, DetectorConfig, MeanShiftFitter,
    MultiChangePointDetector, StopReason, detect,
};

/// Detection namespace.
pub fn crate_name() -> &'static str {
    let _ = (
        bcp_core::crate_name(),
        bcp_model::crate_name(),
        bcp_sampler::crate_name(),
        bcp_diagnostics::crate_name(),
    );
    "bcp-detect"
}
