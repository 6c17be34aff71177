// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, ObservationSeries};
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Step series with unit Gaussian noise; `levels[k]` holds for the k-th of
/// `levels.len()` equal-length segments.
pub fn step_series(n: usize, levels: &[f64], seed: u64) -> Result<ObservationSeries, BcpError> {
    if levels.is_empty() {
        return Err(BcpError::configuration("step_series needs at least one level"));
    }
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let segment = n.div_ceil(levels.len()).max(1);
    let values = (0..n)
        .map(|i| {
            let z: f64 = StandardNormal.sample(&mut rng);
            levels[(i / segment).min(levels.len() - 1)] + z
        })
        .collect();
    ObservationSeries::new(values)
}
