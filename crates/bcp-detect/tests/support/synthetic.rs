// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use bcp_core::ObservationSeries;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Piecewise-constant levels plus unit Gaussian noise.
pub fn piecewise_normal(segments: &[(usize, f64)], seed: u64) -> ObservationSeries {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let values: Vec<f64> = segments
        .iter()
        .flat_map(|&(len, level)| std::iter::repeat_n(level, len))
        .map(|level| {
            let z: f64 = StandardNormal.sample(&mut rng);
            level + z
        })
        .collect();
    ObservationSeries::new(values).expect("finite")
}

/// 500 points: N(0, 1) for indices 0..250, then N(5, 1).
pub fn single_shift(seed: u64) -> ObservationSeries {
    piecewise_normal(&[(250, 0.0), (250, 5.0)], seed)
}

/// Shifts after indices 199 and 449.
pub fn two_shifts(seed: u64) -> ObservationSeries {
    piecewise_normal(&[(200, 0.0), (250, 10.0), (80, 13.0)], seed)
}

/// Routes `tracing` output to the test harness; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .without_time(),
        )
        .try_init();
}
