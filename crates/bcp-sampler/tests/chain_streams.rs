// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{ExecutionContext, ObservationSeries, WarningPolicy};
use bcp_model::{ModelVariant, build};
use bcp_sampler::{PosteriorSampler, SamplerConfig, chain_seed, sample};
use proptest::prelude::*;

fn series(shift_at: usize, n: usize) -> ObservationSeries {
    let values: Vec<f64> = (0..n)
        .map(|i| {
            let wiggle = ((i * 29) % 13) as f64 / 13.0 - 0.5;
            if i < shift_at { wiggle } else { 2.5 + wiggle }
        })
        .collect();
    ObservationSeries::new(values).expect("finite")
}

#[test]
fn chain_draws_do_not_depend_on_chain_count() {
    let spec = build(&series(40, 80), ModelVariant::MeanShift).expect("model");
    let two = sample(&spec, 25, 25, 2, 77).expect("two chains");
    let three = sample(&spec, 25, 25, 3, 77).expect("three chains");
    assert_eq!(two.chain(0), three.chain(0));
    assert_eq!(two.chain(1), three.chain(1));
    assert_eq!(three.chain_stats()[2].seed, chain_seed(77, 2));
}

#[test]
fn suppressed_warnings_do_not_change_draws() {
    let spec = build(&series(30, 60), ModelVariant::VolatilityShift).expect("model");
    let sampler = PosteriorSampler::new(SamplerConfig::new(20, 20, 2, 3)).expect("config");
    let loud = sampler
        .sample(&spec, &ExecutionContext::new())
        .expect("emit");
    let quiet = sampler
        .sample(
            &spec,
            &ExecutionContext::new().with_warning_policy(WarningPolicy::Suppress),
        )
        .expect("suppress");
    assert_eq!(loud.chains(), quiet.chains());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn draws_stay_in_support(seed in any::<u64>(), shift_at in 5usize..45) {
        let spec = build(&series(shift_at, 50), ModelVariant::MeanShift).expect("model");
        let trace = sample(&spec, 15, 15, 2, seed).expect("sample");
        for chain in trace.chains() {
            for s in chain {
                prop_assert!(s.tau < 50);
                prop_assert!(s.params.is_finite());
                prop_assert!(s.value("sigma").expect("sigma") > 0.0);
            }
        }
    }
}
