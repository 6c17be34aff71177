// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_bench::step_series;
use bcp_core::ExecutionContext;
use bcp_diagnostics::check_convergence;
use bcp_model::{ChangePointTarget, ModelVariant, build};
use bcp_sampler::{PosteriorSampler, SamplerConfig};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn benchmark_log_density(c: &mut Criterion) {
    let series = step_series(10_000, &[0.0, 2.0], 7).expect("benchmark series should be valid");
    let spec = build(&series, ModelVariant::MeanShift).expect("model should build");
    let theta = spec.initial_theta();

    let mut group = c.benchmark_group("target");
    group.bench_function("mean_shift_log_likelihood_n1e4", |b| {
        let mut tau = 0usize;
        b.iter(|| {
            tau = (tau + 7_919) % spec.n();
            black_box(spec.log_likelihood(black_box(tau), black_box(&theta)))
        })
    });
    group.bench_function("mean_shift_log_density_and_gradient_n1e4", |b| {
        let mut grad = [0.0; 3];
        b.iter(|| {
            black_box(spec.log_density_and_gradient(
                black_box(4_999),
                black_box(&theta),
                &mut grad,
            ))
        })
    });
    group.finish();
}

fn benchmark_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampler");
    group.sample_size(10);

    for n in [500usize, 5_000] {
        let series = step_series(n, &[0.0, 5.0], 42).expect("benchmark series should be valid");
        for variant in ModelVariant::ALL {
            let spec = build(&series, variant).expect("model should build");
            let sampler = PosteriorSampler::new(SamplerConfig::new(1_000, 500, 2, 42))
                .expect("sampler config should be valid");
            group.bench_with_input(
                BenchmarkId::new(variant.as_str(), n),
                &spec,
                |b, spec| {
                    b.iter(|| {
                        sampler
                            .sample(black_box(spec), &ExecutionContext::new())
                            .expect("sampling should succeed")
                    })
                },
            );
        }
    }

    let series = step_series(500, &[0.0, 5.0], 42).expect("benchmark series should be valid");
    let spec = build(&series, ModelVariant::MeanShift).expect("model should build");
    let trace = PosteriorSampler::new(SamplerConfig::default())
        .expect("sampler config should be valid")
        .sample(&spec, &ExecutionContext::new())
        .expect("sampling should succeed");
    group.bench_function("convergence_4x2000", |b| {
        b.iter(|| check_convergence(black_box(&trace)).expect("diagnostics should succeed"))
    });

    group.finish();
}

criterion_group!(benches, benchmark_log_density, benchmark_sampling);
criterion_main!(benches);
