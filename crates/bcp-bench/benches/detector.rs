// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_bench::step_series;
use bcp_core::ExecutionContext;
use bcp_detect::{DetectorConfig, MultiChangePointDetector};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn benchmark_detector(c: &mut Criterion) {
    let series =
        step_series(1_200, &[0.0, 6.0, 2.0], 11).expect("benchmark series should be valid");
    let detector = MultiChangePointDetector::new(DetectorConfig::default())
        .expect("detector config should be valid");

    let mut group = c.benchmark_group("detector");
    group.sample_size(10);
    group.bench_function("three_level_n1200_default", |b| {
        b.iter(|| {
            detector
                .detect(black_box(&series), &ExecutionContext::new())
                .expect("detection should succeed")
        })
    });
    group.finish();
}

criterion_group!(benches, benchmark_detector);
criterion_main!(benches);
