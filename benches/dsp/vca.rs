//! Benchmarks for the VCA gain computer.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_rack::dsp::vca::Vca;

use crate::{test_signal, BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_vca(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/vca");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);
        let cv: Vec<f32> = (0..size).map(|i| (i as f32 / size as f32) * 5.0).collect();

        for (name, saturation) in [("clean", 0.0), ("saturated", 0.8)] {
            let mut vca = Vca::new(SAMPLE_RATE);
            vca.set_saturation(saturation);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut acc = 0.0f32;
                    for (&x, &c) in input.iter().zip(&cv) {
                        acc += vca.process(black_box(x), c, 0.0, 1.0);
                    }
                    acc
                })
            });
        }
    }

    group.finish();
}
