//! Benchmarks for the ladder and state-variable filters.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_rack::dsp::{
    filter::{prewarp, FilterType, SVFilter},
    ladder::LadderFilter,
};

use crate::{test_signal, BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);

        let mut ladder = LadderFilter::new(SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("ladder", size), &size, |b, _| {
            b.iter(|| {
                let mut acc = 0.0f32;
                for &x in &input {
                    acc += ladder.tick(black_box(x), 1_200.0, 0.7, 0.3);
                }
                acc
            })
        });

        // Cutoff swept every sample, the worst case for coefficient updates.
        let mut ladder = LadderFilter::new(SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("ladder_sweep", size), &size, |b, _| {
            b.iter(|| {
                let mut acc = 0.0f32;
                for (i, &x) in input.iter().enumerate() {
                    let cutoff = 100.0 + 15_000.0 * (i as f32 / size as f32);
                    acc += ladder.tick(black_box(x), cutoff, 0.9, 0.0);
                }
                acc
            })
        });

        for (name, filter_type) in [
            ("svf_lowpass", FilterType::LowPass),
            ("svf_bandpass", FilterType::BandPass),
        ] {
            let mut svf = SVFilter::new(filter_type);
            svf.set_resonance(0.5);
            let g = prewarp(1_000.0, SAMPLE_RATE).unwrap_or(0.0);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut acc = 0.0f32;
                    for &x in &input {
                        acc += svf.tick(black_box(x), g);
                    }
                    acc
                })
            });
        }
    }

    group.finish();
}
