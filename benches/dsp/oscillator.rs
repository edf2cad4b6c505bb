//! Benchmarks for oscillator waveforms.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_rack::dsp::oscillator::Oscillator;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for (name, mut osc) in [
            ("sine", Oscillator::sine()),
            ("saw", Oscillator::saw()),
            ("noise", Oscillator::noise()),
        ] {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| osc.render(black_box(&mut buffer), 440.0, SAMPLE_RATE))
            });
        }
    }

    group.finish();
}
