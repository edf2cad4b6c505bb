//! Benchmarks for the ADSR envelope generator.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_rack::dsp::envelope::Envelope;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        let mut env = Envelope::adsr(0.01, 0.1, 0.7, 0.3, SAMPLE_RATE);
        env.gate_on(false);
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| env.render(black_box(&mut buffer)))
        });

        // Gate toggles every block: attack and release paths alternate.
        let mut env = Envelope::adsr(0.002, 0.05, 0.5, 0.02, SAMPLE_RATE);
        let mut high = false;
        group.bench_with_input(BenchmarkId::new("retrigger", size), &size, |b, _| {
            b.iter(|| {
                high = !high;
                if high {
                    env.gate_on(true);
                } else {
                    env.gate_off();
                }
                env.render(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
