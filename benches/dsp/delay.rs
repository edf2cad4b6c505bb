//! Benchmarks for the delay line and the cross-fading delay pool.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_rack::dsp::{
    delay::DelayLine,
    delay_pool::{DelayMode, DelayPool, FeedbackSettings},
};

use crate::{test_signal, BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    for &size in BLOCK_SIZES {
        let input = test_signal(size);

        let mut line = DelayLine::new(48_000);
        for &x in &input {
            line.write(x);
        }
        group.bench_with_input(BenchmarkId::new("read_interpolated", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for i in 0..size {
                    let delay_time = 480.0 + (i as f32 * 0.1).sin() * 48.0;
                    sum += line.read_interpolated(black_box(delay_time));
                }
                sum
            })
        });

        let settings = FeedbackSettings::new(0.6, DelayMode::Matrix, 0.5, 6_000.0, SAMPLE_RATE);

        let mut pool = DelayPool::new(4.0, SAMPLE_RATE);
        pool.set_target(12_000.0, true);
        group.bench_with_input(BenchmarkId::new("pool_steady", size), &size, |b, _| {
            b.iter(|| {
                let mut acc = 0.0f32;
                for &x in &input {
                    let (l, r) = pool.process(black_box((x, x)), &settings);
                    acc += l + r;
                }
                acc
            })
        });

        // Retarget every block so a cross-fade is always running.
        let mut pool = DelayPool::new(4.0, SAMPLE_RATE);
        let mut flip = false;
        group.bench_with_input(BenchmarkId::new("pool_crossfade", size), &size, |b, _| {
            b.iter(|| {
                flip = !flip;
                pool.set_target(if flip { 9_000.0 } else { 15_000.0 }, true);
                let mut acc = 0.0f32;
                for &x in &input {
                    let (l, r) = pool.process(black_box((x, -x)), &settings);
                    acc += l - r;
                }
                acc
            })
        });
    }

    group.finish();
}
