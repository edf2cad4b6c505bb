//! One unit at a time through the block contract.

use std::hint::black_box;

use criterion::{measurement::WallTime, BenchmarkGroup, BenchmarkId, Criterion};
use saavy_rack::graph::{
    delay, envelope, euclid, filter, vca, ClockUnit, DelayUnit, EnvelopeUnit, EuclidUnit, FilterUnit,
    Unit, UnitHost, VcaUnit,
};

use crate::{test_signal, BLOCK_SIZES, SAMPLE_RATE};

fn bench_host<U: Unit>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    name: &str,
    size: usize,
    mut host: UnitHost<U>,
) {
    group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
        b.iter(|| {
            host.run();
            black_box(host.output(0)[0])
        })
    });
}

pub fn bench_units(c: &mut Criterion) {
    let mut group = c.benchmark_group("units/single");
    let g = &mut group;

    for &size in BLOCK_SIZES {
        let audio = test_signal(size);
        let ramp: Vec<f32> = (0..size).map(|i| i as f32 / size as f32 * 5.0).collect();

        let mut host = UnitHost::new(FilterUnit::new(SAMPLE_RATE), SAMPLE_RATE, size);
        host.set_param("resonance", 0.8).unwrap();
        host.feed(filter::IN, &audio);
        host.feed(filter::CUTOFF_CV, &ramp);
        bench_host(g, "filter_ladder", size, host);

        let mut host = UnitHost::new(FilterUnit::new(SAMPLE_RATE), SAMPLE_RATE, size);
        host.set_param("mode", 3.0).unwrap();
        host.feed(filter::IN, &audio);
        bench_host(g, "filter_svf", size, host);

        let mut host = UnitHost::new(DelayUnit::new(SAMPLE_RATE), SAMPLE_RATE, size);
        host.set_param("mode", 3.0).unwrap();
        host.feed(delay::IN_LEFT, &audio);
        host.feed(delay::TIME_CV, &ramp);
        bench_host(g, "delay", size, host);

        let mut host = UnitHost::new(EnvelopeUnit::new(SAMPLE_RATE), SAMPLE_RATE, size);
        host.feed_constant(envelope::GATE, 5.0);
        bench_host(g, "envelope", size, host);

        let mut host = UnitHost::new(VcaUnit::new(SAMPLE_RATE), SAMPLE_RATE, size);
        host.feed(vca::IN, &audio);
        host.feed(vca::CV, &ramp);
        bench_host(g, "vca", size, host);

        bench_host(
            g,
            "clock",
            size,
            UnitHost::new(ClockUnit::new(SAMPLE_RATE), SAMPLE_RATE, size),
        );

        // Clock input toggling fast enough that steps keep advancing.
        let ticks: Vec<f32> = (0..size).map(|i| if i % 8 < 4 { 5.0 } else { 0.0 }).collect();
        let mut host = UnitHost::new(EuclidUnit::new(SAMPLE_RATE), SAMPLE_RATE, size);
        host.feed(euclid::CLOCK, &ticks);
        bench_host(g, "euclid", size, host);
    }

    group.finish();
}
