//! A full voice patch rendered through `Rack`.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_rack::{
    graph::{
        clock, envelope, euclid, filter, oscillator, vca, ClockUnit, DelayUnit, EnvelopeUnit,
        EuclidUnit, FilterUnit, OscillatorUnit, VcaUnit,
    },
    Patch, Rack, RackConfig,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

/// clock → euclid → envelope → vca ← osc, vca → filter → delay → out.
fn voice_rack(block_size: usize) -> (Patch, Rack) {
    let config = RackConfig::default()
        .with_sample_rate(SAMPLE_RATE)
        .with_block_size(block_size);
    let (mut patch, rack) = Patch::new(config);

    let clk = patch.add_unit(ClockUnit::new(SAMPLE_RATE)).unwrap();
    let seq = patch.add_unit(EuclidUnit::new(SAMPLE_RATE)).unwrap();
    let env = patch.add_unit(EnvelopeUnit::new(SAMPLE_RATE)).unwrap();
    let osc = patch.add_unit(OscillatorUnit::new(SAMPLE_RATE)).unwrap();
    let amp = patch.add_unit(VcaUnit::new(SAMPLE_RATE)).unwrap();
    let vcf = patch.add_unit(FilterUnit::new(SAMPLE_RATE)).unwrap();
    let dly = patch.add_unit(DelayUnit::new(SAMPLE_RATE)).unwrap();

    // Every port used here is mono, so port index == lane index.
    patch.connect(clk, clock::PPQN_OUT, seq, euclid::CLOCK).unwrap();
    patch.connect(seq, euclid::GATE_OUT, env, envelope::GATE).unwrap();
    patch.connect(env, envelope::ENV, amp, vca::CV).unwrap();
    patch.connect(env, envelope::ENV, vcf, filter::CUTOFF_CV).unwrap();
    patch.connect(osc, oscillator::OUT, amp, vca::IN).unwrap();
    patch.connect(amp, vca::OUT, vcf, filter::IN).unwrap();
    patch.connect(vcf, filter::OUT, dly, 0).unwrap();
    patch.set_output(dly, 0).unwrap();
    patch.set_param(osc, "waveform", 1.0).unwrap();

    (patch, rack)
}

pub fn bench_rack(c: &mut Criterion) {
    let mut group = c.benchmark_group("units/rack");

    for &size in BLOCK_SIZES {
        let (_patch, mut rack) = voice_rack(size);
        let (mut left, mut right) = (vec![0.0f32; size], vec![0.0f32; size]);
        group.bench_with_input(BenchmarkId::new("voice", size), &size, |b, _| {
            b.iter(|| {
                rack.process_block(black_box(&mut left), black_box(&mut right));
            })
        });

        // Host buffer larger than the rack block: exercises chunking and
        // interleaving.
        let (_patch, mut rack) = voice_rack(64);
        let mut interleaved = vec![0.0f32; size * 2];
        group.bench_with_input(BenchmarkId::new("interleaved_64", size), &size, |b, _| {
            b.iter(|| rack.render_interleaved(black_box(&mut interleaved), 2))
        });
    }

    group.finish();
}
