//! Long-running and boundary properties every unit must hold.

use more_asserts::{assert_ge, assert_gt, assert_le, assert_lt};
use oorandom::Rand32;
use saavy_rack::{
    dsp::{envelope::EnvelopeStage, ladder::LIMIT_CEILING},
    graph::{
        delay, envelope, filter, vca, ClockUnit, DelayUnit, EnvelopeUnit, EuclidUnit, FilterUnit,
        OscillatorUnit, Unit, UnitHost, VcaUnit,
    },
    GATE_HIGH_VOLTS,
};

const SR: f32 = 48_000.0;

/// Random value for an input lane: mostly in ±10 V, sometimes garbage.
fn hostile_sample(rng: &mut Rand32) -> f32 {
    match rng.rand_range(0..200) {
        0 => f32::NAN,
        1 => f32::INFINITY,
        2 => f32::NEG_INFINITY,
        _ => rng.rand_float() * 20.0 - 10.0,
    }
}

/// Run `blocks` blocks with every parameter and input re-randomised each
/// block, asserting finite output throughout.
fn fuzz<U: Unit>(unit: U, blocks: usize, seed: u64) {
    const BLOCK: usize = 32;
    let mut rng = Rand32::new(seed);
    let inputs = unit.layout().input_lanes();
    let outputs = unit.layout().output_lanes();
    let specs = unit.params().specs();
    let mut host = UnitHost::new(unit, SR, BLOCK);
    let mut lane = [0.0f32; BLOCK];

    for block in 0..blocks {
        // Parameters move every 16 blocks, slightly out of range.
        if block % 16 == 0 {
            for spec in specs {
                let span = spec.max - spec.min;
                let value = spec.min - 0.1 * span + rng.rand_float() * 1.2 * span;
                host.set_param(spec.name, value).unwrap();
            }
        }
        for input in 0..inputs {
            for s in lane.iter_mut() {
                *s = hostile_sample(&mut rng);
            }
            host.feed(input, &lane);
        }
        host.run();
        for output in 0..outputs {
            assert!(
                host.output(output).iter().all(|y| y.is_finite()),
                "non-finite output on lane {output} in block {block}"
            );
        }
    }
}

#[test]
fn every_unit_stays_finite_for_ten_thousand_blocks() {
    fuzz(FilterUnit::new(SR), 10_000, 1);
    fuzz(DelayUnit::new(SR), 10_000, 2);
    fuzz(EnvelopeUnit::new(SR), 10_000, 3);
    fuzz(VcaUnit::new(SR), 10_000, 4);
    fuzz(ClockUnit::new(SR), 10_000, 5);
    fuzz(EuclidUnit::new(SR), 10_000, 6);
    fuzz(OscillatorUnit::new(SR), 10_000, 7);
}

#[test]
fn ladder_is_bounded_at_full_resonance_and_drive() {
    let mut host = UnitHost::new(FilterUnit::new(SR), SR, 256);
    host.set_param("resonance", 1.0).unwrap();
    host.set_param("drive", 1.0).unwrap();

    let square: Vec<f32> = (0..256).map(|i| if i % 64 < 32 { 10.0 } else { -10.0 }).collect();
    host.feed(filter::IN, &square);

    // Sweep the cutoff through the whole range, including the top end where
    // the feedback cap tightens.
    for step in 0..400 {
        let cutoff = 20.0 * 1000f32.powf(step as f32 / 400.0);
        host.set_param("cutoff", cutoff).unwrap();
        host.run();
        for &y in host.output(filter::OUT) {
            assert!(y.is_finite());
            assert_le!(y.abs(), LIMIT_CEILING);
        }
    }
}

#[test]
fn delay_time_change_does_not_click() {
    const BLOCK: usize = 64;
    let mut host = UnitHost::new(DelayUnit::new(SR), SR, BLOCK);
    host.set_param("mix", 1.0).unwrap();
    host.set_param("feedback", 0.0).unwrap();
    host.set_param("time", 0.1).unwrap();

    let freq = 220.0;
    let max_step = 5.0 * std::f32::consts::TAU * freq / SR;
    let mut phase = 0.0f32;
    let mut last = 0.0f32;
    let mut worst = 0.0f32;

    for block in 0..600 {
        if block == 200 {
            host.set_param("time", 0.2).unwrap();
        }
        if block == 400 {
            host.set_param("time", 0.05).unwrap();
        }
        let input: Vec<f32> = (0..BLOCK)
            .map(|_| {
                phase = (phase + freq / SR).fract();
                5.0 * (std::f32::consts::TAU * phase).sin()
            })
            .collect();
        host.feed(delay::IN_LEFT, &input);
        host.run();
        for &y in host.output(delay::OUT_LEFT) {
            worst = worst.max((y - last).abs());
            last = y;
        }
    }
    // A hard switch between two taps of a 5 V sine jumps by volts.
    assert_lt!(worst, 2.5 * max_step);
    assert_ge!(host.unit().pool().active_slots(), 1);
}

#[test]
fn linear_adsr_hits_its_marks() {
    const BLOCK: usize = 48;
    let mut host = UnitHost::new(EnvelopeUnit::new(SR), SR, BLOCK);
    host.set_param("shape", 1.0).unwrap();
    host.set_param("attack", 0.01).unwrap();
    host.set_param("decay", 0.2).unwrap();
    host.set_param("sustain", 0.7).unwrap();
    host.set_param("release", 0.3).unwrap();

    fn run(host: &mut UnitHost<EnvelopeUnit>, blocks: usize, out: &mut Vec<f32>) {
        for _ in 0..blocks {
            host.run();
            out.extend_from_slice(host.output(envelope::ENV));
        }
    }

    let mut out = Vec::new();

    host.feed_constant(envelope::GATE, GATE_HIGH_VOLTS);
    run(&mut host, 1000, &mut out); // 1 s
    // 480-sample attack.
    assert!((out[399] - 5.0 * 400.0 / 480.0).abs() < 0.05, "{}", out[399]);
    assert_ge!(out[499], 4.99);
    assert_eq!(out[out.len() - 1], 0.7 * GATE_HIGH_VOLTS);
    assert_eq!(host.unit().stage(), EnvelopeStage::Sustain);

    out.clear();
    host.feed_constant(envelope::GATE, 0.0);
    run(&mut host, 400, &mut out); // 0.4 s
    // Half way through a 14 400-sample release.
    assert!((out[7199] - 1.75).abs() < 0.05, "{}", out[7199]);
    assert!(out[14_500..].iter().all(|&y| y == 0.0));
    assert_eq!(host.unit().stage(), EnvelopeStage::Idle);
}

#[test]
fn exponential_adsr_reaches_peak_sustain_and_silence() {
    const BLOCK: usize = 48;
    let mut host = UnitHost::new(EnvelopeUnit::new(SR), SR, BLOCK);
    host.set_param("attack", 0.1).unwrap();
    host.set_param("decay", 0.2).unwrap();
    host.set_param("sustain", 0.7).unwrap();
    host.set_param("release", 0.3).unwrap();

    let mut out = Vec::new();
    host.feed_constant(envelope::GATE, GATE_HIGH_VOLTS);
    for _ in 0..1000 {
        host.run();
        out.extend_from_slice(host.output(envelope::ENV));
    }
    // Peak inside the 0.1 s attack window.
    let (peak_at, peak) = out
        .iter()
        .enumerate()
        .fold((0, 0.0f32), |best, (i, &y)| if y > best.1 { (i, y) } else { best });
    assert_ge!(peak, 0.998 * GATE_HIGH_VOLTS);
    assert_le!(peak_at, 4_800);
    // Settled on sustain well before the gate falls.
    assert!((out[out.len() - 1] - 0.7 * GATE_HIGH_VOLTS).abs() < 1e-6);
    assert_eq!(host.unit().stage(), EnvelopeStage::Sustain);

    out.clear();
    host.feed_constant(envelope::GATE, 0.0);
    for _ in 0..400 {
        host.run();
        out.extend_from_slice(host.output(envelope::ENV));
    }
    // Within 0.1 % of the ceiling once the 0.3 s release has elapsed.
    assert_le!(out[14_399], 1e-3 * GATE_HIGH_VOLTS);
    assert_eq!(host.unit().stage(), EnvelopeStage::Idle);
    assert_eq!(out[out.len() - 1], 0.0);
}

#[test]
fn envelope_stays_within_gate_range() {
    let mut host = UnitHost::new(EnvelopeUnit::new(SR), SR, 64);
    host.set_param("attack", 0.0005).unwrap();
    host.set_param("release", 0.0005).unwrap();
    let mut rng = Rand32::new(11);
    for _ in 0..5_000 {
        let gate: Vec<f32> = (0..64)
            .map(|_| if rng.rand_range(0..8) == 0 { 5.0 } else { 0.0 })
            .collect();
        host.feed(envelope::GATE, &gate);
        host.run();
        for &y in host.output(envelope::ENV) {
            assert!((0.0..=GATE_HIGH_VOLTS).contains(&y));
        }
    }
}

#[test]
fn vca_gates_to_exact_silence() {
    const BLOCK: usize = 64;
    let mut host = UnitHost::new(VcaUnit::new(SR), SR, BLOCK);
    let noise: Vec<f32> = {
        let mut rng = Rand32::new(3);
        (0..BLOCK).map(|_| rng.rand_float() * 8.0 - 4.0).collect()
    };
    host.feed(vca::IN, &noise);

    host.feed_constant(vca::CV, 2.5);
    let mut peak = 0.0f32;
    for _ in 0..50 {
        host.run();
        peak = host.output(vca::OUT).iter().fold(0.0, |m, y| m.max(y.abs()));
    }
    assert_gt!(peak, 1.0);
    assert_le!(peak, 2.5);

    host.feed_constant(vca::CV, 0.0);
    for _ in 0..100 {
        host.run();
    }
    assert!(host.output(vca::OUT).iter().all(|&y| y == 0.0));
}
