//! Low-level DSP primitives used by the processing units.
//!
//! These components are allocation-free once constructed and realtime-safe,
//! so units embed them directly. They stay focused on the signal-processing
//! math; ports, parameters and block plumbing live in [`crate::graph`].

/// DC-blocking one-pole/one-zero high-pass.
pub mod dc_blocker;
/// Fractional ring-buffer delay line.
pub mod delay;
/// Pool of delay lines with cross-faded time changes.
pub mod delay_pool;
/// tanh saturation and soft-knee limiting.
pub mod distortion;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// State-variable filter implementation with multiple responses.
pub mod filter;
/// Zero-delay-feedback four-pole ladder.
pub mod ladder;
/// Oscillator waveforms and noise sources.
pub mod oscillator;
/// Two-threshold edge detector for gates and clocks.
pub mod schmitt;
/// One-pole parameter smoothing.
pub mod slew;
pub mod util;
/// Gain computer with a hysteretic hard gate.
pub mod vca;

pub use envelope::{Envelope, EnvelopeShape, EnvelopeStage};
pub use schmitt::{Edge, SchmittTrigger};
