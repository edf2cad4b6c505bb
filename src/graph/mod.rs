//! Processing units and the block contract they share.
//!
//! Every unit implements [`Unit`]: a fixed port layout, a lock-free parameter
//! set, and a `process` call that fills its output lanes for one block. Units
//! know nothing about each other; the patch renderer wires lanes together.

/// 48 PPQN master clock with divided outputs.
pub mod clock;
/// Stereo delay with click-free time changes.
pub mod delay;
/// ADSR envelope with a Schmitt-triggered gate.
pub mod envelope;
/// Euclidean gate sequencer.
pub mod euclid;
/// Ladder and state-variable filter.
pub mod filter;
/// Run a single unit outside a rack (tests, benches, offline renders).
pub mod host;
/// Core trait and block views shared by all units.
pub mod node;
/// 1 V/oct audio oscillator.
pub mod oscillator;
pub mod param;
pub mod port;
/// Voltage-controlled amplifier.
pub mod vca;

pub use clock::ClockUnit;
pub use delay::DelayUnit;
pub use envelope::EnvelopeUnit;
pub use euclid::EuclidUnit;
pub use filter::{FilterMode, FilterUnit};
pub use host::UnitHost;
pub use node::{Inputs, Outputs, RenderCtx, Unit};
pub use oscillator::OscillatorUnit;
pub use param::{ParamError, ParamRamp, ParamSet, ParamSpec, Rate};
pub use port::{PortDef, PortLayout, SignalKind};
pub use vca::VcaUnit;
