pub mod dsp;
pub mod graph; // Processing units and the block contract
pub mod io;
pub mod patch; // Connection graph and the audio-side renderer
pub mod sequencing; // Musical timing, clocks and Euclidean patterns

pub use graph::{Inputs, Outputs, RenderCtx, Unit};
pub use patch::{Patch, PatchError, Rack, RackConfig, UnitId};

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;

/// Level of a logic-high gate or trigger.
pub const GATE_HIGH_VOLTS: f32 = 5.0;
/// Control voltage that maps to full scale on unipolar CV inputs.
pub const CV_REFERENCE_VOLTS: f32 = 5.0;
/// Nominal peak of an audio-rate signal.
pub const AUDIO_PEAK_VOLTS: f32 = 5.0;
