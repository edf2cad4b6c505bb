//! Musical time: note values, the master clock and Euclidean rhythms.

pub mod clock;
pub mod duration;
pub mod euclid;
pub mod euclid_gen;

pub use clock::{ClockFrame, MasterClock};
pub use duration::{ClockDivision, Duration, NoteDivision};
pub use euclid::Pattern;
pub use euclid_gen::{EuclidFrame, EuclidGenerator, EuclidSettings, StepEvent};

/// Resolution of the master clock, in pulses per quarter note.
pub const PPQN: u32 = 48;
