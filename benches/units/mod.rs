//! Unit and patch benchmarks.
//!
//! `units/*` runs each unit through `UnitHost`, so the numbers include the
//! block contract (parameter reads, ramps, lane views). `units/rack` renders
//! a full voice patch the way an audio callback would.

mod rack;
mod single;

pub use rack::bench_rack;
pub use single::bench_units;
