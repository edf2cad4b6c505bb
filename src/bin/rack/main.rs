//! rack - plays a Euclidean demo patch in the terminal
//!
//! Run with: cargo run --bin rack
//! Logs go to stderr; set RUST_LOG=saavy_rack=debug and redirect 2> to see them.

mod app;
mod ui;

use app::RackApp;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();

    RackApp::new().tempo(118.0).pulses(5).run()
}
