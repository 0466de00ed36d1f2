//! Category-tagged debug logging on top of `tracing`.
//!
//! Every category is a tracing target, so a filter such as
//! `padseq::playhead=trace,padseq::functions=debug` switches categories on
//! and off independently.

use tracing_subscriber::EnvFilter;

pub mod target {
    pub const CLASSIFY: &str = "padseq::classify";
    pub const GRID: &str = "padseq::grid";
    pub const NOTES: &str = "padseq::notes";
    pub const VIEW: &str = "padseq::view";
    pub const PLAYHEAD: &str = "padseq::playhead";
    pub const FUNCTIONS: &str = "padseq::functions";
    pub const SESSION: &str = "padseq::session";
    pub const MIDI: &str = "padseq::midi";
}

/// Installs the global subscriber. `RUST_LOG` wins over `filter`.
///
/// Calling this twice (or after another subscriber is set) is harmless.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
