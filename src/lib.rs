//! padseq - a grid step sequencer for the APC40 mkII
//!
//! This library provides the pieces that turn a clip launcher into a step
//! sequencer:
//! - Track classification (drum, melodic, audio) and per-mode grid rendering
//! - Note editing and row functions (copy, paste, clear, fill)
//! - A beat-synchronized playhead with key-change alerts
//! - Controller I/O over MIDI, plus an in-memory host for running standalone

pub mod audio;
pub mod color;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod midi;
pub mod scale;
pub mod sequencer;

// Re-export commonly used types
pub use audio::NotePreview;
pub use color::Color;
pub use config::Settings;
pub use error::{Error, Result};
pub use host::{Host, MemoryHost};
pub use midi::{midi_note_name, ControllerInput, ControllerOutput};
pub use sequencer::playback::TickClock;
pub use sequencer::{ControlEvent, Event, LedSink, LedTarget, RecordingLeds, StepSequencer};
