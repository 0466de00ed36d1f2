//! Host sequencing collaborator.
//!
//! The host owns the clip, its notes and the transport. Everything the
//! sequencer knows about musical content is read through [`Host`] at the time
//! of use; nothing returned here is kept across ticks.

pub mod memory;

use thiserror::Error;

pub use memory::MemoryHost;

/// Positions and lengths are in beats (quarter notes).
pub type Beats = f64;

/// Beat comparisons tolerate float noise below this.
pub const BEAT_EPSILON: Beats = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("no clip in the selected slot")]
    ClipUnavailable,
    #[error("device chain unavailable")]
    DevicesUnavailable,
    #[error("stale host reference: {0}")]
    Stale(String),
    #[error("host rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: u8,
    pub start: Beats,
    pub duration: Beats,
    pub velocity: u8,
    /// Expression channel, 0.0..=1.0
    pub pressure: f32,
}

impl Note {
    pub fn new(pitch: u8, start: Beats, duration: Beats) -> Self {
        Self {
            pitch,
            start,
            duration,
            velocity: 64,
            pressure: 0.0,
        }
    }

    pub fn with_expression(mut self, velocity: u8, pressure: f32) -> Self {
        self.velocity = velocity.min(127);
        self.pressure = pressure.clamp(0.0, 1.0);
        self
    }

    pub fn end(&self) -> Beats {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    Midi,
    Audio,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub kind: ClipKind,
    pub name: String,
    pub length: Beats,
    pub loop_start: Beats,
    pub loop_end: Beats,
    /// 1 (mono) or 2 (stereo); meaningful for audio clips only.
    pub channel_count: u8,
    pub warp_markers: Vec<Beats>,
}

impl ClipInfo {
    pub fn midi(name: &str, length: Beats) -> Self {
        Self {
            kind: ClipKind::Midi,
            name: name.to_string(),
            length,
            loop_start: 0.0,
            loop_end: length,
            channel_count: 2,
            warp_markers: Vec::new(),
        }
    }

    pub fn audio(name: &str, length: Beats, channel_count: u8) -> Self {
        Self {
            kind: ClipKind::Audio,
            name: name.to_string(),
            length,
            loop_start: 0.0,
            loop_end: length,
            channel_count: channel_count.clamp(1, 2),
            warp_markers: Vec::new(),
        }
    }

    pub fn loop_length(&self) -> Beats {
        (self.loop_end - self.loop_start).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumPad {
    pub note: u8,
    /// Pad has a chain/sample loaded.
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceInfo {
    pub name: String,
    pub can_have_drum_pads: bool,
    pub drum_pads: Vec<DrumPad>,
    /// Chains of an instrument rack, each a device list of its own.
    pub chains: Vec<Vec<DeviceInfo>>,
}

impl DeviceInfo {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn drum_rack(name: &str, pads: Vec<DrumPad>) -> Self {
        Self {
            name: name.to_string(),
            can_have_drum_pads: true,
            drum_pads: pads,
            chains: Vec::new(),
        }
    }

    pub fn rack(name: &str, chains: Vec<Vec<DeviceInfo>>) -> Self {
        Self {
            name: name.to_string(),
            chains,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSetting {
    pub root: u8,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transport {
    pub playing: bool,
    /// Playing position inside the clip loop.
    pub position: Beats,
    pub tempo: f64,
}

pub trait Host {
    fn clip(&self) -> Result<ClipInfo, HostError>;

    fn devices(&self) -> Result<Vec<DeviceInfo>, HostError>;

    fn scale(&self) -> Result<ScaleSetting, HostError>;

    fn set_scale(&mut self, setting: ScaleSetting) -> Result<(), HostError>;

    /// Notes of `pitch` whose start lies in `[from, from + span)`.
    fn notes(&self, pitch: u8, from: Beats, span: Beats) -> Result<Vec<Note>, HostError>;

    fn all_notes(&self) -> Result<Vec<Note>, HostError>;

    fn add_notes(&mut self, notes: &[Note]) -> Result<(), HostError>;

    /// Removes notes of `pitch` whose start lies in `[from, from + span)`.
    fn remove_notes(&mut self, pitch: u8, from: Beats, span: Beats) -> Result<(), HostError>;

    /// Rewrites velocity and/or pressure of the notes of `pitch` whose start
    /// lies in `[from, from + span)`. Returns how many notes were touched.
    fn set_note_expression(
        &mut self,
        pitch: u8,
        from: Beats,
        span: Beats,
        velocity: Option<u8>,
        pressure: Option<f32>,
    ) -> Result<usize, HostError>;

    fn transport(&self) -> Result<Transport, HostError>;

    fn set_loop(&mut self, start: Beats, end: Beats) -> Result<(), HostError>;
}
