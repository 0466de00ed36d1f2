//! Configuration (`padseq.toml`).
//!
//! Every section and field has a default, so an empty or missing file yields
//! a working setup for an APC40 mkII on the default ports.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub notes: NoteDefaults,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiConfig {
    /// Substring of the controller's input port name (default: "APC40")
    #[serde(default = "default_port")]
    pub input_port: String,
    /// Substring of the controller's output port name (default: "APC40")
    #[serde(default = "default_port")]
    pub output_port: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Playhead tick period in milliseconds (default: 30, range: 10-100)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Tempo of the built-in transport (default: 120, range: 40-240)
    #[serde(default = "default_tempo")]
    pub tempo: f64,
}

/// Expression used for new notes until a knob sets a row's own value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDefaults {
    #[serde(default = "default_velocity")]
    pub default_velocity: u8,
    #[serde(default)]
    pub default_pressure: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sound notes as the built-in transport plays them (default: true)
    #[serde(default = "default_true")]
    pub preview: bool,
    /// Preview voice level (default: 0.2, range: 0.0-1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_port() -> String {
    "APC40".to_string()
}
fn default_client_name() -> String {
    "padseq".to_string()
}
fn default_tick_ms() -> u64 {
    30
}
fn default_tempo() -> f64 {
    120.0
}
fn default_velocity() -> u8 {
    64
}
fn default_log_filter() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_volume() -> f32 {
    0.2
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: default_port(),
            output_port: default_port(),
            client_name: default_client_name(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            tempo: default_tempo(),
        }
    }
}

impl Default for NoteDefaults {
    fn default() -> Self {
        Self {
            default_velocity: default_velocity(),
            default_pressure: 0.0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            preview: default_true(),
            volume: default_volume(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(text)?;
        settings.sanitize();
        Ok(settings)
    }

    fn sanitize(&mut self) {
        self.clock.tick_ms = self.clock.tick_ms.clamp(10, 100);
        self.clock.tempo = self.clock.tempo.clamp(40.0, 240.0);
        self.notes.default_velocity = self.notes.default_velocity.min(127);
        self.notes.default_pressure = self.notes.default_pressure.clamp(0.0, 1.0);
        self.audio.volume = self.audio.volume.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_text_gives_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.clock.tick_ms, 30);
        assert_eq!(settings.midi.input_port, "APC40");
    }

    #[test]
    fn test_values_are_clamped() {
        let settings = Settings::parse(
            r#"
            [clock]
            tick_ms = 1
            tempo = 999.0

            [notes]
            default_velocity = 200
            "#,
        )
        .unwrap();
        assert_eq!(settings.clock.tick_ms, 10);
        assert_eq!(settings.clock.tempo, 240.0);
        assert_eq!(settings.notes.default_velocity, 127);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\nfilter = \"padseq::playhead=trace\"").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.log.filter, "padseq::playhead=trace");
        assert!(settings.audio.preview);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(Settings::parse("[clock\ntick_ms = 3").is_err());
    }
}
