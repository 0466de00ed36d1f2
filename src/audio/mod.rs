/// Note preview using cpal
///
/// A single sine voice with a short decay, enough to hear what the built-in
/// transport is playing when no synth is attached.
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::logging::target;

/// Per-sample envelope multiplier; roughly a 150 ms tail at 48 kHz.
const DECAY: f32 = 0.9994;
const SILENCE: f32 = 1.0e-4;

#[derive(Debug, Clone, Copy, Default)]
struct Voice {
    frequency: f32,
    phase: f32,
    level: f32,
}

impl Voice {
    fn next_sample(&mut self, sample_rate: f32) -> f32 {
        if self.level < SILENCE {
            self.level = 0.0;
            self.phase = 0.0;
            return 0.0;
        }
        let sample = (self.phase * 2.0 * std::f32::consts::PI).sin() * self.level;
        self.phase += self.frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.level *= DECAY;
        sample
    }
}

pub struct NotePreview {
    _stream: Option<cpal::Stream>,
    voice: Arc<Mutex<Voice>>,
    volume: f32,
}

impl NotePreview {
    pub fn new(volume: f32) -> Result<Self> {
        let voice = Arc::new(Mutex::new(Voice::default()));
        let stream = Self::setup_audio_stream(Arc::clone(&voice))?;
        tracing::debug!(target: target::SESSION, "Preview voice running");

        Ok(Self {
            _stream: Some(stream),
            voice,
            volume: volume.clamp(0.0, 1.0),
        })
    }

    /// A preview that never makes a sound.
    pub fn silent() -> Self {
        Self {
            _stream: None,
            voice: Arc::new(Mutex::new(Voice::default())),
            volume: 0.0,
        }
    }

    fn setup_audio_stream(voice: Arc<Mutex<Voice>>) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no default output device".to_string()))?;
        let config = device
            .default_output_config()
            .map_err(|e| Error::Audio(e.to_string()))?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut voice) = voice.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(channels.max(1)) {
                        let sample = voice.next_sample(sample_rate);
                        frame.fill(sample);
                    }
                },
                |err| tracing::warn!(target: target::SESSION, "Audio stream error: {}", err),
                None,
            ),
            other => return Err(Error::Audio(format!("unsupported sample format {:?}", other))),
        }
        .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        Ok(stream)
    }

    pub fn is_audible(&self) -> bool {
        self._stream.is_some() && self.volume > 0.0
    }

    pub fn trigger_note(&mut self, note: u8, velocity: u8) {
        let level = self.volume * velocity.min(127) as f32 / 127.0;
        if let Ok(mut voice) = self.voice.lock() {
            voice.frequency = midi_note_to_frequency(note);
            voice.level = level;
        }
    }

    pub fn stop_note(&mut self) {
        if let Ok(mut voice) = self.voice.lock() {
            voice.level = 0.0;
        }
    }
}

fn midi_note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_frequencies() {
        assert!((midi_note_to_frequency(69) - 440.0).abs() < 1e-3);
        assert!((midi_note_to_frequency(57) - 220.0).abs() < 1e-3);
    }

    #[test]
    fn test_voice_decays_to_silence() {
        let mut voice = Voice {
            frequency: 440.0,
            phase: 0.0,
            level: 0.5,
        };
        let peak = (0..100)
            .map(|_| voice.next_sample(48_000.0).abs())
            .fold(0.0_f32, f32::max);
        assert!(peak > 0.1 && peak <= 0.5);
        for _ in 0..48_000 {
            voice.next_sample(48_000.0);
        }
        assert_eq!(voice.next_sample(48_000.0), 0.0);
    }

    #[test]
    fn test_silent_preview_is_inert() {
        let mut preview = NotePreview::silent();
        assert!(!preview.is_audible());
        preview.trigger_note(60, 100);
        preview.stop_note();
    }
}
