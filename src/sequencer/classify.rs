//! Container classification: decides whether the selected clip is driven as
//! a drum kit, a melodic instrument or an audio recording.
//!
//! Checks run in priority order and the first one that matches wins:
//! audio clip, drum-capable device (also inside rack chains), known melodic
//! synth name, and finally a look at the notes already in the clip. Whenever
//! the evidence is thin the answer is melodic.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::host::{Beats, ClipKind, DeviceInfo, Host, HostError, Note, BEAT_EPSILON};
use crate::logging::target;
use crate::scale::{Key, ScaleId};

/// Canonical synth names. A device matches on its exact name, or when one of
/// these appears in its name as a whole word.
pub const MELODIC_DEVICES: &[&str] = &[
    "Collision",
    "Drift",
    "Meld",
    "Operator",
    "Poli",
    "Tension",
    "Wavetable",
    "Diva",
    "Massive",
    "Pigments",
    "Serum",
    "Sylenth",
    "Vital",
];

/// Names too generic to trust inside a longer, user-chosen device name.
pub const MELODIC_EXACT_ONLY: &[&str] = &["Analog", "Bass", "Electric"];

/// Pads navigated when a drum device reports no loaded pads.
pub const STANDARD_DRUM_RANGE: RangeInclusive<u8> = 36..=51;

/// General MIDI percussion area the note heuristic accepts as drums.
const DRUM_NOTE_RANGE: RangeInclusive<u8> = 35..=51;
const MIN_DRUM_EVIDENCE_NOTES: usize = 4;
const MAX_DRUM_DISTINCT_PITCHES: usize = 8;
const MAX_DRUM_HIT_LENGTH: Beats = 0.25;

/// Melodic sessions open on C3.
pub const MELODIC_ROW_BASE: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Drum {
        pad_count: usize,
        /// MIDI notes of loaded pads, in pad-index order.
        loaded_pads: Vec<u8>,
    },
    Melodic {
        key: Key,
    },
    Audio {
        duration_beats: Beats,
        channel_count: u8,
    },
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Drum { .. } => "drum",
            Mode::Melodic { .. } => "melodic",
            Mode::Audio { .. } => "audio",
        }
    }

    /// Number of navigable rows.
    pub fn row_count(&self) -> usize {
        match self {
            Mode::Drum { loaded_pads, .. } => loaded_pads.len(),
            Mode::Melodic { .. } => 128,
            Mode::Audio { .. } => super::view::ROWS,
        }
    }

    /// Pitch shown at a navigable row index. Audio rows carry no pitch.
    pub fn pitch_at(&self, index: usize) -> Option<u8> {
        match self {
            Mode::Drum { loaded_pads, .. } => loaded_pads.get(index).copied(),
            Mode::Melodic { .. } => u8::try_from(index).ok().filter(|p| *p <= 127),
            Mode::Audio { .. } => None,
        }
    }

    pub fn default_row_base(&self) -> usize {
        match self {
            Mode::Melodic { .. } => MELODIC_ROW_BASE,
            _ => 0,
        }
    }

    pub fn key(&self) -> Option<Key> {
        match self {
            Mode::Melodic { key } => Some(*key),
            _ => None,
        }
    }

    pub fn accepts_notes(&self) -> bool {
        !matches!(self, Mode::Audio { .. })
    }
}

/// Which check decided the mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    AudioClip,
    DrumDevice(String),
    MelodicDevice(String),
    NotesLookLikeDrums,
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub mode: Mode,
    pub reason: Reason,
}

pub fn classify(host: &impl Host) -> Result<Classification, HostError> {
    let clip = host.clip()?;

    if clip.kind == ClipKind::Audio {
        let mode = Mode::Audio {
            duration_beats: clip.length,
            channel_count: clip.channel_count.clamp(1, 2),
        };
        tracing::info!(target: target::CLASSIFY, "Audio clip '{}': {:.1} beats, {} channel(s)", clip.name, clip.length, clip.channel_count);
        return Ok(Classification {
            mode,
            reason: Reason::AudioClip,
        });
    }

    let devices = match host.devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!(target: target::CLASSIFY, "Device chain unreadable, skipping device checks: {}", e);
            Vec::new()
        }
    };

    if let Some(device) = find_drum_device(&devices) {
        let mut loaded_pads: Vec<u8> = Vec::new();
        for pad in device.drum_pads.iter().filter(|pad| pad.loaded) {
            if !loaded_pads.contains(&pad.note) {
                loaded_pads.push(pad.note);
            }
        }
        if loaded_pads.is_empty() {
            tracing::info!(target: target::CLASSIFY, "Drum device '{}' has no loaded pads, using standard range", device.name);
            loaded_pads = STANDARD_DRUM_RANGE.collect();
        } else {
            tracing::info!(target: target::CLASSIFY, "Drum device '{}': {} loaded pads", device.name, loaded_pads.len());
        }
        return Ok(Classification {
            mode: Mode::Drum {
                pad_count: device.drum_pads.len(),
                loaded_pads,
            },
            reason: Reason::DrumDevice(device.name.clone()),
        });
    }

    if let Some(device) = find_melodic_device(&devices) {
        tracing::info!(target: target::CLASSIFY, "Melodic device '{}'", device.name);
        return Ok(Classification {
            mode: Mode::Melodic { key: read_key(host) },
            reason: Reason::MelodicDevice(device.name.clone()),
        });
    }

    let notes = host.all_notes()?;
    if notes_look_like_drums(&notes) {
        tracing::info!(target: target::CLASSIFY, "Clip notes look like a drum pattern");
        let mut pads: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        pads.sort_unstable();
        pads.dedup();
        return Ok(Classification {
            mode: Mode::Drum {
                pad_count: pads.len(),
                loaded_pads: pads,
            },
            reason: Reason::NotesLookLikeDrums,
        });
    }

    tracing::info!(target: target::CLASSIFY, "No conclusive evidence ({} notes), defaulting to melodic", notes.len());
    Ok(Classification {
        mode: Mode::Melodic { key: read_key(host) },
        reason: Reason::Ambiguous,
    })
}

/// Current song key; an unreadable setting means every pitch is in scale.
pub fn read_key(host: &impl Host) -> Key {
    match host.scale() {
        Ok(setting) => Key::new(setting.root, ScaleId::from_name(&setting.name)),
        Err(e) => {
            tracing::warn!(target: target::CLASSIFY, "Scale unreadable, treating as chromatic: {}", e);
            Key::chromatic()
        }
    }
}

fn find_drum_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    for device in devices {
        if device.can_have_drum_pads {
            return Some(device);
        }
        for chain in &device.chains {
            if let Some(found) = find_drum_device(chain) {
                return Some(found);
            }
        }
    }
    None
}

fn is_melodic_name(name: &str) -> bool {
    let exact = |synth: &&str| name.eq_ignore_ascii_case(synth);
    if MELODIC_DEVICES.iter().chain(MELODIC_EXACT_ONLY).any(exact) {
        return true;
    }
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| MELODIC_DEVICES.iter().any(|synth| word.eq_ignore_ascii_case(synth)))
}

fn find_melodic_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    for device in devices {
        if is_melodic_name(&device.name) {
            return Some(device);
        }
        for chain in &device.chains {
            if let Some(found) = find_melodic_device(chain) {
                return Some(found);
            }
        }
    }
    None
}

/// Drums only on strong evidence: enough short hits on a handful of pitches,
/// all inside the percussion area.
fn notes_look_like_drums(notes: &[Note]) -> bool {
    if notes.len() < MIN_DRUM_EVIDENCE_NOTES {
        return false;
    }
    let pitches: BTreeSet<u8> = notes.iter().map(|n| n.pitch).collect();
    let (Some(&lowest), Some(&highest)) = (pitches.first(), pitches.last()) else {
        return false;
    };
    pitches.len() <= MAX_DRUM_DISTINCT_PITCHES
        && DRUM_NOTE_RANGE.contains(&lowest)
        && DRUM_NOTE_RANGE.contains(&highest)
        && notes
            .iter()
            .all(|n| n.duration <= MAX_DRUM_HIT_LENGTH + BEAT_EPSILON)
}
