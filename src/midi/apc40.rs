//! APC40 mkII wire codec (Ableton mode).
//!
//! Every button is a note on a fixed note number; the per-track buttons reuse
//! one note number across channels 0-7. LED feedback is a note-on back to the
//! same address with the color in the velocity byte.

use midly::live::LiveEvent;
use midly::num::{u4, u7};
use midly::MidiMessage;

use crate::color::Color;
use crate::sequencer::view::{ROWS, STEPS_PER_PAGE};
use crate::sequencer::{ControlEvent, LedTarget};

pub const PAD_TOP_ROW: u8 = 32;
pub const TRACK_SELECT: u8 = 51;
pub const CLIP_STOP: u8 = 52;
pub const DEVICE_PREV: u8 = 58;
pub const DEVICE_NEXT: u8 = 59;
pub const MASTER: u8 = 80;
pub const STOP_ALL: u8 = 81;
pub const SCENE_FIRST: u8 = 82;
pub const USER: u8 = 89;
pub const PLAY: u8 = 91;
pub const UP: u8 = 94;
pub const DOWN: u8 = 95;
pub const RIGHT: u8 = 96;
pub const LEFT: u8 = 97;
pub const SHIFT: u8 = 98;
pub const DEVICE_KNOB_FIRST: u8 = 16;
pub const DEVICE_KNOBS: u8 = 8;
/// LED ring around device knob n answers on CC 24 + n.
pub const KNOB_RING_FIRST: u8 = 24;

/// Switches the controller into Ableton Live mode (mode byte 0x41).
pub const ABLETON_MODE_SYSEX: [u8; 12] = [
    0xF0, 0x47, 0x7F, 0x29, 0x60, 0x00, 0x04, 0x41, 0x09, 0x07, 0x01, 0xF7,
];

/// Single-color buttons only know off, on and blink.
const LAMP_OFF: u8 = 0;
const LAMP_ON: u8 = 1;

pub fn pad_note(row: usize, column: usize) -> Option<u8> {
    if row >= ROWS || column >= STEPS_PER_PAGE {
        return None;
    }
    Some(PAD_TOP_ROW + column as u8 - 8 * row as u8)
}

fn pad_position(note: u8) -> Option<(usize, usize)> {
    if note > PAD_TOP_ROW + 7 {
        return None;
    }
    let row = ROWS - 1 - (note / 8) as usize;
    let column = (note % 8) as usize;
    Some((row, column))
}

/// Decodes one raw message. Releases are dropped except for Shift.
pub fn decode(bytes: &[u8]) -> Option<ControlEvent> {
    let LiveEvent::Midi { channel, message } = LiveEvent::parse(bytes).ok()? else {
        return None;
    };
    let channel = u8::from(channel);
    match message {
        MidiMessage::NoteOn { key, vel } if u8::from(vel) > 0 => decode_note(channel, key.into(), true),
        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
            decode_note(channel, key.into(), false)
        }
        MidiMessage::Controller { controller, value } => {
            let controller = u8::from(controller);
            if (DEVICE_KNOB_FIRST..DEVICE_KNOB_FIRST + DEVICE_KNOBS).contains(&controller) {
                Some(ControlEvent::DeviceKnob {
                    index: (controller - DEVICE_KNOB_FIRST) as usize,
                    value: value.into(),
                })
            } else {
                None
            }
        }
        _ => None,
    }
}

fn decode_note(channel: u8, note: u8, pressed: bool) -> Option<ControlEvent> {
    if note == SHIFT {
        return Some(ControlEvent::Shift(pressed));
    }
    if !pressed {
        return None;
    }
    let track = channel as usize;
    let event = match note {
        0..=39 => {
            let (row, column) = pad_position(note)?;
            ControlEvent::Pad { row, column }
        }
        TRACK_SELECT if track < 8 => ControlEvent::TrackSelect(track),
        CLIP_STOP if track < 8 => ControlEvent::ClipStop(track),
        DEVICE_PREV => ControlEvent::PrevDevice,
        DEVICE_NEXT => ControlEvent::NextDevice,
        MASTER => ControlEvent::Master,
        STOP_ALL => ControlEvent::StopAll,
        n if (SCENE_FIRST..SCENE_FIRST + ROWS as u8).contains(&n) => {
            ControlEvent::Scene((n - SCENE_FIRST) as usize)
        }
        USER => ControlEvent::User,
        PLAY => ControlEvent::Play,
        UP => ControlEvent::Up,
        DOWN => ControlEvent::Down,
        RIGHT => ControlEvent::Right,
        LEFT => ControlEvent::Left,
        _ => return None,
    };
    Some(event)
}

fn lamp(color: Color) -> u8 {
    if color.is_off() {
        LAMP_OFF
    } else {
        LAMP_ON
    }
}

/// Channel, note and velocity of the LED message for `target`.
pub fn led_address(target: LedTarget, color: Color) -> Option<(u8, u8, u8)> {
    let address = match target {
        LedTarget::Pad { row, column } => (0, pad_note(row, column)?, color.0),
        LedTarget::TrackSelect(i) if i < 8 => (i as u8, TRACK_SELECT, lamp(color)),
        LedTarget::ClipStop(i) if i < 8 => (i as u8, CLIP_STOP, lamp(color)),
        LedTarget::Master => (0, MASTER, lamp(color)),
        LedTarget::StopAll => (0, STOP_ALL, lamp(color)),
        LedTarget::Scene(row) if row < ROWS => (0, SCENE_FIRST + row as u8, color.0),
        _ => return None,
    };
    Some(address)
}

pub fn encode(target: LedTarget, color: Color) -> Option<Vec<u8>> {
    let (channel, note, velocity) = led_address(target, color)?;
    let event = LiveEvent::Midi {
        channel: u4::new(channel & 0x0F),
        message: MidiMessage::NoteOn {
            key: u7::new(note & 0x7F),
            vel: u7::new(velocity & 0x7F),
        },
    };
    let mut bytes = Vec::with_capacity(3);
    event.write_std(&mut bytes).ok()?;
    Some(bytes)
}

/// Ring position message for device knob `index`.
pub fn encode_ring(index: usize, value: u8) -> Option<Vec<u8>> {
    if index >= DEVICE_KNOBS as usize {
        return None;
    }
    let event = LiveEvent::Midi {
        channel: u4::new(0),
        message: MidiMessage::Controller {
            controller: u7::new(KNOB_RING_FIRST + index as u8),
            value: u7::new(value.min(127)),
        },
    };
    let mut bytes = Vec::with_capacity(3);
    event.write_std(&mut bytes).ok()?;
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_layout() {
        assert_eq!(pad_note(0, 0), Some(32));
        assert_eq!(pad_note(4, 7), Some(7));
        assert_eq!(pad_note(5, 0), None);
        assert_eq!(decode(&[0x90, 32, 127]), Some(ControlEvent::Pad { row: 0, column: 0 }));
        assert_eq!(decode(&[0x90, 7, 127]), Some(ControlEvent::Pad { row: 4, column: 7 }));
        assert_eq!(decode(&[0x90, 19, 127]), Some(ControlEvent::Pad { row: 2, column: 3 }));
    }

    #[test]
    fn test_track_buttons_use_channel() {
        assert_eq!(decode(&[0x93, TRACK_SELECT, 127]), Some(ControlEvent::TrackSelect(3)));
        assert_eq!(decode(&[0x97, CLIP_STOP, 127]), Some(ControlEvent::ClipStop(7)));
        assert_eq!(decode(&[0x90, MASTER, 127]), Some(ControlEvent::Master));
        assert_eq!(decode(&[0x90, SCENE_FIRST + 4, 127]), Some(ControlEvent::Scene(4)));
    }

    #[test]
    fn test_releases_ignored_except_shift() {
        assert_eq!(decode(&[0x80, MASTER, 0]), None);
        assert_eq!(decode(&[0x90, 32, 0]), None);
        assert_eq!(decode(&[0x90, SHIFT, 127]), Some(ControlEvent::Shift(true)));
        assert_eq!(decode(&[0x80, SHIFT, 64]), Some(ControlEvent::Shift(false)));
    }

    #[test]
    fn test_device_knobs() {
        assert_eq!(
            decode(&[0xB0, 18, 99]),
            Some(ControlEvent::DeviceKnob { index: 2, value: 99 })
        );
        assert_eq!(decode(&[0xB0, 48, 99]), None);
        assert_eq!(decode(&[0xF8]), None);
    }

    #[test]
    fn test_led_encoding() {
        assert_eq!(
            encode(LedTarget::Pad { row: 1, column: 2 }, Color::GREEN),
            Some(vec![0x90, 26, 21])
        );
        assert_eq!(
            encode(LedTarget::TrackSelect(5), Color::ORANGE),
            Some(vec![0x95, TRACK_SELECT, 1])
        );
        assert_eq!(encode(LedTarget::StopAll, Color::OFF), Some(vec![0x90, STOP_ALL, 0]));
        assert_eq!(encode(LedTarget::Scene(9), Color::RED), None);
    }

    #[test]
    fn test_knob_ring_encoding() {
        assert_eq!(encode_ring(0, 64), Some(vec![0xB0, 24, 64]));
        assert_eq!(encode_ring(7, 200), Some(vec![0xB0, 31, 127]));
        assert_eq!(encode_ring(8, 10), None);
    }
}
