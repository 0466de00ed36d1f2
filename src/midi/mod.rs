pub mod apc40;

/// Controller I/O using midir
use std::sync::mpsc::Sender;

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use crate::color::Color;
use crate::error::{Error, Result};
use crate::logging::target;
use crate::sequencer::{Event, LedSink, LedTarget};

/// Index of the first port whose name contains `pattern` (case-insensitive).
pub fn find_port(names: &[String], pattern: &str) -> Option<usize> {
    let pattern = pattern.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&pattern))
}

pub fn input_ports() -> Vec<String> {
    if let Ok(midi_in) = MidiInput::new("padseq port scan") {
        midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect()
    } else {
        vec![]
    }
}

pub fn output_ports() -> Vec<String> {
    if let Ok(midi_out) = MidiOutput::new("padseq port scan") {
        midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect()
    } else {
        vec![]
    }
}

/// LED side of the controller.
pub struct ControllerOutput {
    connection: Option<MidiOutputConnection>,
}

impl ControllerOutput {
    /// A sink that drops every message, for running without hardware.
    pub fn disconnected() -> Self {
        Self { connection: None }
    }

    pub fn connect(client_name: &str, pattern: &str) -> Result<Self> {
        let midi_out = MidiOutput::new(client_name)
            .map_err(|e| Error::Midi(format!("failed to create MIDI output: {}", e)))?;

        let ports = midi_out.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_default())
            .collect();
        let index = find_port(&names, pattern).ok_or_else(|| Error::PortNotFound(pattern.to_string()))?;

        let connection = midi_out
            .connect(&ports[index], "padseq-leds")
            .map_err(|e| Error::Midi(format!("failed to connect: {}", e)))?;
        tracing::info!(target: target::MIDI, "LED output on {:?}", names[index]);

        let mut output = Self {
            connection: Some(connection),
        };
        output.send(&apc40::ABLETON_MODE_SYSEX)?;
        Ok(output)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(bytes)
                .map_err(|e| Error::Midi(format!("failed to send: {}", e)))?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }
}

impl LedSink for ControllerOutput {
    fn set_led(&mut self, target: LedTarget, color: Color) {
        let Some(bytes) = apc40::encode(target, color) else {
            tracing::warn!(target: target::MIDI, "No LED address for {:?}", target);
            return;
        };
        if let Err(e) = self.send(&bytes) {
            tracing::warn!(target: target::MIDI, "LED update dropped: {}", e);
        }
    }

    fn set_ring(&mut self, knob: usize, value: u8) {
        let Some(bytes) = apc40::encode_ring(knob, value) else {
            return;
        };
        if let Err(e) = self.send(&bytes) {
            tracing::warn!(target: target::MIDI, "Knob ring update dropped: {}", e);
        }
    }
}

/// Button side of the controller. Decoded presses go straight onto the
/// sequencer's event queue; the connection lives as long as this value.
pub struct ControllerInput {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl ControllerInput {
    pub fn connect(client_name: &str, pattern: &str, events: Sender<Event>) -> Result<Self> {
        let mut midi_in = MidiInput::new(client_name)
            .map_err(|e| Error::Midi(format!("failed to create MIDI input: {}", e)))?;
        midi_in.ignore(Ignore::All);

        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_default())
            .collect();
        let index = find_port(&names, pattern).ok_or_else(|| Error::PortNotFound(pattern.to_string()))?;
        let port_name = names[index].clone();

        let connection = midi_in
            .connect(
                &ports[index],
                "padseq-buttons",
                move |_, message, _| {
                    if let Some(control) = apc40::decode(message) {
                        tracing::trace!(target: target::MIDI, "{:02X?} -> {:?}", message, control);
                        // receiver gone means we are shutting down
                        let _ = events.send(Event::Control(control));
                    }
                },
                (),
            )
            .map_err(|e| Error::Midi(format!("failed to connect: {}", e)))?;
        tracing::info!(target: target::MIDI, "Button input on {:?}", port_name);

        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_port_by_substring() {
        let names = vec![
            "Midi Through Port-0".to_string(),
            "APC40 mkII:APC40 mkII MIDI 1 20:0".to_string(),
        ];
        assert_eq!(find_port(&names, "APC40"), Some(1));
        assert_eq!(find_port(&names, "apc40 MKII"), Some(1));
        assert_eq!(find_port(&names, "Launchpad"), None);
    }

    #[test]
    fn test_midi_note_name() {
        assert_eq!(midi_note_name(60), "C4");
        assert_eq!(midi_note_name(61), "C#4");
        assert_eq!(midi_note_name(36), "C2");
    }

    #[test]
    fn test_disconnected_output_swallows_leds() {
        let mut output = ControllerOutput::disconnected();
        assert!(!output.is_connected());
        output.set_led(LedTarget::Master, Color::GREEN);
        output.set_ring(2, 90);
        assert!(output.send(&[0x90, 80, 1]).is_ok());
    }
}
