/// In-memory host: one clip, a device chain, a song scale and a free-running
/// transport. Backs the standalone binary and the tests.
use super::{
    Beats, ClipInfo, DeviceInfo, Host, HostError, Note, ScaleSetting, Transport, BEAT_EPSILON,
};

#[derive(Debug, Clone)]
pub struct MemoryHost {
    clip: Option<ClipInfo>,
    notes: Vec<Note>,
    devices: Vec<DeviceInfo>,
    scale: ScaleSetting,
    position: Beats,
    bpm: f64,
    is_playing: bool,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            clip: Some(ClipInfo::midi("Clip", 4.0)),
            notes: Vec::new(),
            devices: Vec::new(),
            scale: ScaleSetting {
                root: 0,
                name: "Major".to_string(),
            },
            position: 0.0,
            bpm: 120.0,
            is_playing: false,
        }
    }

    pub fn with_clip(mut self, clip: ClipInfo) -> Self {
        self.clip = Some(clip);
        self
    }

    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    pub fn with_notes(mut self, notes: Vec<Note>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_scale(mut self, root: u8, name: &str) -> Self {
        self.scale = ScaleSetting {
            root: root % 12,
            name: name.to_string(),
        };
        self
    }

    /// Simulates the clip being deleted from under the sequencer.
    pub fn remove_clip(&mut self) {
        self.clip = None;
        self.notes.clear();
    }

    pub fn notes_snapshot(&self) -> &[Note] {
        &self.notes
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm.clamp(40.0, 240.0);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn start(&mut self) {
        self.is_playing = true;
    }

    pub fn stop(&mut self) {
        self.is_playing = false;
        self.position = 0.0;
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing {
            self.stop();
        } else {
            self.start();
        }
    }

    pub fn set_position(&mut self, position: Beats) {
        self.position = self.wrap(position);
    }

    /// Moves the transport forward by `seconds` of wall time and returns the
    /// notes whose start was crossed, in start order.
    pub fn advance(&mut self, seconds: f64) -> Vec<Note> {
        if !self.is_playing || seconds <= 0.0 {
            return Vec::new();
        }
        let loop_len = self.loop_len();
        if loop_len <= BEAT_EPSILON {
            return Vec::new();
        }
        let from = self.position;
        let to = from + seconds * self.bpm / 60.0;

        let mut crossed: Vec<Note> = if to < loop_len {
            self.notes
                .iter()
                .filter(|n| n.start >= from && n.start < to)
                .copied()
                .collect()
        } else {
            let wrapped = to - loop_len;
            self.notes
                .iter()
                .filter(|n| n.start >= from || n.start < wrapped)
                .copied()
                .collect()
        };
        crossed.sort_by(|a, b| a.start.total_cmp(&b.start));

        self.position = self.wrap(to);
        crossed
    }

    fn loop_len(&self) -> Beats {
        self.clip.as_ref().map(|c| c.loop_length()).unwrap_or(0.0)
    }

    fn wrap(&self, position: Beats) -> Beats {
        let loop_len = self.loop_len();
        if loop_len <= BEAT_EPSILON {
            0.0
        } else {
            position.rem_euclid(loop_len)
        }
    }

    fn require_clip(&self) -> Result<&ClipInfo, HostError> {
        self.clip.as_ref().ok_or(HostError::ClipUnavailable)
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

fn starts_in(note: &Note, pitch: u8, from: Beats, span: Beats) -> bool {
    note.pitch == pitch && note.start >= from - BEAT_EPSILON && note.start < from + span - BEAT_EPSILON
}

impl Host for MemoryHost {
    fn clip(&self) -> Result<ClipInfo, HostError> {
        self.require_clip().cloned()
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>, HostError> {
        Ok(self.devices.clone())
    }

    fn scale(&self) -> Result<ScaleSetting, HostError> {
        Ok(self.scale.clone())
    }

    fn set_scale(&mut self, setting: ScaleSetting) -> Result<(), HostError> {
        self.scale = ScaleSetting {
            root: setting.root % 12,
            name: setting.name,
        };
        Ok(())
    }

    fn notes(&self, pitch: u8, from: Beats, span: Beats) -> Result<Vec<Note>, HostError> {
        self.require_clip()?;
        let mut notes: Vec<Note> = self
            .notes
            .iter()
            .filter(|n| starts_in(n, pitch, from, span))
            .copied()
            .collect();
        notes.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(notes)
    }

    fn all_notes(&self) -> Result<Vec<Note>, HostError> {
        self.require_clip()?;
        Ok(self.notes.clone())
    }

    fn add_notes(&mut self, notes: &[Note]) -> Result<(), HostError> {
        self.require_clip()?;
        for note in notes {
            if note.duration <= 0.0 || note.pitch > 127 {
                return Err(HostError::Rejected(format!("invalid note {:?}", note)));
            }
        }
        self.notes.extend_from_slice(notes);
        Ok(())
    }

    fn remove_notes(&mut self, pitch: u8, from: Beats, span: Beats) -> Result<(), HostError> {
        self.require_clip()?;
        self.notes.retain(|n| !starts_in(n, pitch, from, span));
        Ok(())
    }

    fn set_note_expression(
        &mut self,
        pitch: u8,
        from: Beats,
        span: Beats,
        velocity: Option<u8>,
        pressure: Option<f32>,
    ) -> Result<usize, HostError> {
        self.require_clip()?;
        let mut touched = 0;
        for note in self.notes.iter_mut().filter(|n| starts_in(n, pitch, from, span)) {
            if let Some(velocity) = velocity {
                note.velocity = velocity.min(127);
            }
            if let Some(pressure) = pressure {
                note.pressure = pressure.clamp(0.0, 1.0);
            }
            touched += 1;
        }
        Ok(touched)
    }

    fn transport(&self) -> Result<Transport, HostError> {
        Ok(Transport {
            playing: self.is_playing,
            position: self.position,
            tempo: self.bpm,
        })
    }

    fn set_loop(&mut self, start: Beats, end: Beats) -> Result<(), HostError> {
        if end <= start {
            return Err(HostError::Rejected(format!("empty loop {start}..{end}")));
        }
        let clip = self.clip.as_mut().ok_or(HostError::ClipUnavailable)?;
        clip.loop_start = start;
        clip.loop_end = end;
        clip.length = clip.length.max(end);
        self.position = self.wrap(self.position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_window_is_half_open() {
        let host = MemoryHost::new().with_notes(vec![
            Note::new(60, 0.0, 1.0),
            Note::new(60, 1.0, 1.0),
            Note::new(62, 0.5, 1.0),
        ]);
        let found = host.notes(60, 0.0, 1.0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 0.0);
    }

    #[test]
    fn test_remove_only_touches_pitch() {
        let mut host = MemoryHost::new().with_notes(vec![
            Note::new(60, 0.0, 1.0),
            Note::new(62, 0.0, 1.0),
        ]);
        host.remove_notes(60, 0.0, 4.0).unwrap();
        assert_eq!(host.notes_snapshot().len(), 1);
        assert_eq!(host.notes_snapshot()[0].pitch, 62);
    }

    #[test]
    fn test_note_expression_only_inside_window() {
        let mut host = MemoryHost::new().with_notes(vec![
            Note::new(60, 0.0, 1.0),
            Note::new(60, 1.0, 1.0),
            Note::new(62, 1.0, 1.0),
        ]);
        let touched = host.set_note_expression(60, 1.0, 1.0, Some(100), None).unwrap();
        assert_eq!(touched, 1);
        let velocities: Vec<u8> = host.notes_snapshot().iter().map(|n| n.velocity).collect();
        assert_eq!(velocities, vec![64, 100, 64]);

        host.set_note_expression(60, 0.0, 4.0, None, Some(2.0)).unwrap();
        assert_eq!(host.notes_snapshot()[0].pressure, 1.0);
        assert_eq!(host.notes_snapshot()[1].velocity, 100);
        assert_eq!(host.notes_snapshot()[2].pressure, 0.0);
    }

    #[test]
    fn test_missing_clip_is_reported() {
        let mut host = MemoryHost::new();
        host.remove_clip();
        assert_eq!(host.clip(), Err(HostError::ClipUnavailable));
        assert!(host.add_notes(&[Note::new(60, 0.0, 1.0)]).is_err());
    }

    #[test]
    fn test_advance_wraps_and_reports_crossed_notes() {
        let mut host = MemoryHost::new().with_notes(vec![
            Note::new(36, 0.0, 0.25),
            Note::new(36, 3.0, 0.25),
        ]);
        host.start();
        host.set_position(2.5);
        // 120 bpm: one second is two beats
        let crossed = host.advance(1.0);
        assert_eq!(crossed.len(), 2);
        assert!((host.transport().unwrap().position - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_stopped_transport_does_not_move() {
        let mut host = MemoryHost::new();
        assert!(host.advance(1.0).is_empty());
        assert_eq!(host.transport().unwrap().position, 0.0);
    }

    #[test]
    fn test_set_bpm_clamps() {
        let mut host = MemoryHost::new();
        host.set_bpm(400.0);
        assert_eq!(host.bpm(), 240.0);
    }
}
