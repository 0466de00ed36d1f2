//! Note edits: pad toggles and the batch operations behind functions.
//!
//! Every edit keeps `start + duration <= loop_end`. A note that would run past
//! the loop end is shortened, never dropped; only a note that would *start*
//! at or past the loop end is refused.

use crate::host::{Beats, Host, HostError, Note, BEAT_EPSILON};
use crate::logging::target;

/// Velocity and pressure applied to notes written on a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expression {
    pub velocity: u8,
    pub pressure: f32,
}

impl Expression {
    pub fn new(velocity: u8, pressure: f32) -> Self {
        Self {
            velocity: velocity.min(127),
            pressure: pressure.clamp(0.0, 1.0),
        }
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::new(64, 0.0)
    }
}

/// Per-row knob overrides. `None` means the knob hasn't been touched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExpressionOverride {
    pub velocity: Option<u8>,
    pub pressure: Option<f32>,
}

impl ExpressionOverride {
    pub fn resolve(&self, defaults: Expression) -> Expression {
        Expression::new(
            self.velocity.unwrap_or(defaults.velocity),
            self.pressure.unwrap_or(defaults.pressure),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Toggle {
    Added(Note),
    Removed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopiedNote {
    pub note: Note,
    pub source_pitch: u8,
}

/// Notes captured by the last Copy execution, re-readable by any number of
/// pastes.
#[derive(Debug, Clone, Default)]
pub struct CopyBuffer {
    notes: Vec<CopiedNote>,
}

impl CopyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, source_pitch: u8, notes: &[Note]) {
        self.notes.clear();
        self.append(source_pitch, notes);
    }

    pub fn append(&mut self, source_pitch: u8, notes: &[Note]) {
        self.notes.extend(notes.iter().map(|note| CopiedNote {
            note: *note,
            source_pitch,
        }));
    }

    pub fn notes(&self) -> &[CopiedNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }
}

/// Shortens `note` to end at `loop_end`. Returns `None` when it starts at or
/// after the loop end.
pub fn clip_to_loop(mut note: Note, loop_end: Beats) -> Option<Note> {
    if note.start < 0.0 || note.start >= loop_end - BEAT_EPSILON {
        return None;
    }
    note.duration = note.duration.min(loop_end - note.start);
    Some(note)
}

/// Half-open window of `step` beats centred on `position`, cut at zero.
pub fn step_window(position: Beats, step: Beats) -> (Beats, Beats) {
    let from = (position - step / 2.0).max(0.0);
    let to = position + step / 2.0;
    (from, to - from)
}

/// Shared by toggling and the grid, so a lit cell is always the one a press
/// removes.
pub fn starts_near(note: &Note, position: Beats, step: Beats) -> bool {
    let (from, span) = step_window(position, step);
    note.start >= from - BEAT_EPSILON && note.start < from + span - BEAT_EPSILON
}

/// True if a note of `pitch` starts within half a step of `position`.
pub fn note_near(
    host: &impl Host,
    pitch: u8,
    position: Beats,
    step: Beats,
) -> Result<bool, HostError> {
    let (from, span) = step_window(position, step);
    Ok(!host.notes(pitch, from, span)?.is_empty())
}

pub fn add_note(host: &mut impl Host, note: Note, loop_end: Beats) -> Result<Note, HostError> {
    let clipped = clip_to_loop(note, loop_end).ok_or_else(|| {
        HostError::Rejected(format!("note at {} is outside the {} beat loop", note.start, loop_end))
    })?;
    if clipped.duration < note.duration {
        tracing::debug!(target: target::NOTES, "Clipped pitch {} at {} from {} to {} beats", note.pitch, note.start, note.duration, clipped.duration);
    }
    host.add_notes(&[clipped])?;
    Ok(clipped)
}

/// Pad press: removes the note near `position` if there is one, otherwise
/// adds a step-long note.
pub fn toggle_note(
    host: &mut impl Host,
    pitch: u8,
    position: Beats,
    step: Beats,
    loop_end: Beats,
    expression: Expression,
) -> Result<Toggle, HostError> {
    let (from, span) = step_window(position, step);
    let existing = host.notes(pitch, from, span)?;
    if !existing.is_empty() {
        host.remove_notes(pitch, from, span)?;
        tracing::debug!(target: target::NOTES, "Removed {} note(s) of pitch {} near {}", existing.len(), pitch, position);
        return Ok(Toggle::Removed(existing.len()));
    }

    let note = Note::new(pitch, position, step).with_expression(expression.velocity, expression.pressure);
    let added = add_note(host, note, loop_end)?;
    tracing::debug!(target: target::NOTES, "Added pitch {} at {} for {} beats", pitch, added.start, added.duration);
    Ok(Toggle::Added(added))
}

pub fn clear_row(host: &mut impl Host, pitch: u8, loop_end: Beats) -> Result<usize, HostError> {
    let count = host.notes(pitch, 0.0, loop_end)?.len();
    host.remove_notes(pitch, 0.0, loop_end)?;
    tracing::debug!(target: target::NOTES, "Cleared {} note(s) of pitch {}", count, pitch);
    Ok(count)
}

pub fn row_notes(host: &impl Host, pitch: u8, loop_end: Beats) -> Result<Vec<Note>, HostError> {
    host.notes(pitch, 0.0, loop_end)
}

/// Writes every buffered note on `pitch` at its original position. The row's
/// knob overrides, if set, replace the copied expression.
pub fn paste(
    host: &mut impl Host,
    buffer: &CopyBuffer,
    pitch: u8,
    loop_end: Beats,
    expression: ExpressionOverride,
) -> Result<usize, HostError> {
    if buffer.is_empty() {
        tracing::debug!(target: target::NOTES, "Nothing to paste on pitch {}", pitch);
        return Ok(0);
    }

    let notes: Vec<Note> = buffer
        .notes()
        .iter()
        .filter_map(|copied| {
            let mut note = copied.note;
            note.pitch = pitch;
            note.velocity = expression.velocity.unwrap_or(note.velocity);
            note.pressure = expression.pressure.unwrap_or(note.pressure);
            clip_to_loop(note, loop_end)
        })
        .collect();

    if notes.len() < buffer.len() {
        tracing::debug!(target: target::NOTES, "Skipped {} buffered note(s) outside the loop", buffer.len() - notes.len());
    }
    host.add_notes(&notes)?;
    tracing::debug!(target: target::NOTES, "Pasted {} note(s) on pitch {}", notes.len(), pitch);
    Ok(notes.len())
}

/// Replaces the row with back-to-back notes of `duration`, starting at 0.
/// The last note is shortened when the loop is not a multiple of `duration`.
pub fn fill(
    host: &mut impl Host,
    pitch: u8,
    duration: Beats,
    loop_end: Beats,
    expression: Expression,
) -> Result<usize, HostError> {
    if duration <= 0.0 || loop_end <= 0.0 {
        return Err(HostError::Rejected(format!(
            "cannot fill {} beats with {} beat notes",
            loop_end, duration
        )));
    }

    let count = ((loop_end / duration) - BEAT_EPSILON).ceil().max(1.0) as usize;
    let notes: Vec<Note> = (0..count)
        .filter_map(|k| {
            let note = Note::new(pitch, k as Beats * duration, duration)
                .with_expression(expression.velocity, expression.pressure);
            clip_to_loop(note, loop_end)
        })
        .collect();

    host.remove_notes(pitch, 0.0, loop_end)?;
    host.add_notes(&notes)?;
    tracing::debug!(target: target::NOTES, "Filled pitch {} with {} x {} beat notes", pitch, notes.len(), duration);
    Ok(notes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn starts(host: &MemoryHost, pitch: u8) -> Vec<f64> {
        let mut starts: Vec<f64> = host
            .notes_snapshot()
            .iter()
            .filter(|n| n.pitch == pitch)
            .map(|n| n.start)
            .collect();
        starts.sort_by(|a, b| a.total_cmp(b));
        starts
    }

    #[test]
    fn test_fill_quarters_on_one_bar() {
        let mut host = MemoryHost::new();
        let count = fill(&mut host, 36, 1.0, 4.0, Expression::default()).unwrap();
        assert_eq!(count, 4);
        assert_eq!(starts(&host, 36), vec![0.0, 1.0, 2.0, 3.0]);
        assert!(host.notes_snapshot().iter().all(|n| n.duration == 1.0));
    }

    #[test]
    fn test_fill_eighths_on_one_bar() {
        let mut host = MemoryHost::new();
        fill(&mut host, 60, 0.5, 4.0, Expression::default()).unwrap();
        assert_eq!(
            starts(&host, 60),
            vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]
        );
        assert!(host.notes_snapshot().iter().all(|n| n.duration == 0.5));
    }

    #[test]
    fn test_fill_overwrites_existing_and_leaves_other_pitches() {
        let mut host = MemoryHost::new().with_notes(vec![
            Note::new(36, 0.25, 0.1),
            Note::new(38, 1.0, 1.0),
        ]);
        fill(&mut host, 36, 4.0, 4.0, Expression::default()).unwrap();
        assert_eq!(starts(&host, 36), vec![0.0]);
        assert_eq!(starts(&host, 38), vec![1.0]);
    }

    #[test]
    fn test_fill_clips_last_note() {
        let mut host = MemoryHost::new();
        let count = fill(&mut host, 36, 4.0, 6.0, Expression::default()).unwrap();
        assert_eq!(count, 2);
        let last = host.notes_snapshot().iter().find(|n| n.start == 4.0).copied().unwrap();
        assert_eq!(last.duration, 2.0);
    }

    #[test]
    fn test_add_clips_to_loop_end() {
        let mut host = MemoryHost::new();
        let note = add_note(&mut host, Note::new(60, 2.0, 16.0), 16.0).unwrap();
        assert_eq!(note.duration, 14.0);

        let fits = add_note(&mut host, Note::new(62, 2.0, 8.0), 16.0).unwrap();
        assert_eq!(fits.duration, 8.0);
    }

    #[test]
    fn test_add_past_loop_end_is_refused() {
        let mut host = MemoryHost::new();
        assert!(add_note(&mut host, Note::new(60, 4.0, 1.0), 4.0).is_err());
        assert!(host.notes_snapshot().is_empty());
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut host = MemoryHost::new();
        let first = toggle_note(&mut host, 60, 1.0, 1.0, 4.0, Expression::new(100, 0.5)).unwrap();
        match first {
            Toggle::Added(note) => {
                assert_eq!(note.velocity, 100);
                assert_eq!(note.duration, 1.0);
            }
            other => panic!("expected add, got {:?}", other),
        }
        let second = toggle_note(&mut host, 60, 1.0, 1.0, 4.0, Expression::default()).unwrap();
        assert_eq!(second, Toggle::Removed(1));
        assert!(host.notes_snapshot().is_empty());
    }

    #[test]
    fn test_step_window_is_half_a_step() {
        let mut host = MemoryHost::new().with_notes(vec![Note::new(60, 1.3, 0.25)]);
        // within half a step of beat 1: removed, no duplicate added
        assert_eq!(
            toggle_note(&mut host, 60, 1.0, 1.0, 4.0, Expression::default()).unwrap(),
            Toggle::Removed(1)
        );
        // a note on the neighbouring step is not touched
        let mut host = MemoryHost::new().with_notes(vec![Note::new(60, 2.0, 1.0)]);
        assert!(matches!(
            toggle_note(&mut host, 60, 1.0, 1.0, 4.0, Expression::default()).unwrap(),
            Toggle::Added(_)
        ));
        assert_eq!(host.notes_snapshot().len(), 2);
    }

    #[test]
    fn test_note_near() {
        let host = MemoryHost::new().with_notes(vec![Note::new(40, 0.0, 0.25)]);
        assert!(note_near(&host, 40, 0.0, 0.5).unwrap());
        assert!(!note_near(&host, 40, 0.5, 0.5).unwrap());
        assert!(!note_near(&host, 41, 0.0, 0.5).unwrap());
    }

    #[test]
    fn test_clear_row() {
        let mut host = MemoryHost::new().with_notes(vec![
            Note::new(36, 0.0, 1.0),
            Note::new(36, 2.0, 1.0),
            Note::new(37, 0.0, 1.0),
        ]);
        assert_eq!(clear_row(&mut host, 36, 4.0).unwrap(), 2);
        assert_eq!(host.notes_snapshot().len(), 1);
    }

    #[test]
    fn test_copy_then_paste_rewrites_only_pitch() {
        let source = vec![
            Note::new(60, 0.5, 0.25).with_expression(90, 0.3),
            Note::new(60, 2.0, 1.5).with_expression(20, 0.9),
        ];
        let mut host = MemoryHost::new().with_notes(source.clone());
        let mut buffer = CopyBuffer::new();
        buffer.replace(60, &row_notes(&host, 60, 4.0).unwrap());
        assert_eq!(buffer.len(), 2);

        let pasted = paste(&mut host, &buffer, 67, 4.0, ExpressionOverride::default()).unwrap();
        assert_eq!(pasted, 2);
        let mut copies: Vec<Note> = host
            .notes_snapshot()
            .iter()
            .filter(|n| n.pitch == 67)
            .copied()
            .collect();
        copies.sort_by(|a, b| a.start.total_cmp(&b.start));
        for (copy, original) in copies.iter().zip(&source) {
            assert_eq!(copy.start, original.start);
            assert_eq!(copy.duration, original.duration);
            assert_eq!(copy.velocity, original.velocity);
            assert_eq!(copy.pressure, original.pressure);
        }
        // buffer survives for another paste
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_paste_uses_row_overrides() {
        let mut buffer = CopyBuffer::new();
        buffer.append(36, &[Note::new(36, 0.0, 1.0).with_expression(90, 0.3)]);
        let mut host = MemoryHost::new();
        let overrides = ExpressionOverride {
            velocity: Some(110),
            pressure: None,
        };
        paste(&mut host, &buffer, 38, 4.0, overrides).unwrap();
        let note = host.notes_snapshot()[0];
        assert_eq!(note.velocity, 110);
        assert_eq!(note.pressure, 0.3);
    }

    #[test]
    fn test_paste_empty_buffer_is_noop() {
        let mut host = MemoryHost::new();
        let buffer = CopyBuffer::new();
        assert_eq!(paste(&mut host, &buffer, 60, 4.0, ExpressionOverride::default()).unwrap(), 0);
        assert!(host.notes_snapshot().is_empty());
    }

    #[test]
    fn test_paste_into_shorter_loop_clips_and_skips() {
        let mut buffer = CopyBuffer::new();
        buffer.replace(
            60,
            &[Note::new(60, 3.0, 2.0), Note::new(60, 6.0, 1.0)],
        );
        let mut host = MemoryHost::new();
        assert_eq!(paste(&mut host, &buffer, 60, 4.0, ExpressionOverride::default()).unwrap(), 1);
        assert_eq!(host.notes_snapshot()[0].duration, 1.0);
    }
}
