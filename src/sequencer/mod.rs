//! Step sequencer session: owns every piece of sequencer state, dispatches
//! controller events and ticks, and keeps the controller LEDs in sync.
//!
//! Handlers run one at a time in arrival order. A handler whose host call
//! fails logs the error and returns without touching sequencer state.

pub mod classify;
pub mod editor;
pub mod functions;
pub mod grid;
pub mod playback;
pub mod playhead;
pub mod view;

use std::collections::{HashMap, HashSet};

use crate::color::Color;
use crate::host::{Beats, Host, HostError};
use crate::logging::target;

use classify::Mode;
use editor::{CopyBuffer, Expression, ExpressionOverride};
use functions::{ExecContext, Feedback, FunctionSystem, Outcome, RowTarget};
use grid::{Frame, RenderContext, TRACK_BUTTONS};
use playhead::Playhead;
use view::{ViewState, BEATS_PER_BAR, LOOP_BARS, QUARTER_NOTE_INDEX, ROWS, STEPS_PER_PAGE};

/// Presses and control changes coming from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Pad { row: usize, column: usize },
    TrackSelect(usize),
    Master,
    ClipStop(usize),
    StopAll,
    Scene(usize),
    Shift(bool),
    Left,
    Right,
    Up,
    Down,
    PrevDevice,
    NextDevice,
    DeviceKnob { index: usize, value: u8 },
    User,
    Play,
}

/// Everything the single consumer loop handles, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tick,
    Control(ControlEvent),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedTarget {
    Pad { row: usize, column: usize },
    TrackSelect(usize),
    Master,
    ClipStop(usize),
    StopAll,
    Scene(usize),
}

impl LedTarget {
    /// Every LED the sequencer drives.
    pub fn all() -> impl Iterator<Item = LedTarget> {
        let pads = (0..ROWS)
            .flat_map(|row| (0..STEPS_PER_PAGE).map(move |column| LedTarget::Pad { row, column }));
        let tracks = (0..TRACK_BUTTONS).map(LedTarget::TrackSelect);
        let stops = (0..TRACK_BUTTONS).map(LedTarget::ClipStop);
        let scenes = (0..ROWS).map(LedTarget::Scene);
        pads.chain(tracks)
            .chain(stops)
            .chain(scenes)
            .chain([LedTarget::Master, LedTarget::StopAll])
    }
}

pub trait LedSink {
    fn set_led(&mut self, target: LedTarget, color: Color);

    /// Position (0-127) of the LED ring around device knob `knob`.
    fn set_ring(&mut self, knob: usize, value: u8);
}

/// Remembers every LED write; backs the mirror window and the tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingLeds {
    updates: Vec<(LedTarget, Color)>,
    state: HashMap<LedTarget, Color>,
    rings: HashMap<usize, u8>,
}

impl RecordingLeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(&self, target: LedTarget) -> Color {
        self.state.get(&target).copied().unwrap_or(Color::OFF)
    }

    pub fn pad(&self, row: usize, column: usize) -> Color {
        self.color(LedTarget::Pad { row, column })
    }

    pub fn ring(&self, knob: usize) -> Option<u8> {
        self.rings.get(&knob).copied()
    }

    /// Writes since the last call.
    pub fn take(&mut self) -> Vec<(LedTarget, Color)> {
        std::mem::take(&mut self.updates)
    }
}

impl LedSink for RecordingLeds {
    fn set_led(&mut self, target: LedTarget, color: Color) {
        self.updates.push((target, color));
        self.state.insert(target, color);
    }

    fn set_ring(&mut self, knob: usize, value: u8) {
        self.rings.insert(knob, value);
    }
}

struct Session {
    mode: Mode,
    view: ViewState,
    functions: FunctionSystem,
    playhead: Playhead,
    playing_page: Option<usize>,
    /// Knob values per pitch.
    expression: HashMap<u8, ExpressionOverride>,
    /// Window of the last pressed step; knobs edit the notes in it.
    focus: Option<(Beats, Beats)>,
    base: Frame,
}

impl Session {
    fn pitch_at_row(&self, row: usize) -> Option<u8> {
        self.mode.pitch_at(self.view.row_index(row))
    }

    fn render_context<'a>(&'a self) -> RenderContext<'a> {
        RenderContext {
            mode: &self.mode,
            view: &self.view,
            alerts: self.playhead.alerts(),
            blink_lit: self.playhead.blink_lit(),
            playing_page: self.playing_page,
        }
    }

    /// Clip-stop row only; needs no host access.
    fn repaint_pages(&mut self) {
        let pages = self.view.page_count();
        let visible = self.view.time_page();
        for (page, led) in self.base.clip_stop.iter_mut().enumerate() {
            *led = grid::page_color(page, pages, visible, self.playing_page, self.playhead.blink_lit());
        }
    }
}

pub struct StepSequencer {
    defaults: Expression,
    session: Option<Session>,
    shift: bool,
    copy_buffer: CopyBuffer,
    feedback: Feedback,
    shown: HashMap<LedTarget, Color>,
}

impl StepSequencer {
    pub fn new(defaults: Expression) -> Self {
        Self {
            defaults,
            session: None,
            shift: false,
            copy_buffer: CopyBuffer::new(),
            feedback: Feedback::default(),
            shown: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn mode(&self) -> Option<&Mode> {
        self.session.as_ref().map(|s| &s.mode)
    }

    pub fn view(&self) -> Option<&ViewState> {
        self.session.as_ref().map(|s| &s.view)
    }

    pub fn functions(&self) -> Option<&FunctionSystem> {
        self.session.as_ref().map(|s| &s.functions)
    }

    pub fn playhead(&self) -> Option<&Playhead> {
        self.session.as_ref().map(|s| &s.playhead)
    }

    pub fn copy_buffer(&self) -> &CopyBuffer {
        &self.copy_buffer
    }

    /// Classifies the clip and lights the grid. Stays inactive when the clip
    /// cannot be read.
    pub fn enter(&mut self, host: &mut impl Host, leds: &mut impl LedSink) -> bool {
        let classification = match classify::classify(&*host) {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!(target: target::SESSION, "Cannot enter sequencer: {}", e);
                return false;
            }
        };
        let mode = classification.mode;
        let mut view = ViewState::new(mode.default_row_base());

        if let Err(e) = prepare_loop(host, &mode, &mut view) {
            tracing::warn!(target: target::SESSION, "Cannot enter sequencer: {}", e);
            return false;
        }

        tracing::info!(target: target::SESSION, "Entered {} sequencer ({:?}), loop {} bars, step {} beats", mode.name(), classification.reason, view.loop_bars(), view.step_beats());
        if let Some(key) = mode.key() {
            tracing::debug!(target: target::CLASSIFY, "Key root {}, {:?}", key.root_name(), key.scale);
        }
        self.session = Some(Session {
            mode,
            view,
            functions: FunctionSystem::new(),
            playhead: Playhead::new(),
            playing_page: None,
            expression: HashMap::new(),
            focus: None,
            base: Frame::blank(),
        });
        self.feedback = Feedback::default();
        self.shown.clear();
        self.refresh(host, leds);
        true
    }

    pub fn exit(&mut self, leds: &mut impl LedSink) {
        if self.session.take().is_none() {
            return;
        }
        for target in LedTarget::all() {
            leds.set_led(target, Color::OFF);
        }
        self.shown.clear();
        self.copy_buffer.clear();
        self.feedback = Feedback::default();
        self.shift = false;
        tracing::info!(target: target::SESSION, "Left sequencer");
    }

    pub fn handle(&mut self, event: ControlEvent, host: &mut impl Host, leds: &mut impl LedSink) {
        match event {
            ControlEvent::User => {
                if self.is_active() {
                    self.exit(leds);
                } else {
                    self.enter(host, leds);
                }
                return;
            }
            ControlEvent::Shift(pressed) => {
                self.shift = pressed;
                return;
            }
            _ => {}
        }
        if !self.is_active() {
            return;
        }

        let result = match event {
            ControlEvent::Pad { row, column } => self.on_pad(row, column, host),
            ControlEvent::TrackSelect(index) => Ok(self.on_note_length(index)),
            ControlEvent::ClipStop(index) => self.on_loop_length(index, host),
            ControlEvent::Master => self.on_execute(host),
            ControlEvent::StopAll => Ok(self.with_session(|s| {
                s.functions.cycle();
            })),
            ControlEvent::Scene(row) => Ok(self.with_session(|s| {
                s.functions.toggle_row(row);
            })),
            ControlEvent::Left => Ok(self.navigate(|view| view.page_left())),
            ControlEvent::Right => Ok(self.navigate(|view| view.page_right())),
            ControlEvent::Up => Ok(self.on_row_up()),
            ControlEvent::Down => Ok(self.navigate(|view| view.row_down())),
            ControlEvent::PrevDevice => Ok(self.on_select_step(false)),
            ControlEvent::NextDevice => Ok(self.on_select_step(true)),
            ControlEvent::DeviceKnob { index, value } => self.on_knob(index, value, host, leds),
            ControlEvent::Play | ControlEvent::User | ControlEvent::Shift(_) => Ok(false),
        };

        match result {
            Ok(true) => self.refresh(host, leds),
            Ok(false) => self.flush(leds),
            Err(e) => {
                tracing::warn!(target: target::SESSION, "{:?} aborted: {}", event, e);
            }
        }
    }

    pub fn tick(&mut self, host: &mut impl Host, leds: &mut impl LedSink) {
        let mut dirty = self.feedback.tick().is_some();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        dirty |= session.functions.tick_preview();

        let transport = match host.transport() {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!(target: target::PLAYHEAD, "Transport unreadable: {}", e);
                if dirty {
                    self.flush(leds);
                }
                return;
            }
        };

        let mut rerender = false;
        if !matches!(session.mode, Mode::Audio { .. }) {
            let outcome = session.playhead.tick(&transport, &session.view);
            if outcome.wrapped {
                match rescan_key(session, &*host) {
                    Ok(changed) => {
                        if changed {
                            tracing::info!(target: target::CLASSIFY, "Key changed at loop start");
                        }
                    }
                    Err(e) => tracing::warn!(target: target::CLASSIFY, "Scale check failed: {}", e),
                }
                rerender = true;
            }
            if let Some(entry) = outcome.entry {
                dirty = true;
                if entry.blink_flipped && !session.playhead.alerts().is_empty() {
                    rerender = true;
                }
            }
            rerender |= outcome.alerts_expired;
        }

        let playing_page = playhead::playing_page(&transport, &session.view);
        if playing_page != session.playing_page || dirty {
            session.playing_page = playing_page;
            session.repaint_pages();
            dirty = true;
        }

        if rerender {
            self.refresh(host, leds);
        } else if dirty {
            self.flush(leds);
        }
    }

    fn with_session(&mut self, f: impl FnOnce(&mut Session)) -> bool {
        if let Some(session) = self.session.as_mut() {
            f(session);
        }
        false
    }

    fn navigate(&mut self, f: impl FnOnce(&mut ViewState) -> bool) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let moved = f(&mut session.view);
        if moved {
            session.playhead.invalidate();
            session.focus = None;
            tracing::debug!(target: target::VIEW, "Page {}, rows from {}", session.view.time_page(), session.view.row_base());
        }
        moved
    }

    fn on_row_up(&mut self) -> bool {
        let rows = self.session.as_ref().map(|s| s.mode.row_count()).unwrap_or(0);
        self.navigate(|view| view.row_up(rows))
    }

    /// Moves the selected row one step up or down, scrolling at the edges.
    fn on_select_step(&mut self, up: bool) -> bool {
        let rows = self.session.as_ref().map(|s| s.mode.row_count()).unwrap_or(0);
        self.navigate(|view| {
            let row = view.selected_row();
            match (up, row) {
                (true, 0) => view.row_up(rows),
                (true, _) => view.select_row(row - 1),
                (false, r) if r + 1 >= ROWS => view.row_down(),
                (false, _) => view.select_row(row + 1),
            }
        })
    }

    fn on_note_length(&mut self, index: usize) -> bool {
        self.navigate(|view| view.select_note_length(index))
    }

    fn on_loop_length(&mut self, index: usize, host: &mut impl Host) -> Result<bool, HostError> {
        let Some(bars) = LOOP_BARS.get(index).copied() else {
            return Ok(false);
        };
        host.set_loop(0.0, bars as f64 * BEATS_PER_BAR)?;
        Ok(self.navigate(|view| view.select_loop_length(index)))
    }

    fn on_pad(&mut self, row: usize, column: usize, host: &mut impl Host) -> Result<bool, HostError> {
        let defaults = self.defaults;
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        if row >= ROWS || column >= STEPS_PER_PAGE {
            return Ok(false);
        }
        if !session.mode.accepts_notes() {
            tracing::debug!(target: target::NOTES, "Pad ({}, {}) ignored in audio view", row, column);
            return Ok(false);
        }
        let Some(pitch) = session.pitch_at_row(row) else {
            return Ok(false);
        };
        let position = session.view.column_start(column);
        let loop_end = session.view.loop_beats();
        if position >= loop_end {
            return Ok(false);
        }

        let expression = session
            .expression
            .get(&pitch)
            .copied()
            .unwrap_or_default()
            .resolve(defaults);
        let step = session.view.step_beats();
        editor::toggle_note(host, pitch, position, step, loop_end, expression)?;
        session.view.select_row(row);
        session.focus = Some(editor::step_window(position, step));
        Ok(true)
    }

    /// Sets the selected row's expression buffer and rewrites the notes
    /// already in the last pressed step, or in the whole row when no step
    /// has been pressed since the view last moved.
    fn on_knob(
        &mut self,
        index: usize,
        value: u8,
        host: &mut impl Host,
        leds: &mut impl LedSink,
    ) -> Result<bool, HostError> {
        let shift = self.shift;
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        let Some(pitch) = session.mode.pitch_at(session.view.selected_index()) else {
            return Ok(false);
        };
        let value = value.min(127);
        let (velocity, pressure) = if shift {
            (Some(value), None)
        } else {
            (None, Some(value as f32 / 127.0))
        };

        let (from, span) = session.focus.unwrap_or((0.0, session.view.loop_beats()));
        let touched = host.set_note_expression(pitch, from, span, velocity, pressure)?;

        let entry = session.expression.entry(pitch).or_default();
        if shift {
            entry.velocity = velocity;
        } else {
            entry.pressure = pressure;
        }
        leds.set_ring(index, value);
        tracing::debug!(target: target::NOTES, "Knob {} set {} of pitch {} to {}, {} note(s) updated", index, if shift { "velocity" } else { "pressure" }, pitch, value, touched);
        Ok(false)
    }

    fn on_execute(&mut self, host: &mut impl Host) -> Result<bool, HostError> {
        let defaults = self.defaults;
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        let mut targets = [None; ROWS];
        for (row, slot) in targets.iter_mut().enumerate() {
            *slot = session.pitch_at_row(row).map(|pitch| RowTarget {
                pitch,
                expression: session.expression.get(&pitch).copied().unwrap_or_default(),
            });
        }
        let ctx = ExecContext {
            targets,
            loop_end: session.view.loop_beats(),
            defaults,
            buffer: &mut self.copy_buffer,
        };
        let outcome = session.functions.execute(host, ctx);
        match &outcome {
            Outcome::Success { rows } => {
                tracing::info!(target: target::FUNCTIONS, "Executed functions on {} row(s)", rows)
            }
            Outcome::Failure(reason) => {
                tracing::info!(target: target::FUNCTIONS, "Execute failed: {:?}", reason)
            }
        }
        self.feedback = Feedback::for_outcome(&outcome);
        Ok(true)
    }

    /// Re-reads clip content and pushes every changed LED.
    fn refresh(&mut self, host: &mut impl Host, leds: &mut impl LedSink) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let rendered = grid::render(&*host, &session.render_context());
        match rendered {
            Ok(frame) => session.base = frame,
            Err(e) => tracing::warn!(target: target::GRID, "Render failed, keeping last frame: {}", e),
        }
        self.flush(leds);
    }

    /// Pushes the LEDs that differ from what the controller already shows.
    fn flush(&mut self, leds: &mut impl LedSink) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let shown = playhead::compose(&session.base, session.playhead.rendered_column());

        let mut wanted: Vec<(LedTarget, Color)> = Vec::with_capacity(64);
        for (row, pads) in shown.pads.iter().enumerate() {
            for (column, color) in pads.iter().enumerate() {
                wanted.push((LedTarget::Pad { row, column }, *color));
            }
        }
        for (i, color) in shown.track_select.iter().enumerate() {
            wanted.push((LedTarget::TrackSelect(i), *color));
        }
        for (i, color) in shown.clip_stop.iter().enumerate() {
            wanted.push((LedTarget::ClipStop(i), *color));
        }
        for (row, color) in session.functions.scene_colors().into_iter().enumerate() {
            wanted.push((LedTarget::Scene(row), color));
        }
        wanted.push((LedTarget::StopAll, session.functions.indicator_color()));
        wanted.push((LedTarget::Master, self.feedback.color()));

        for (target, color) in wanted {
            if self.shown.get(&target) != Some(&color) {
                leds.set_led(target, color);
                self.shown.insert(target, color);
            }
        }
    }
}

/// Picks the loop and note length a new session starts with. An empty clip
/// gets one bar of quarter notes, applied to the host.
fn prepare_loop(host: &mut impl Host, mode: &Mode, view: &mut ViewState) -> Result<(), HostError> {
    let clip = host.clip()?;
    let empty = !mode.accepts_notes() || host.all_notes()?.is_empty();
    if empty && mode.accepts_notes() {
        view.select_loop_length(0);
        view.select_note_length(QUARTER_NOTE_INDEX);
        host.set_loop(0.0, LOOP_BARS[0] as f64 * BEATS_PER_BAR)?;
        return Ok(());
    }

    let loop_len = clip.loop_length();
    let index = LOOP_BARS
        .iter()
        .position(|bars| *bars as f64 * BEATS_PER_BAR >= loop_len - crate::host::BEAT_EPSILON)
        .unwrap_or(LOOP_BARS.len() - 1);
    view.select_loop_length(index);
    Ok(())
}

/// Re-reads the song key. Pitches with notes that left the scale start
/// blinking. Returns whether the key changed.
fn rescan_key(session: &mut Session, host: &impl Host) -> Result<bool, HostError> {
    let Mode::Melodic { key } = &mut session.mode else {
        return Ok(false);
    };
    let new_key = classify::read_key(host);
    if new_key == *key {
        return Ok(false);
    }
    let old_key = *key;
    let turned: HashSet<u8> = host
        .all_notes()?
        .iter()
        .map(|n| n.pitch)
        .filter(|p| old_key.contains(*p) && !new_key.contains(*p))
        .collect();
    *key = new_key;
    session.playhead.arm_alerts(turned);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ClipInfo, DeviceInfo, DrumPad, MemoryHost, Note, ScaleSetting};

    fn sequencer() -> StepSequencer {
        StepSequencer::new(Expression::default())
    }

    fn press(seq: &mut StepSequencer, host: &mut MemoryHost, leds: &mut RecordingLeds, event: ControlEvent) {
        seq.handle(event, host, leds);
    }

    fn drum_host() -> MemoryHost {
        let pads = [36u8, 38, 42, 46]
            .iter()
            .map(|&note| DrumPad { note, loaded: true })
            .collect();
        MemoryHost::new().with_devices(vec![DeviceInfo::drum_rack("Kit", pads)])
    }

    #[test]
    fn test_enter_empty_clip_defaults_to_one_bar() {
        let mut host = MemoryHost::new().with_clip(ClipInfo::midi("Empty", 16.0));
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        assert!(seq.enter(&mut host, &mut leds));
        assert_eq!(seq.mode().map(Mode::name), Some("melodic"));
        let view = seq.view().unwrap();
        assert_eq!(view.loop_bars(), 1);
        assert_eq!(view.step_beats(), 1.0);
        assert_eq!(host.clip().unwrap().loop_end, 4.0);

        // C major from C3: root on the bottom row, E on top, D# dark
        assert_eq!(leds.pad(4, 0), Color::CYAN);
        assert_eq!(leds.pad(0, 0), Color::BLUE);
        assert_eq!(leds.pad(1, 0), Color::OFF);
        assert_eq!(leds.pad(2, 3), Color::BLUE);
        assert_eq!(leds.pad(2, 4), Color::OFF);
        assert_eq!(leds.color(LedTarget::TrackSelect(QUARTER_NOTE_INDEX)), Color::ORANGE);
    }

    #[test]
    fn test_enter_without_clip_stays_inactive() {
        let mut host = MemoryHost::new();
        host.remove_clip();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        press(&mut seq, &mut host, &mut leds, ControlEvent::User);
        assert!(!seq.is_active());
        assert!(leds.take().is_empty());
    }

    #[test]
    fn test_pad_press_toggles_note() {
        let mut host = drum_host();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);

        // row 3 is the second loaded pad
        press(&mut seq, &mut host, &mut leds, ControlEvent::Pad { row: 3, column: 2 });
        assert_eq!(host.notes_snapshot(), &[Note::new(38, 2.0, 1.0)]);
        assert_eq!(seq.view().unwrap().selected_row(), 3);
        assert_eq!(leds.pad(3, 2), Color::GREEN);
        assert_eq!(leds.pad(3, 1), Color::BLUE);

        press(&mut seq, &mut host, &mut leds, ControlEvent::Pad { row: 3, column: 2 });
        assert!(host.notes_snapshot().is_empty());
        assert_eq!(leds.pad(3, 2), Color::BLUE);
    }

    #[test]
    fn test_knob_sets_row_expression() {
        let mut host = drum_host();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);
        press(&mut seq, &mut host, &mut leds, ControlEvent::Shift(true));
        press(&mut seq, &mut host, &mut leds, ControlEvent::DeviceKnob { index: 0, value: 110 });
        press(&mut seq, &mut host, &mut leds, ControlEvent::Shift(false));
        press(&mut seq, &mut host, &mut leds, ControlEvent::DeviceKnob { index: 0, value: 127 });
        press(&mut seq, &mut host, &mut leds, ControlEvent::Pad { row: 4, column: 0 });
        let note = host.notes_snapshot()[0];
        assert_eq!(note.pitch, 36);
        assert_eq!(note.velocity, 110);
        assert_eq!(note.pressure, 1.0);
    }

    #[test]
    fn test_knob_rewrites_pressed_step_only() {
        let mut host = drum_host().with_notes(vec![
            Note::new(36, 0.0, 0.25),
            Note::new(36, 2.0, 0.25),
        ]);
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);

        press(&mut seq, &mut host, &mut leds, ControlEvent::Pad { row: 4, column: 1 });
        press(&mut seq, &mut host, &mut leds, ControlEvent::DeviceKnob { index: 5, value: 127 });

        let pressures: Vec<(f64, f32)> = host
            .notes_snapshot()
            .iter()
            .map(|n| (n.start, n.pressure))
            .collect();
        assert!(pressures.contains(&(1.0, 1.0)));
        assert!(pressures.contains(&(0.0, 0.0)));
        assert!(pressures.contains(&(2.0, 0.0)));
        assert_eq!(leds.ring(5), Some(127));
    }

    #[test]
    fn test_shift_knob_without_step_rewrites_whole_row() {
        let mut host = drum_host().with_notes(vec![
            Note::new(36, 0.0, 0.25),
            Note::new(36, 2.0, 0.25),
            Note::new(38, 0.0, 0.25),
        ]);
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);

        press(&mut seq, &mut host, &mut leds, ControlEvent::Shift(true));
        press(&mut seq, &mut host, &mut leds, ControlEvent::DeviceKnob { index: 3, value: 100 });

        for note in host.notes_snapshot() {
            let expected = if note.pitch == 36 { 100 } else { 64 };
            assert_eq!(note.velocity, expected);
            assert_eq!(note.pressure, 0.0);
        }
        assert_eq!(leds.ring(3), Some(100));
        assert_eq!(leds.ring(0), None);
    }

    #[test]
    fn test_unchanged_column_sends_no_updates() {
        let mut host = drum_host();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);
        host.start();
        host.set_position(1.1);

        seq.tick(&mut host, &mut leds);
        let first = leds.take();
        assert!(first.contains(&(LedTarget::Pad { row: 4, column: 1 }, Color::RED)));

        for _ in 0..10 {
            host.set_position(1.2);
            seq.tick(&mut host, &mut leds);
            assert!(leds.take().is_empty());
        }

        host.set_position(2.0);
        seq.tick(&mut host, &mut leds);
        let moved = leds.take();
        // column 1 restored, column 2 painted
        assert!(moved.contains(&(LedTarget::Pad { row: 4, column: 1 }, Color::BLUE)));
        assert!(moved.contains(&(LedTarget::Pad { row: 4, column: 2 }, Color::RED)));
    }

    #[test]
    fn test_playhead_marks_occupied_steps_yellow() {
        let mut host = drum_host().with_notes(vec![Note::new(36, 3.0, 0.25)]);
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);
        host.start();
        host.set_position(3.0);
        seq.tick(&mut host, &mut leds);
        assert_eq!(leds.pad(4, 3), Color::YELLOW);
        assert_eq!(leds.pad(3, 3), Color::RED);
    }

    #[test]
    fn test_execute_without_assignments_blinks_failure() {
        let mut host = drum_host();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);
        press(&mut seq, &mut host, &mut leds, ControlEvent::Master);
        assert_eq!(leds.color(LedTarget::Master), Color::RED);
        leds.take();

        let mut lit = 1;
        for _ in 0..200 {
            seq.tick(&mut host, &mut leds);
            for (target, color) in leds.take() {
                if target == LedTarget::Master && !color.is_off() {
                    lit += 1;
                }
            }
        }
        assert_eq!(lit, 5);
        assert_eq!(leds.color(LedTarget::Master), Color::OFF);
        assert!(host.notes_snapshot().is_empty());
    }

    #[test]
    fn test_function_round_trip() {
        let mut host = drum_host();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);

        for _ in 0..6 {
            press(&mut seq, &mut host, &mut leds, ControlEvent::StopAll);
        }
        assert_eq!(
            seq.functions().unwrap().staged(),
            Some(functions::FunctionKind::FillEighth)
        );
        assert_eq!(leds.color(LedTarget::StopAll), Color::DARK_PURPLE);
        // preview blinks, never assigns
        assert_eq!(leds.color(LedTarget::Scene(0)), Color::DARK_PURPLE);
        press(&mut seq, &mut host, &mut leds, ControlEvent::Scene(4));
        press(&mut seq, &mut host, &mut leds, ControlEvent::Master);

        let pad_notes: Vec<&Note> = host.notes_snapshot().iter().filter(|n| n.pitch == 36).collect();
        assert_eq!(pad_notes.len(), 8);
        assert_eq!(seq.functions().unwrap().assigned_count(), 0);
        assert_eq!(seq.functions().unwrap().staged(), None);
        assert_eq!(leds.color(LedTarget::StopAll), Color::OFF);
        assert_eq!(leds.color(LedTarget::Scene(4)), Color::OFF);
        assert_eq!(leds.color(LedTarget::Master), Color::GREEN);
        assert_eq!(leds.pad(4, 0), Color::GREEN);
    }

    #[test]
    fn test_loop_length_goes_to_host() {
        let mut host = drum_host();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);
        press(&mut seq, &mut host, &mut leds, ControlEvent::ClipStop(2));
        assert_eq!(host.clip().unwrap().loop_end, 16.0);
        assert_eq!(seq.view().unwrap().loop_bars(), 4);
        // out-of-table press is ignored
        press(&mut seq, &mut host, &mut leds, ControlEvent::ClipStop(6));
        assert_eq!(seq.view().unwrap().loop_bars(), 4);
    }

    #[test]
    fn test_host_failure_leaves_state_alone() {
        let mut host = drum_host();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);
        host.remove_clip();
        leds.take();

        press(&mut seq, &mut host, &mut leds, ControlEvent::Pad { row: 2, column: 0 });
        assert!(seq.is_active());
        assert_eq!(seq.view().unwrap().selected_row(), 4);
        press(&mut seq, &mut host, &mut leds, ControlEvent::ClipStop(1));
        assert_eq!(seq.view().unwrap().loop_bars(), 1);
        seq.tick(&mut host, &mut leds);
        assert!(leds.take().is_empty());
    }

    #[test]
    fn test_scale_change_arms_chromatic_alert() {
        let mut host = MemoryHost::new().with_notes(vec![Note::new(52, 2.0, 0.5)]);
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);
        // E on the top row, in C major
        assert_eq!(leds.pad(0, 2), Color::GREEN);

        host.start();
        host.set_position(3.5);
        seq.tick(&mut host, &mut leds);
        host.set_scale(ScaleSetting {
            root: 0,
            name: "Minor".to_string(),
        })
        .unwrap();
        host.set_position(0.5);
        seq.tick(&mut host, &mut leds);
        assert!(seq.playhead().unwrap().alerts().contains(&52));
        assert_eq!(leds.pad(0, 2), Color::ORANGE);

        for position in [1.0, 2.0, 3.0] {
            host.set_position(position);
            seq.tick(&mut host, &mut leds);
        }
        // blink is in its dark half and the playhead has moved on
        assert!(!seq.playhead().unwrap().blink_lit());
        assert_eq!(leds.pad(0, 2), Color::OFF);
    }

    #[test]
    fn test_exit_clears_everything() {
        let mut host = drum_host().with_notes(vec![Note::new(36, 0.0, 1.0)]);
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        press(&mut seq, &mut host, &mut leds, ControlEvent::User);
        assert!(seq.is_active());
        press(&mut seq, &mut host, &mut leds, ControlEvent::StopAll);
        press(&mut seq, &mut host, &mut leds, ControlEvent::User);
        assert!(!seq.is_active());
        assert!(LedTarget::all().all(|t| leds.color(t).is_off()));
        assert!(seq.copy_buffer().is_empty());

        // events while inactive are ignored
        press(&mut seq, &mut host, &mut leds, ControlEvent::Pad { row: 4, column: 1 });
        assert_eq!(host.notes_snapshot().len(), 1);
    }

    #[test]
    fn test_page_and_row_navigation_bounded() {
        let mut host = drum_host();
        let mut leds = RecordingLeds::new();
        let mut seq = sequencer();
        seq.enter(&mut host, &mut leds);
        press(&mut seq, &mut host, &mut leds, ControlEvent::Right);
        assert_eq!(seq.view().unwrap().time_page(), 0);
        press(&mut seq, &mut host, &mut leds, ControlEvent::TrackSelect(0));
        press(&mut seq, &mut host, &mut leds, ControlEvent::Right);
        assert_eq!(seq.view().unwrap().time_page(), 1);

        // four loaded pads fit on screen: no scrolling
        press(&mut seq, &mut host, &mut leds, ControlEvent::Up);
        assert_eq!(seq.view().unwrap().row_base(), 0);
        press(&mut seq, &mut host, &mut leds, ControlEvent::NextDevice);
        assert_eq!(seq.view().unwrap().selected_row(), 3);
        press(&mut seq, &mut host, &mut leds, ControlEvent::PrevDevice);
        press(&mut seq, &mut host, &mut leds, ControlEvent::PrevDevice);
        assert_eq!(seq.view().unwrap().selected_row(), 4);
    }
}
