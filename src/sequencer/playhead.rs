//! Playhead and blink synchronizer.
//!
//! The tick only samples the transport. All visible change happens on a
//! column-entry event, when the playing position moves into a different grid
//! column: the old column is restored, the new one painted and the blink
//! phase advanced by one. Ticks that land in the same column do nothing, so
//! the blink rate follows the beat rather than the tick period.

use std::collections::HashSet;

use crate::color::Color;
use crate::host::{Beats, Transport, BEAT_EPSILON};
use crate::logging::target;

use super::grid::Frame;
use super::view::{ViewState, ROWS, STEPS_PER_PAGE};

/// Flash on, hold, hold, flash off, hold, hold.
pub const PHASE_COUNT: u8 = 6;
const LIT_PHASES: u8 = 3;

/// Full phase cycles an alerting pitch keeps blinking after a key change.
pub const ALERT_CYCLES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinkState {
    pub active_column: Option<usize>,
    pub phase: u8,
    pub last_rendered_column: Option<usize>,
}

impl Default for BlinkState {
    fn default() -> Self {
        Self {
            active_column: None,
            // the first entry lands on phase 0
            phase: PHASE_COUNT - 1,
            last_rendered_column: None,
        }
    }
}

impl BlinkState {
    pub fn lit(&self) -> bool {
        self.phase < LIT_PHASES
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnEntry {
    pub previous: Option<usize>,
    pub current: Option<usize>,
    /// The lit/unlit half of the blink changed with this entry.
    pub blink_flipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    pub entry: Option<ColumnEntry>,
    /// The transport wrapped back to the loop start since the last tick.
    pub wrapped: bool,
    pub alerts_expired: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Playhead {
    blink: BlinkState,
    last_position: Option<Beats>,
    alerts: HashSet<u8>,
    alert_cycles_left: u32,
}

/// Visible column holding `position`, or `None` when it is on another page.
pub fn current_column(position: Beats, view: &ViewState) -> Option<usize> {
    let offset = position - view.page_start();
    if offset < -BEAT_EPSILON || offset >= view.page_beats() - BEAT_EPSILON {
        return None;
    }
    let column = ((offset.max(0.0) + BEAT_EPSILON) / view.step_beats()).floor() as usize;
    (column < STEPS_PER_PAGE).then_some(column)
}

pub fn playing_page(transport: &Transport, view: &ViewState) -> Option<usize> {
    if !transport.playing {
        return None;
    }
    Some(((transport.position + BEAT_EPSILON) / view.page_beats()).floor() as usize)
}

/// Playhead colors for one column: yellow over notes, red over empty steps.
pub fn column_overlay(frame: &Frame, column: usize) -> [Color; ROWS] {
    let mut colors = [Color::OFF; ROWS];
    for (row, color) in colors.iter_mut().enumerate() {
        *color = if frame.column_occupied(row, column) {
            Color::YELLOW
        } else {
            Color::RED
        };
    }
    colors
}

/// Copies `frame` with the playhead column painted over it.
pub fn compose(frame: &Frame, column: Option<usize>) -> Frame {
    let mut shown = *frame;
    if let Some(column) = column.filter(|c| *c < STEPS_PER_PAGE) {
        for (row, color) in column_overlay(frame, column).into_iter().enumerate() {
            shown.pads[row][column] = color;
        }
    }
    shown
}

impl Playhead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blink(&self) -> &BlinkState {
        &self.blink
    }

    pub fn blink_lit(&self) -> bool {
        self.blink.lit()
    }

    pub fn rendered_column(&self) -> Option<usize> {
        self.blink.last_rendered_column
    }

    pub fn alerts(&self) -> &HashSet<u8> {
        &self.alerts
    }

    pub fn tick(&mut self, transport: &Transport, view: &ViewState) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if transport.playing {
            if let Some(last) = self.last_position {
                outcome.wrapped = transport.position < last - BEAT_EPSILON;
            }
            self.last_position = Some(transport.position);
        } else {
            self.last_position = None;
        }

        let column = if transport.playing {
            current_column(transport.position, view)
        } else {
            None
        };
        if column == self.blink.active_column {
            return outcome;
        }

        let previous = self.blink.last_rendered_column;
        let was_lit = self.blink.lit();
        self.blink.active_column = column;
        self.blink.last_rendered_column = column;

        if column.is_some() {
            self.blink.phase = (self.blink.phase + 1) % PHASE_COUNT;
            if self.blink.phase == 0 {
                outcome.alerts_expired = self.count_down_alerts();
            }
        }

        tracing::trace!(target: target::PLAYHEAD, "Column {:?} -> {:?}, phase {}", previous, column, self.blink.phase);
        outcome.entry = Some(ColumnEntry {
            previous,
            current: column,
            blink_flipped: was_lit != self.blink.lit(),
        });
        outcome
    }

    /// Forgets the painted column so the next tick re-enters it, e.g. after
    /// the page or step length changed.
    pub fn invalidate(&mut self) {
        self.blink.active_column = None;
        self.blink.last_rendered_column = None;
    }

    pub fn arm_alerts(&mut self, pitches: HashSet<u8>) {
        if pitches.is_empty() {
            return;
        }
        tracing::info!(target: target::PLAYHEAD, "{} pitch(es) turned chromatic", pitches.len());
        self.alerts = pitches;
        self.alert_cycles_left = ALERT_CYCLES;
    }

    fn count_down_alerts(&mut self) -> bool {
        if self.alerts.is_empty() {
            return false;
        }
        self.alert_cycles_left = self.alert_cycles_left.saturating_sub(1);
        if self.alert_cycles_left > 0 {
            return false;
        }
        tracing::debug!(target: target::PLAYHEAD, "Chromatic alert window over");
        self.alerts.clear();
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
