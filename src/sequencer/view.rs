//! Navigation state for one sequencer session.
//!
//! Indices into [`NOTE_LENGTHS`] and [`LOOP_BARS`] are only ever set through
//! the bounded setters below, so lookups cannot go out of range.

use crate::host::{Beats, BEAT_EPSILON};
use crate::logging::target;

pub const STEPS_PER_PAGE: usize = 8;
pub const ROWS: usize = 5;
pub const BEATS_PER_BAR: Beats = 4.0;

/// Step lengths selectable from the track-select buttons, in beats.
pub const NOTE_LENGTHS: [Beats; 8] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0];
/// Loop lengths selectable from the clip-stop buttons, in bars.
pub const LOOP_BARS: [u32; 5] = [1, 2, 4, 8, 16];

pub const QUARTER_NOTE_INDEX: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    time_page: usize,
    row_base: usize,
    note_length_index: usize,
    loop_length_index: usize,
    selected_row: usize,
}

impl ViewState {
    pub fn new(row_base: usize) -> Self {
        Self {
            time_page: 0,
            row_base,
            note_length_index: QUARTER_NOTE_INDEX,
            loop_length_index: 0,
            selected_row: ROWS - 1,
        }
    }

    pub fn time_page(&self) -> usize {
        self.time_page
    }

    pub fn row_base(&self) -> usize {
        self.row_base
    }

    pub fn note_length_index(&self) -> usize {
        self.note_length_index
    }

    pub fn loop_length_index(&self) -> usize {
        self.loop_length_index
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn step_beats(&self) -> Beats {
        NOTE_LENGTHS[self.note_length_index]
    }

    pub fn loop_bars(&self) -> u32 {
        LOOP_BARS[self.loop_length_index]
    }

    pub fn loop_beats(&self) -> Beats {
        self.loop_bars() as Beats * BEATS_PER_BAR
    }

    pub fn page_beats(&self) -> Beats {
        STEPS_PER_PAGE as Beats * self.step_beats()
    }

    pub fn page_start(&self) -> Beats {
        self.time_page as Beats * self.page_beats()
    }

    /// Beat position of a grid column on the current page.
    pub fn column_start(&self, column: usize) -> Beats {
        self.page_start() + column as Beats * self.step_beats()
    }

    /// Steps needed to cover the loop; a partial final step counts.
    pub fn total_steps(&self) -> usize {
        ((self.loop_beats() / self.step_beats()) - BEAT_EPSILON).ceil().max(1.0) as usize
    }

    pub fn page_count(&self) -> usize {
        self.total_steps().div_ceil(STEPS_PER_PAGE)
    }

    pub fn max_page(&self) -> usize {
        self.page_count() - 1
    }

    pub fn select_note_length(&mut self, index: usize) -> bool {
        if index >= NOTE_LENGTHS.len() {
            return false;
        }
        self.note_length_index = index;
        self.clamp_page();
        tracing::debug!(target: target::VIEW, "Note length {} beats (index {})", self.step_beats(), index);
        true
    }

    pub fn select_loop_length(&mut self, index: usize) -> bool {
        if index >= LOOP_BARS.len() {
            return false;
        }
        self.loop_length_index = index;
        self.clamp_page();
        tracing::debug!(target: target::VIEW, "Loop length {} bars (index {})", self.loop_bars(), index);
        true
    }

    pub fn page_left(&mut self) -> bool {
        if self.time_page == 0 {
            return false;
        }
        self.time_page -= 1;
        true
    }

    pub fn page_right(&mut self) -> bool {
        if self.time_page >= self.max_page() {
            tracing::debug!(target: target::VIEW, "Already at last page {}", self.time_page);
            return false;
        }
        self.time_page += 1;
        true
    }

    /// Up moves toward higher pitches / later drum pads.
    pub fn row_up(&mut self, row_count: usize) -> bool {
        let max_base = row_count.saturating_sub(ROWS);
        if self.row_base >= max_base {
            return false;
        }
        self.row_base += 1;
        true
    }

    pub fn row_down(&mut self) -> bool {
        if self.row_base == 0 {
            return false;
        }
        self.row_base -= 1;
        true
    }

    pub fn select_row(&mut self, row: usize) -> bool {
        if row >= ROWS || row == self.selected_row {
            return false;
        }
        self.selected_row = row;
        true
    }

    /// Grid row 0 is the top of the pad matrix and shows the highest index.
    pub fn row_index(&self, row: usize) -> usize {
        self.row_base + (ROWS - 1 - row.min(ROWS - 1))
    }

    pub fn selected_index(&self) -> usize {
        self.row_index(self.selected_row)
    }

    fn clamp_page(&mut self) {
        if self.time_page > self.max_page() {
            self.time_page = 0;
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_start() {
        let mut view = ViewState::new(0);
        view.select_note_length(1); // 0.5 beats
        view.select_loop_length(2); // 4 bars
        assert!(view.page_right());
        assert_eq!(view.page_start(), 4.0);
        assert_eq!(view.column_start(3), 5.5);
    }

    #[test]
    fn test_out_of_table_index_is_ignored() {
        let mut view = ViewState::new(0);
        assert!(!view.select_note_length(8));
        assert!(!view.select_loop_length(5));
        assert_eq!(view.note_length_index(), QUARTER_NOTE_INDEX);
        assert_eq!(view.loop_length_index(), 0);
    }

    #[test]
    fn test_pages_bounded_by_loop() {
        let mut view = ViewState::new(0);
        // 1 bar of quarters fits one page
        assert_eq!(view.page_count(), 1);
        assert!(!view.page_right());

        view.select_note_length(0); // sixteenths: 16 steps
        assert_eq!(view.page_count(), 2);
        assert!(view.page_right());
        assert!(!view.page_right());
        assert!(view.page_left());
        assert!(!view.page_left());
    }

    #[test]
    fn test_long_steps_still_have_one_page() {
        let mut view = ViewState::new(0);
        view.select_note_length(7); // 32 beats on a 4 beat loop
        assert_eq!(view.total_steps(), 1);
        assert_eq!(view.page_count(), 1);
    }

    #[test]
    fn test_shrinking_loop_resets_page() {
        let mut view = ViewState::new(0);
        view.select_loop_length(4);
        view.page_right();
        view.page_right();
        assert_eq!(view.time_page(), 2);
        view.select_loop_length(0);
        assert_eq!(view.time_page(), 0);
    }

    #[test]
    fn test_row_navigation() {
        let mut view = ViewState::new(0);
        assert!(!view.row_down());
        assert!(view.row_up(7));
        assert!(view.row_up(7));
        assert!(!view.row_up(7));
        assert_eq!(view.row_base(), 2);
        // top row shows the highest index
        assert_eq!(view.row_index(0), 6);
        assert_eq!(view.row_index(4), 2);
    }

    #[test]
    fn test_select_row() {
        let mut view = ViewState::new(48);
        assert!(view.select_row(0));
        assert!(!view.select_row(0));
        assert!(!view.select_row(5));
        assert_eq!(view.selected_index(), 52);
    }
}
