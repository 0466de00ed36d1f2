//! Grid mapper: turns mode, view and clip content into LED colors.

use std::collections::{HashMap, HashSet};

use crate::color::{intensity_color, Color};
use crate::host::{Beats, ClipInfo, Host, HostError, Note, BEAT_EPSILON};
use crate::logging::target;
use crate::scale::Key;

use super::classify::Mode;
use super::editor::starts_near;
use super::view::{ViewState, ROWS, STEPS_PER_PAGE};

pub const TRACK_BUTTONS: usize = 8;

/// Audio lanes, top to bottom.
pub const LANE_LOOP_START: usize = 0;
pub const LANE_LEFT: usize = 1;
pub const LANE_WARP: usize = 2;
pub const LANE_RIGHT: usize = 3;
pub const LANE_LOOP_END: usize = 4;

/// Stand-in level for the waveform lanes; no sample analysis is done.
const PLACEHOLDER_LEVEL: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// `pads[row][column]`, row 0 at the top.
    pub pads: [[Color; STEPS_PER_PAGE]; ROWS],
    pub occupied: [[bool; STEPS_PER_PAGE]; ROWS],
    pub track_select: [Color; TRACK_BUTTONS],
    pub clip_stop: [Color; TRACK_BUTTONS],
}

impl Frame {
    pub fn blank() -> Self {
        Self {
            pads: [[Color::OFF; STEPS_PER_PAGE]; ROWS],
            occupied: [[false; STEPS_PER_PAGE]; ROWS],
            track_select: [Color::OFF; TRACK_BUTTONS],
            clip_stop: [Color::OFF; TRACK_BUTTONS],
        }
    }

    pub fn column_occupied(&self, row: usize, column: usize) -> bool {
        self.occupied
            .get(row)
            .and_then(|r| r.get(column))
            .copied()
            .unwrap_or(false)
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::blank()
    }
}

pub struct RenderContext<'a> {
    pub mode: &'a Mode,
    pub view: &'a ViewState,
    /// Pitches that turned chromatic in the last scale change.
    pub alerts: &'a HashSet<u8>,
    pub blink_lit: bool,
    pub playing_page: Option<usize>,
}

/// Notes per pitch, fetched at most once per render pass.
struct NoteCache {
    loop_end: Beats,
    rows: HashMap<u8, Vec<Note>>,
}

impl NoteCache {
    fn new(loop_end: Beats) -> Self {
        Self {
            loop_end,
            rows: HashMap::new(),
        }
    }

    fn notes(&mut self, host: &impl Host, pitch: u8) -> Result<&[Note], HostError> {
        if !self.rows.contains_key(&pitch) {
            let notes = host.notes(pitch, 0.0, self.loop_end)?;
            self.rows.insert(pitch, notes);
        }
        Ok(self.rows.get(&pitch).map(Vec::as_slice).unwrap_or(&[]))
    }
}

pub fn render(host: &impl Host, ctx: &RenderContext<'_>) -> Result<Frame, HostError> {
    let mut frame = Frame::blank();

    match ctx.mode {
        Mode::Audio { .. } => render_audio(&mut frame, &host.clip()?),
        Mode::Drum { .. } | Mode::Melodic { .. } => render_notes(&mut frame, host, ctx)?,
    }

    let note_length = ctx.view.note_length_index();
    for (i, led) in frame.track_select.iter_mut().enumerate() {
        *led = if i == note_length { Color::ORANGE } else { Color::OFF };
    }

    let pages = ctx.view.page_count();
    let visible = ctx.view.time_page();
    for (i, led) in frame.clip_stop.iter_mut().enumerate() {
        *led = page_color(i, pages, visible, ctx.playing_page, ctx.blink_lit);
    }

    Ok(frame)
}

/// Clip-stop LED for loop page `page`.
pub fn page_color(
    page: usize,
    page_count: usize,
    visible: usize,
    playing: Option<usize>,
    blink_lit: bool,
) -> Color {
    if page >= page_count {
        Color::OFF
    } else if playing == Some(page) {
        match (blink_lit, page == visible) {
            (false, _) => Color::OFF,
            (true, true) => Color::PINK,
            (true, false) => Color::RED,
        }
    } else if page == visible {
        Color::YELLOW
    } else {
        Color::ORANGE
    }
}

fn render_notes(frame: &mut Frame, host: &impl Host, ctx: &RenderContext<'_>) -> Result<(), HostError> {
    let view = ctx.view;
    let loop_end = view.loop_beats();
    let step = view.step_beats();
    let mut cache = NoteCache::new(loop_end);
    let mut lit = 0;

    for row in 0..ROWS {
        let Some(pitch) = ctx.mode.pitch_at(view.row_index(row)) else {
            continue;
        };
        let selected = row == view.selected_row();
        let notes = cache.notes(host, pitch)?;

        for column in 0..STEPS_PER_PAGE {
            let start = view.column_start(column);
            if start >= loop_end - BEAT_EPSILON {
                continue;
            }
            let occupied = notes.iter().any(|n| starts_near(n, start, step));
            let cell = CellState {
                pitch,
                selected,
                occupied,
                alerting: ctx.alerts.contains(&pitch),
            };
            let color = cell_color(ctx.mode, cell, ctx.blink_lit);
            frame.pads[row][column] = color;
            frame.occupied[row][column] = occupied;
            if occupied {
                lit += 1;
            }
        }
    }

    tracing::trace!(target: target::GRID, "Rendered {} page {} with {} active cells", ctx.mode.name(), view.time_page(), lit);
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct CellState {
    pub pitch: u8,
    pub selected: bool,
    pub occupied: bool,
    pub alerting: bool,
}

/// Color of one pitched cell. Cells never look at their neighbours.
///
/// Melodic rows always show scale colors; only drum rows mark the selected
/// pad by lighting its empty steps.
pub fn cell_color(mode: &Mode, cell: CellState, blink_lit: bool) -> Color {
    match mode {
        Mode::Melodic { key } => melodic_color(key, cell, blink_lit),
        _ if cell.occupied => Color::GREEN,
        _ if cell.selected => Color::BLUE,
        _ => Color::OFF,
    }
}

fn melodic_color(key: &Key, cell: CellState, blink_lit: bool) -> Color {
    let in_scale = key.contains(cell.pitch);
    match (cell.occupied, in_scale) {
        (true, true) => Color::GREEN,
        (true, false) if cell.alerting && !blink_lit => Color::OFF,
        (true, false) => Color::ORANGE,
        (false, _) if key.is_root(cell.pitch) => Color::CYAN,
        (false, true) => Color::BLUE,
        (false, false) => Color::OFF,
    }
}

fn render_audio(frame: &mut Frame, clip: &ClipInfo) {
    let loop_len = clip.loop_length();
    if loop_len <= BEAT_EPSILON {
        return;
    }
    let per_column = loop_len / STEPS_PER_PAGE as Beats;
    let level = intensity_color(PLACEHOLDER_LEVEL);

    for column in 0..STEPS_PER_PAGE {
        let time = clip.loop_start + column as Beats * per_column;
        if time >= clip.loop_end - BEAT_EPSILON {
            continue;
        }
        let mut lanes = [Color::OFF; ROWS];
        if (time - clip.loop_start).abs() < BEAT_EPSILON {
            lanes[LANE_LOOP_START] = Color::GREEN;
        }
        lanes[LANE_LEFT] = level;
        if clip.warp_markers.iter().any(|m| (m - time).abs() < per_column / 2.0) {
            lanes[LANE_WARP] = Color::ORANGE;
        }
        if clip.channel_count >= 2 {
            lanes[LANE_RIGHT] = level;
        }
        if time + per_column >= clip.loop_end - BEAT_EPSILON {
            lanes[LANE_LOOP_END] = Color::RED;
        }
        for (row, color) in lanes.into_iter().enumerate() {
            frame.pads[row][column] = color;
            frame.occupied[row][column] = !color.is_off();
        }
    }
}
