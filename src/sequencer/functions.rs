//! Batch note operations assigned per row and run together on execute.
//!
//! Two independent pieces of state: the staged kind chosen with the cycle
//! control, and the per-row assignments made with the scene buttons. Staging
//! only previews on the scene LEDs; it never touches assignments.

use crate::color::Color;
use crate::host::{Beats, Host, HostError, Note};
use crate::logging::target;

use super::editor::{self, CopyBuffer, Expression, ExpressionOverride};
use super::view::ROWS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Clear,
    Copy,
    Paste,
    MpeMarker,
    FillQuarter,
    FillEighth,
    FillSixteenth,
    FillWhole,
}

impl FunctionKind {
    /// Cycle order of the staging control.
    pub const ALL: [FunctionKind; 8] = [
        FunctionKind::Clear,
        FunctionKind::Copy,
        FunctionKind::Paste,
        FunctionKind::MpeMarker,
        FunctionKind::FillQuarter,
        FunctionKind::FillEighth,
        FunctionKind::FillSixteenth,
        FunctionKind::FillWhole,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FunctionKind::Clear => "clear",
            FunctionKind::Copy => "copy",
            FunctionKind::Paste => "paste",
            FunctionKind::MpeMarker => "mpe",
            FunctionKind::FillQuarter => "fill 1/4",
            FunctionKind::FillEighth => "fill 1/8",
            FunctionKind::FillSixteenth => "fill 1/16",
            FunctionKind::FillWhole => "fill 1/1",
        }
    }

    pub fn color(self) -> Color {
        match self {
            FunctionKind::Clear => Color::RED,
            FunctionKind::Copy => Color::YELLOW,
            FunctionKind::Paste => Color::ORANGE,
            FunctionKind::MpeMarker => Color::BLUE,
            FunctionKind::FillQuarter => Color::PURPLE,
            FunctionKind::FillEighth => Color::DARK_PURPLE,
            FunctionKind::FillSixteenth => Color::LIME,
            FunctionKind::FillWhole => Color::GREEN,
        }
    }

    pub fn fill_duration(self) -> Option<Beats> {
        match self {
            FunctionKind::FillQuarter => Some(1.0),
            FunctionKind::FillEighth => Some(0.5),
            FunctionKind::FillSixteenth => Some(0.25),
            FunctionKind::FillWhole => Some(4.0),
            _ => None,
        }
    }

    /// Kinds run in this order within one execute, so a row can be copied
    /// and then cleared or pasted over in the same pass.
    fn pass(self) -> u8 {
        match self {
            FunctionKind::Copy => 0,
            FunctionKind::Clear => 1,
            FunctionKind::Paste => 2,
            FunctionKind::MpeMarker => 3,
            _ => 4,
        }
    }
}

/// Pitch and knob state of a grid row at execute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowTarget {
    pub pitch: u8,
    pub expression: ExpressionOverride,
}

pub struct ExecContext<'a> {
    /// Indexed by visual row; `None` for rows without a pitch.
    pub targets: [Option<RowTarget>; ROWS],
    pub loop_end: Beats,
    pub defaults: Expression,
    pub buffer: &'a mut CopyBuffer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { rows: usize },
    Failure(FailureReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    NothingAssigned,
    NoTargetRows,
    Host(HostError),
}

#[derive(Debug, Clone, Default)]
pub struct FunctionSystem {
    assignments: [Option<FunctionKind>; ROWS],
    staged: Option<FunctionKind>,
    preview: PreviewBlink,
}

impl FunctionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staged(&self) -> Option<FunctionKind> {
        self.staged
    }

    pub fn is_staging(&self) -> bool {
        self.staged.is_some()
    }

    pub fn assignment(&self, row: usize) -> Option<FunctionKind> {
        self.assignments.get(row).copied().flatten()
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.is_some()).count()
    }

    /// Advances the staged kind: none, Clear, Copy, ..., FillWhole, none.
    pub fn cycle(&mut self) -> Option<FunctionKind> {
        self.staged = match self.staged {
            None => Some(FunctionKind::ALL[0]),
            Some(kind) => FunctionKind::ALL
                .iter()
                .position(|k| *k == kind)
                .and_then(|i| FunctionKind::ALL.get(i + 1))
                .copied(),
        };
        self.preview = PreviewBlink::default();
        tracing::debug!(target: target::FUNCTIONS, "Staged {:?}", self.staged.map(FunctionKind::name));
        self.staged
    }

    /// Scene press: an assigned row goes back to none, an empty row takes the
    /// kind staged right now.
    pub fn toggle_row(&mut self, row: usize) -> bool {
        let Some(slot) = self.assignments.get_mut(row) else {
            return false;
        };
        match (*slot, self.staged) {
            (Some(kind), _) => {
                *slot = None;
                tracing::debug!(target: target::FUNCTIONS, "Row {} unassigned (was {})", row, kind.name());
                true
            }
            (None, Some(kind)) => {
                *slot = Some(kind);
                tracing::debug!(target: target::FUNCTIONS, "Row {} assigned {}", row, kind.name());
                true
            }
            (None, None) => false,
        }
    }

    /// Runs every assigned row, then clears all assignments and the staged
    /// kind whatever the outcome.
    pub fn execute(&mut self, host: &mut impl Host, ctx: ExecContext<'_>) -> Outcome {
        let ExecContext {
            targets,
            loop_end,
            defaults,
            buffer,
        } = ctx;
        let mut plan: Vec<(usize, FunctionKind)> = self
            .assignments
            .iter()
            .enumerate()
            .filter_map(|(row, kind)| kind.map(|k| (row, k)))
            .collect();
        self.reset();

        if plan.is_empty() {
            tracing::info!(target: target::FUNCTIONS, "Execute with no assigned rows");
            return Outcome::Failure(FailureReason::NothingAssigned);
        }
        plan.sort_by_key(|(row, kind)| (kind.pass(), *row));

        let mut copied_once = false;
        let mut rows = 0;
        for (row, kind) in plan {
            let Some(row_target) = targets.get(row).copied().flatten() else {
                tracing::debug!(target: target::FUNCTIONS, "Row {} has no pitch, skipping {}", row, kind.name());
                continue;
            };
            match run_one(host, kind, row_target, loop_end, defaults, buffer) {
                Ok(Step::Copied(notes)) => {
                    if copied_once {
                        buffer.append(row_target.pitch, &notes);
                    } else {
                        buffer.replace(row_target.pitch, &notes);
                        copied_once = true;
                    }
                    tracing::info!(target: target::FUNCTIONS, "Copied {} note(s) from pitch {}", notes.len(), row_target.pitch);
                }
                Ok(Step::Done(count)) => {
                    tracing::info!(target: target::FUNCTIONS, "{} on pitch {}: {} note(s)", kind.name(), row_target.pitch, count);
                }
                Err(e) => {
                    tracing::warn!(target: target::FUNCTIONS, "{} on row {} failed: {}", kind.name(), row, e);
                    return Outcome::Failure(FailureReason::Host(e));
                }
            }
            rows += 1;
        }

        if rows == 0 {
            Outcome::Failure(FailureReason::NoTargetRows)
        } else {
            Outcome::Success { rows }
        }
    }

    /// Scene LEDs: assigned rows show their kind, the rest blink the staged
    /// kind while staging.
    pub fn scene_colors(&self) -> [Color; ROWS] {
        let mut colors = [Color::OFF; ROWS];
        for (row, color) in colors.iter_mut().enumerate() {
            *color = match (self.assignments[row], self.staged) {
                (Some(kind), _) => kind.color(),
                (None, Some(staged)) if self.preview.lit => staged.color(),
                _ => Color::OFF,
            };
        }
        colors
    }

    /// Staging indicator LED.
    pub fn indicator_color(&self) -> Color {
        self.staged.map(FunctionKind::color).unwrap_or(Color::OFF)
    }

    /// Advances the preview blink; true when the scene LEDs need a refresh.
    pub fn tick_preview(&mut self) -> bool {
        if self.staged.is_none() {
            return false;
        }
        self.preview.tick()
    }

    pub fn reset(&mut self) {
        self.assignments = [None; ROWS];
        self.staged = None;
        self.preview = PreviewBlink::default();
    }
}

enum Step {
    Copied(Vec<Note>),
    Done(usize),
}

fn run_one(
    host: &mut impl Host,
    kind: FunctionKind,
    target: RowTarget,
    loop_end: Beats,
    defaults: Expression,
    buffer: &CopyBuffer,
) -> Result<Step, HostError> {
    match kind {
        FunctionKind::Copy => Ok(Step::Copied(editor::row_notes(&*host, target.pitch, loop_end)?)),
        FunctionKind::Clear => Ok(Step::Done(editor::clear_row(host, target.pitch, loop_end)?)),
        FunctionKind::Paste => Ok(Step::Done(editor::paste(
            host,
            buffer,
            target.pitch,
            loop_end,
            target.expression,
        )?)),
        FunctionKind::MpeMarker => Ok(Step::Done(0)),
        FunctionKind::FillQuarter
        | FunctionKind::FillEighth
        | FunctionKind::FillSixteenth
        | FunctionKind::FillWhole => {
            let duration = kind.fill_duration().unwrap_or(1.0);
            let expression = target.expression.resolve(defaults);
            Ok(Step::Done(editor::fill(host, target.pitch, duration, loop_end, expression)?))
        }
    }
}

const PREVIEW_HALF_PERIOD_TICKS: u32 = 8;

#[derive(Debug, Clone)]
struct PreviewBlink {
    ticks: u32,
    lit: bool,
}

impl Default for PreviewBlink {
    fn default() -> Self {
        Self { ticks: 0, lit: true }
    }
}

impl PreviewBlink {
    fn tick(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks < PREVIEW_HALF_PERIOD_TICKS {
            return false;
        }
        self.ticks = 0;
        self.lit = !self.lit;
        true
    }
}

pub const SUCCESS_BLINKS: u32 = 3;
pub const FAILURE_BLINKS: u32 = 5;
const FEEDBACK_HALF_PERIOD_TICKS: u32 = 4;

/// Blink-count feedback on the execute button.
#[derive(Debug, Clone, Default)]
pub struct Feedback {
    color: Color,
    /// Half periods left, counting the one currently shown.
    remaining: u32,
    ticks: u32,
}

impl Feedback {
    pub fn for_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success { .. } => Self::blink(Color::GREEN, SUCCESS_BLINKS),
            Outcome::Failure(_) => Self::blink(Color::RED, FAILURE_BLINKS),
        }
    }

    pub fn blink(color: Color, times: u32) -> Self {
        Self {
            color,
            remaining: times * 2,
            ticks: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Lit on the first half of each blink.
    pub fn color(&self) -> Color {
        if self.remaining % 2 == 0 && self.remaining > 0 {
            self.color
        } else {
            Color::OFF
        }
    }

    /// Returns the new color when the LED changes.
    pub fn tick(&mut self) -> Option<Color> {
        if self.remaining == 0 {
            return None;
        }
        self.ticks += 1;
        if self.ticks < FEEDBACK_HALF_PERIOD_TICKS {
            return None;
        }
        self.ticks = 0;
        self.remaining -= 1;
        Some(self.color())
    }
}
