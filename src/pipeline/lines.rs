//! Line playback
//!
//! A gesture traces a straight segment across the grid. On release the
//! rasterized cells become a [`Line`] that steps through its path on its own
//! timer, owning one polyphonic voice slot. Lines never interact with each
//! other.
//!
//! Line state: idle -> armed (gesture in progress) -> running -> completed
//! or stopped. The engine keeps the bookkeeping; the session drives steps
//! from its timer queue.

use std::collections::BTreeMap;

use crate::image::Cell;
use crate::pipeline::timer::{TimerId, TimerQueue};
use crate::pipeline::voice::{Voice, VoiceOwner};
use crate::pipeline::voicemgr::{VoicePolicy, VoiceRegistry};

/// Identity of a running line; never reused within an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(u64);

impl LineId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line#{}", self.0)
    }
}

/// Cells of the straight segment from `from` to `to`, both ends included
///
/// Integer Bresenham: every step moves to a neighbouring cell, so the path
/// has no duplicates and no gaps.
pub fn rasterize_line(from: Cell, to: Cell) -> Vec<Cell> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };

    let mut cells = Vec::with_capacity((dx.max(-dy) + 1) as usize);
    let (mut x, mut y) = (from.x, from.y);
    let mut err = dx + dy;

    loop {
        cells.push(Cell::new(x, y));
        if x == to.x && y == to.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells
}

/// A gesture in progress
#[derive(Debug, Clone)]
struct Gesture {
    start: Cell,
    path: Vec<Cell>,
}

/// A running line
#[derive(Debug, Clone)]
pub struct Line {
    id: LineId,
    path: Vec<Cell>,
    cursor: usize,
    looping: bool,
    timer: Option<TimerId>,
}

impl Line {
    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn path(&self) -> &[Cell] {
        &self.path
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }
}

/// What the next step of a line should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Sound this cell, then arm the next step
    Play(Cell),
    /// The path is exhausted; the line and its voice are gone
    Finished,
    /// No such line (stopped, finished, or a stale timer)
    Missing,
}

pub struct LineEngine {
    lines: BTreeMap<LineId, Line>,
    voices: VoiceRegistry,
    gesture: Option<Gesture>,
    next_id: u64,
}

impl LineEngine {
    pub fn new() -> Self {
        Self {
            lines: BTreeMap::new(),
            voices: VoiceRegistry::new(VoicePolicy::Polyphonic),
            gesture: None,
            next_id: 1,
        }
    }

    /// Arm a gesture at `cell`, replacing any gesture in progress
    pub fn begin_gesture(&mut self, cell: Cell) {
        self.gesture = Some(Gesture {
            start: cell,
            path: vec![cell],
        });
    }

    /// Re-rasterize the armed gesture up to `cell`
    ///
    /// Returns the current path, or `None` if no gesture is armed.
    pub fn update_gesture(&mut self, cell: Cell) -> Option<&[Cell]> {
        let gesture = self.gesture.as_mut()?;
        gesture.path = rasterize_line(gesture.start, cell);
        Some(&gesture.path)
    }

    pub fn is_armed(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn cancel_gesture(&mut self) {
        self.gesture = None;
    }

    /// Turn the armed gesture into a line
    ///
    /// The line has no timer yet; the caller runs its first step. Returns
    /// `None` when nothing was armed.
    pub fn commit_gesture(&mut self, looping: bool) -> Option<LineId> {
        let gesture = self.gesture.take()?;
        if gesture.path.is_empty() {
            return None;
        }

        let id = LineId(self.next_id);
        self.next_id += 1;
        log::debug!("{} started: {} cells, looping={}", id, gesture.path.len(), looping);
        self.lines.insert(
            id,
            Line {
                id,
                path: gesture.path,
                cursor: 0,
                looping,
                timer: None,
            },
        );
        Some(id)
    }

    /// Advance a line's cursor
    ///
    /// A looping line wraps to the start of its path; any other line is
    /// removed and its voice stopped once the path is exhausted.
    pub fn advance(&mut self, id: LineId) -> StepOutcome {
        let Some(line) = self.lines.get_mut(&id) else {
            return StepOutcome::Missing;
        };
        line.timer = None;

        if line.cursor >= line.path.len() {
            if line.looping {
                line.cursor = 0;
            } else {
                self.lines.remove(&id);
                self.voices.stop_one(VoiceOwner::Line(id));
                log::debug!("{} finished", id);
                return StepOutcome::Finished;
            }
        }

        let cell = line.path[line.cursor];
        line.cursor += 1;
        StepOutcome::Play(cell)
    }

    /// Record the timer of a line's next step
    pub fn arm(&mut self, id: LineId, timer: TimerId) {
        if let Some(line) = self.lines.get_mut(&id) {
            line.timer = Some(timer);
        }
    }

    /// Start a voice in a line's slot, replacing the line's previous voice
    pub fn start_voice(&mut self, voice: Voice) {
        self.voices.start(voice);
    }

    /// Fade a line's voice while leaving the line scheduled
    pub fn stop_voice(&mut self, owner: VoiceOwner) {
        self.voices.stop_one(owner);
    }

    /// Stop one line: cancel its pending step and fade its voice
    pub fn stop_line<E>(&mut self, id: LineId, timers: &mut TimerQueue<E>) -> bool {
        let Some(line) = self.lines.remove(&id) else {
            return false;
        };
        if let Some(timer) = line.timer {
            timers.cancel(timer);
        }
        self.voices.stop_one(VoiceOwner::Line(id));
        true
    }

    /// Stop every line; no step of any of them runs afterwards
    pub fn stop_all<E>(&mut self, timers: &mut TimerQueue<E>) {
        let lines = std::mem::take(&mut self.lines);
        for line in lines.values() {
            if let Some(timer) = line.timer {
                timers.cancel(timer);
            }
        }
        self.voices.stop_all();
        self.gesture = None;
        if !lines.is_empty() {
            log::debug!("stopped {} lines", lines.len());
        }
    }

    pub fn get(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    pub fn is_active(&self, id: LineId) -> bool {
        self.lines.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_ids(&self) -> impl Iterator<Item = LineId> + '_ {
        self.lines.keys().copied()
    }

    pub fn voices(&self) -> &VoiceRegistry {
        &self.voices
    }

    pub fn has_sound(&self) -> bool {
        self.voices.has_sound()
    }

    pub fn process_frame(&mut self, now: u64, left: &mut [f32], right: &mut [f32]) {
        self.voices.process_frame(now, left, right);
    }
}

impl Default for LineEngine {
    fn default() -> Self {
        Self::new()
    }
}
