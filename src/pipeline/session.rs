//! Playback session
//!
//! Owns the clock, the timer queue, both voice registries and the line
//! engine. Pointer events go in, stereo frames and [`PlaybackEvent`]s come
//! out. Timers fire on their exact sample: each frame is rendered in chunks
//! split at every due timer.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::error::PlaybackIssue;
use crate::generator::SampleBank;
use crate::image::{Cell, PixelBuffer, Rgb};
use crate::pipeline::lines::{Line, LineEngine, LineId, StepOutcome};
use crate::pipeline::mapper::{map_color, pan_label, volume_percent, SoundParams};
use crate::pipeline::scale::{note_name, quantize, PitchRange, Scale};
use crate::pipeline::tempo::{DurationPolicy, Onset, OnsetGrid, TempoGrid};
use crate::pipeline::timer::{TimerId, TimerQueue};
use crate::pipeline::voice::{Instrument, VoiceOwner};
use crate::pipeline::voicemgr::{soft_clip_frame, VoicePolicy, VoiceRegistry};

/// How pointer gestures are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// One note at a time under the pointer
    #[default]
    Single,
    /// Drag a line; it plays through once
    Line,
    /// Drag a line; it repeats until stopped
    LoopingLine,
}

impl PlaybackMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "single" => Some(PlaybackMode::Single),
            "line" => Some(PlaybackMode::Line),
            "loop" | "looping-line" | "looping" => Some(PlaybackMode::LoopingLine),
            _ => None,
        }
    }

    pub fn draws_lines(self) -> bool {
        self != PlaybackMode::Single
    }
}

/// Facts about a played note for the status display
#[derive(Debug, Clone, PartialEq)]
pub struct NoteFacts {
    pub cell: Cell,
    pub color: Rgb,
    pub pitch: u8,
    pub note_name: String,
    pub volume_percent: u8,
    pub pan_label: String,
    pub owner: VoiceOwner,
}

/// Output for the renderer and status display
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Highlight {
        cell: Cell,
        color: Rgb,
        owner: VoiceOwner,
    },
    Note {
        at: u64,
        facts: NoteFacts,
    },
    /// Rasterized path of the gesture in progress
    PathPreview {
        cells: Vec<Cell>,
    },
    LineStarted {
        line: LineId,
        cells: usize,
    },
    LineFinished {
        line: LineId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    FreePlayOnset,
    LineStep(LineId),
}

/// Free-play note waiting for the next grid boundary
#[derive(Debug, Clone, Copy)]
struct PendingNote {
    cell: Cell,
    color: Rgb,
    sound: SoundParams,
    /// Grid period drawn for this onset; also the note's gate length
    period: u64,
}

const LINE_COLORS: [Rgb; 6] = [
    Rgb::new(255, 64, 64),
    Rgb::new(64, 200, 255),
    Rgb::new(255, 200, 0),
    Rgb::new(120, 255, 120),
    Rgb::new(255, 100, 255),
    Rgb::new(255, 150, 60),
];

fn highlight_color(owner: VoiceOwner) -> Rgb {
    match owner {
        VoiceOwner::FreePlay => Rgb::new(255, 255, 255),
        VoiceOwner::Line(id) => LINE_COLORS[(id.get() as usize) % LINE_COLORS.len()],
    }
}

pub struct Session {
    sample_rate: u32,
    mode: PlaybackMode,
    scale: Scale,
    pitch_range: PitchRange,
    grid: Option<(usize, usize)>,
    /// Current sample position
    clock: u64,
    timers: TimerQueue<TimerEvent>,
    tempo: TempoGrid,
    onsets: OnsetGrid,
    pending: Option<(PendingNote, TimerId)>,
    free_play: VoiceRegistry,
    lines: LineEngine,
    instrument: Instrument,
    pixels: Option<Arc<PixelBuffer>>,
    /// Last cell that triggered free play during the current drag
    hovered: Option<Cell>,
    events: Vec<PlaybackEvent>,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        let ms = |ms: f64| (ms * config.sample_rate as f64 / 1000.0).round() as u64;
        let fade_samples = ms(config.fade_ms).max(1) as usize;

        Self {
            sample_rate: config.sample_rate,
            mode: config.mode,
            scale: config.scale,
            pitch_range: config.pitch_range,
            grid: config.grid,
            clock: 0,
            timers: TimerQueue::new(),
            tempo: TempoGrid::new(config.bpm, config.duration, config.sample_rate, config.seed),
            onsets: OnsetGrid::new(ms(config.onset_epsilon_ms)),
            pending: None,
            free_play: VoiceRegistry::new(VoicePolicy::Exclusive),
            lines: LineEngine::new(),
            instrument: Instrument::new(config.sample_rate, config.waveform, fade_samples),
            pixels: None,
            hovered: None,
            events: Vec::new(),
        }
    }

    /// Current sample position
    pub fn now(&self) -> u64 {
        self.clock
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Switch modes; a gesture in progress is dropped
    pub fn set_mode(&mut self, mode: PlaybackMode) {
        if mode != self.mode {
            self.lines.cancel_gesture();
            self.hovered = None;
            log::info!("mode: {:?}", mode);
        }
        self.mode = mode;
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    pub fn pitch_range(&self) -> PitchRange {
        self.pitch_range
    }

    pub fn set_pitch_range(&mut self, range: PitchRange) {
        self.pitch_range = range;
    }

    pub fn set_duration_policy(&mut self, policy: DurationPolicy) {
        self.tempo.set_policy(policy);
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.tempo.set_bpm(bpm);
    }

    pub fn tempo(&self) -> &TempoGrid {
        &self.tempo
    }

    /// Replace the pixel grid in one assignment
    ///
    /// The buffer is resampled first when a grid resolution is configured.
    /// Running lines read from the new buffer at their next step.
    pub fn load_pixels(&mut self, buffer: PixelBuffer) {
        let buffer = match self.grid {
            Some((columns, rows)) => buffer.resample(columns, rows),
            None => buffer,
        };
        log::info!("pixel grid loaded: {}x{}", buffer.width(), buffer.height());
        self.pixels = Some(Arc::new(buffer));
    }

    pub fn pixels(&self) -> Option<Arc<PixelBuffer>> {
        self.pixels.clone()
    }

    pub fn set_sample_bank(&mut self, bank: SampleBank) {
        self.instrument.set_bank(bank);
    }

    pub fn pointer_down(&mut self, cell: Cell) {
        if self.mode.draws_lines() {
            let Some(pixels) = self.snapshot() else {
                return;
            };
            if !pixels.contains(cell) {
                log::debug!("{}", PlaybackIssue::OutOfBounds { x: cell.x, y: cell.y });
                self.lines.cancel_gesture();
                return;
            }
            self.lines.begin_gesture(cell);
            self.events.push(PlaybackEvent::PathPreview { cells: vec![cell] });
        } else {
            self.hovered = Some(cell);
            self.submit_free_play(cell);
        }
    }

    pub fn pointer_move(&mut self, cell: Cell) {
        if self.mode.draws_lines() {
            if !self.lines.is_armed() {
                return;
            }
            let Some(clamped) = self.snapshot().and_then(|p| p.clamp(cell)) else {
                return;
            };
            if let Some(path) = self.lines.update_gesture(clamped) {
                let cells = path.to_vec();
                self.events.push(PlaybackEvent::PathPreview { cells });
            }
        } else if self.hovered.is_some_and(|h| h != cell) {
            self.hovered = Some(cell);
            self.submit_free_play(cell);
        }
    }

    pub fn pointer_up(&mut self, cell: Cell) {
        if !self.mode.draws_lines() {
            self.hovered = None;
            return;
        }
        if !self.lines.is_armed() {
            return;
        }

        self.pointer_move(cell);
        let looping = self.mode == PlaybackMode::LoopingLine;
        if let Some(id) = self.lines.commit_gesture(looping) {
            let cells = self.lines.get(id).map_or(0, |line| line.path().len());
            self.events.push(PlaybackEvent::LineStarted { line: id, cells });
            self.run_line_step(id, self.clock);
        }
    }

    /// Silence everything: pending free-play note, free-play voice and every
    /// line. No line step runs after this returns; fade tails keep draining.
    pub fn stop_all(&mut self) {
        self.cancel_pending();
        self.free_play.stop_all();
        self.lines.stop_all(&mut self.timers);
        self.hovered = None;
    }

    pub fn stop_line(&mut self, id: LineId) -> bool {
        self.lines.stop_line(id, &mut self.timers)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id)
    }

    pub fn active_lines(&self) -> Vec<LineId> {
        self.lines.line_ids().collect()
    }

    pub fn free_play_voices(&self) -> &VoiceRegistry {
        &self.free_play
    }

    pub fn line_voices(&self) -> &VoiceRegistry {
        self.lines.voices()
    }

    pub fn has_pending_note(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of scheduled timers (pending note and line steps)
    pub fn scheduled_timers(&self) -> usize {
        self.timers.len()
    }

    /// True while lines run, a note waits, or any voice is audible
    pub fn is_active(&self) -> bool {
        self.lines.active_count() > 0
            || self.pending.is_some()
            || self.free_play.has_sound()
            || self.lines.has_sound()
    }

    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Render one stereo frame and advance the clock by its length
    pub fn process_frame(&mut self, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        right.fill(0.0);

        let len = left.len().min(right.len());
        let mut offset = 0;
        while offset < len {
            self.fire_due_timers();

            let remaining = (len - offset) as u64;
            let boundary = [self.timers.next_due(), self.free_play.next_release()]
                .into_iter()
                .flatten()
                .filter(|&at| at > self.clock)
                .min();
            let chunk = boundary.map_or(remaining, |at| (at - self.clock).min(remaining)) as usize;

            let end = offset + chunk;
            self.free_play
                .process_frame(self.clock, &mut left[offset..end], &mut right[offset..end]);
            self.lines
                .process_frame(self.clock, &mut left[offset..end], &mut right[offset..end]);

            self.clock += chunk as u64;
            offset = end;
        }

        soft_clip_frame(left, right);
    }

    /// Advance the clock without rendering audio
    pub fn advance(&mut self, samples: u64) {
        let mut left = vec![0.0f32; samples as usize];
        let mut right = vec![0.0f32; samples as usize];
        self.process_frame(&mut left, &mut right);
    }

    fn fire_due_timers(&mut self) {
        while let Some((at, _, event)) = self.timers.pop_due(self.clock) {
            match event {
                TimerEvent::FreePlayOnset => self.fire_pending(at),
                TimerEvent::LineStep(id) => self.run_line_step(id, at),
            }
        }
    }

    fn snapshot(&self) -> Option<Arc<PixelBuffer>> {
        if self.pixels.is_none() {
            log::debug!("{}", PlaybackIssue::InputUnavailable);
        }
        self.pixels.clone()
    }

    fn color_at(&self, cell: Cell) -> Option<Rgb> {
        let pixels = self.snapshot()?;
        let color = pixels.get(cell);
        if color.is_none() {
            log::debug!("{}", PlaybackIssue::OutOfBounds { x: cell.x, y: cell.y });
        }
        color
    }

    /// Map a color to sound and snap its pitch to the active scale
    fn resolve(&self, color: Rgb) -> SoundParams {
        let mut sound = map_color(color, self.pitch_range);
        sound.pitch = quantize(sound.pitch, self.scale, self.pitch_range).min(127);
        sound
    }

    fn submit_free_play(&mut self, cell: Cell) {
        let Some(color) = self.color_at(cell) else {
            return;
        };
        let note = PendingNote {
            cell,
            color,
            sound: self.resolve(color),
            period: self.tempo.next_note_duration(),
        };

        self.cancel_pending();
        match self.onsets.schedule(self.clock, note.period) {
            Onset::Now => self.play_free(note, self.clock),
            Onset::At(at) => {
                let timer = self.timers.schedule(at, TimerEvent::FreePlayOnset);
                self.pending = Some((note, timer));
            }
        }
    }

    fn cancel_pending(&mut self) {
        if let Some((_, timer)) = self.pending.take() {
            self.timers.cancel(timer);
        }
    }

    fn fire_pending(&mut self, at: u64) {
        if let Some((note, _)) = self.pending.take() {
            self.onsets.commit(at);
            self.play_free(note, at);
        }
    }

    fn play_free(&mut self, note: PendingNote, at: u64) {
        let owner = VoiceOwner::FreePlay;
        let voice = self
            .instrument
            .voice(owner, note.sound.pitch, note.sound.volume, note.sound.pan, at)
            .with_release_at(at + note.period);
        self.free_play.start(voice);
        self.emit_note(owner, note.cell, note.color, note.sound, at);
    }

    fn run_line_step(&mut self, id: LineId, at: u64) {
        match self.lines.advance(id) {
            StepOutcome::Play(cell) => {
                let owner = VoiceOwner::Line(id);
                match self.color_at(cell) {
                    Some(color) => {
                        let sound = self.resolve(color);
                        let voice = self
                            .instrument
                            .voice(owner, sound.pitch, sound.volume, sound.pan, at);
                        self.lines.start_voice(voice);
                        self.emit_note(owner, cell, color, sound, at);
                    }
                    // off-grid or no buffer: silence the slot
                    None => self.lines.stop_voice(owner),
                }
                let next = at + self.tempo.next_note_duration();
                let timer = self.timers.schedule(next, TimerEvent::LineStep(id));
                self.lines.arm(id, timer);
            }
            StepOutcome::Finished => {
                self.events.push(PlaybackEvent::LineFinished { line: id });
            }
            StepOutcome::Missing => {
                log::trace!("step for stopped {}", id);
            }
        }
    }

    fn emit_note(&mut self, owner: VoiceOwner, cell: Cell, color: Rgb, sound: SoundParams, at: u64) {
        self.events.push(PlaybackEvent::Highlight {
            cell,
            color: highlight_color(owner),
            owner,
        });
        self.events.push(PlaybackEvent::Note {
            at,
            facts: NoteFacts {
                cell,
                color,
                pitch: sound.pitch,
                note_name: note_name(sound.pitch),
                volume_percent: volume_percent(sound.volume),
                pan_label: pan_label(sound.pan),
                owner,
            },
        });
    }
}
