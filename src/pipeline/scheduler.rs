//! Scripted performance
//!
//! Replays a parsed gesture script against a [`Session`], renders the
//! stereo output and records everything the session reports. Script events
//! fire on their exact sample; frames are split at event boundaries.

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::generator::SampleBank;
use crate::image::PixelBuffer;
use crate::pipeline::parser::{parse_script, script_length, ScriptEvent, TimedEvents};
use crate::pipeline::session::{NoteFacts, PlaybackEvent, Session};
use crate::wav::write_wav_stereo;

/// Configuration for a scripted performance
#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    /// Number of samples per frame
    pub frame_size: usize,
    /// Length of one script timestep
    pub timestep_ms: f64,
    /// How long lines and voices may keep sounding after the script ends
    pub tail_limit_ms: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            frame_size: 64,
            timestep_ms: 10.0,
            tail_limit_ms: 8000.0,
        }
    }
}

/// Rendered stereo output
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl Rendered {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

pub struct Performance {
    config: PerformanceConfig,
    session: Session,
    events: Vec<TimedEvents>,
    timestep_samples: u64,
    /// Current sample position
    current_sample: u64,
    /// Current event index
    event_index: usize,
    /// Samples until next event
    samples_to_next_event: u64,
    /// Whether there are more events to process
    has_more_events: bool,
    /// Everything the session reported, in order
    history: Vec<PlaybackEvent>,
}

impl Performance {
    /// Create a performance over a prepared session
    ///
    /// # Arguments
    /// * `session` - Session with its pixel grid (and samples) loaded
    /// * `config` - Performance configuration
    /// * `events` - Parsed script in chronological order
    pub fn new(session: Session, config: PerformanceConfig, events: Vec<TimedEvents>) -> Self {
        let timestep_samples =
            ((config.timestep_ms * session.sample_rate() as f64 / 1000.0).round() as u64).max(1);

        let has_more_events = !events.is_empty();
        let samples_to_next_event = events
            .first()
            .map_or(0, |e| e.delta as u64 * timestep_samples);

        Self {
            config,
            session,
            events,
            timestep_samples,
            current_sample: 0,
            event_index: 0,
            samples_to_next_event,
            has_more_events,
            history: Vec::new(),
        }
    }

    /// Build a session from `config`, load its samples and `pixels`, and
    /// parse `script` into a ready-to-render performance
    pub fn from_script(config: &Config, pixels: PixelBuffer, script: &str) -> Result<Self> {
        let events = parse_script(script)?;

        let mut session = Session::new(&config.session());
        if let Some(dir) = config.samples_dir() {
            session.set_sample_bank(SampleBank::load_dir_or_empty(dir));
        }
        session.load_pixels(pixels);

        let performance_config = PerformanceConfig {
            frame_size: config.frame_size(),
            ..PerformanceConfig::default()
        };
        Ok(Self::new(session, performance_config, events))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn history(&self) -> &[PlaybackEvent] {
        &self.history
    }

    /// Played notes with their onset sample
    pub fn notes(&self) -> impl Iterator<Item = (u64, &NoteFacts)> + '_ {
        self.history.iter().filter_map(|event| match event {
            PlaybackEvent::Note { at, facts } => Some((*at, facts)),
            _ => None,
        })
    }

    /// Check if there are more events, running lines or audible voices
    pub fn is_active(&self) -> bool {
        self.has_more_events || self.session.is_active()
    }

    fn apply(&mut self, event: ScriptEvent) {
        let session = &mut self.session;
        match event {
            ScriptEvent::Down(cell) => session.pointer_down(cell),
            ScriptEvent::Move(cell) => session.pointer_move(cell),
            ScriptEvent::Up(cell) => session.pointer_up(cell),
            ScriptEvent::Stop => session.stop_all(),
            ScriptEvent::Mode(mode) => session.set_mode(mode),
            ScriptEvent::Scale(scale) => session.set_scale(scale),
            ScriptEvent::Duration(policy) => session.set_duration_policy(policy),
            ScriptEvent::Bpm(bpm) => session.set_bpm(bpm),
        }
    }

    /// Apply every script line due at the current sample
    fn process_events(&mut self) {
        while self.has_more_events && self.samples_to_next_event == 0 {
            let timed = self.events[self.event_index].events.clone();
            for event in timed {
                log::trace!("{}: {:?}", self.current_sample, event);
                self.apply(event);
            }

            self.event_index += 1;

            if self.event_index >= self.events.len() {
                self.has_more_events = false;
                self.samples_to_next_event = u64::MAX;
            } else {
                self.samples_to_next_event =
                    self.events[self.event_index].delta as u64 * self.timestep_samples;
            }
        }
    }

    fn advance_time(&mut self, samples: u64) {
        self.current_sample += samples;

        if self.has_more_events {
            self.samples_to_next_event = self.samples_to_next_event.saturating_sub(samples);
        }
    }

    /// Process one stereo frame
    pub fn process_frame(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = left.len().min(right.len());
        let mut offset = 0;

        while offset < len {
            self.process_events();

            let remaining = (len - offset) as u64;
            let chunk = if self.has_more_events {
                self.samples_to_next_event.min(remaining)
            } else {
                remaining
            };
            let end = offset + chunk as usize;

            self.session
                .process_frame(&mut left[offset..end], &mut right[offset..end]);
            self.history.extend(self.session.drain_events());
            self.advance_time(chunk);
            offset = end;
        }
    }

    /// Run the whole script and return the rendered audio
    ///
    /// Rendering continues after the last script line until everything is
    /// silent. Once the tail limit is reached, all playback is stopped and
    /// only the fades are rendered.
    pub fn render(&mut self) -> Rendered {
        let sample_rate = self.session.sample_rate() as f64;
        let frame_size = self.config.frame_size.max(1);
        let limit = script_length(&self.events) as u64 * self.timestep_samples
            + (self.config.tail_limit_ms * sample_rate / 1000.0).round() as u64;

        let mut rendered = Rendered::default();
        let mut left = vec![0.0f32; frame_size];
        let mut right = vec![0.0f32; frame_size];

        while self.is_active() {
            if self.current_sample >= limit {
                log::info!("tail limit reached at sample {}, stopping", self.current_sample);
                self.has_more_events = false;
                self.session.stop_all();
                break;
            }
            self.process_frame(&mut left, &mut right);
            rendered.left.extend_from_slice(&left);
            rendered.right.extend_from_slice(&right);
        }

        // Fades only; no timers remain
        while self.session.is_active() {
            self.process_frame(&mut left, &mut right);
            rendered.left.extend_from_slice(&left);
            rendered.right.extend_from_slice(&right);
        }

        log::info!(
            "rendered {} samples, {} notes",
            rendered.len(),
            self.notes().count()
        );
        rendered
    }

    /// Generate complete audio and write to a stereo WAV file
    pub fn generate_wav(&mut self, output_path: &Path) -> Result<Rendered> {
        let rendered = self.render();
        write_wav_stereo(
            output_path,
            &rendered.left,
            &rendered.right,
            self.session.sample_rate(),
        )?;
        Ok(rendered)
    }
}
