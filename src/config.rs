//! Configuration
//!
//! Defaults live in the embedded `config.toml`. A user file overrides
//! individual keys; anything it leaves out, or names badly, keeps the default.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::generator::Waveform;
use crate::pipeline::scale::{PitchRange, Scale};
use crate::pipeline::session::PlaybackMode;
use crate::pipeline::tempo::DurationPolicy;

const DEFAULT_CONFIG: &str = include_str!("config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    music: MusicConfig,
    #[serde(default)]
    playback: PlaybackConfig,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    sample_rate: Option<u32>,
    frame_size: Option<usize>,
    fade_ms: Option<f64>,
    waveform: Option<String>,
    samples_dir: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct MusicConfig {
    bpm: Option<f64>,
    scale: Option<String>,
    min_pitch: Option<u8>,
    max_pitch: Option<u8>,
    duration: Option<String>,
    onset_epsilon_ms: Option<f64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Default)]
struct PlaybackConfig {
    mode: Option<String>,
    grid_columns: Option<usize>,
    grid_rows: Option<usize>,
}

/// Everything a [`Session`](crate::pipeline::Session) needs, resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub bpm: f64,
    pub scale: Scale,
    pub pitch_range: PitchRange,
    pub mode: PlaybackMode,
    pub duration: DurationPolicy,
    pub fade_ms: f64,
    pub onset_epsilon_ms: f64,
    pub waveform: Waveform,
    /// Grid resolution (columns, rows); one cell per pixel when `None`
    pub grid: Option<(usize, usize)>,
    pub samples_dir: Option<PathBuf>,
    /// Seed for the random duration policy
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_size: 64,
            bpm: 120.0,
            scale: Scale::Major,
            pitch_range: PitchRange::default(),
            mode: PlaybackMode::Single,
            duration: DurationPolicy::default(),
            fade_ms: 30.0,
            onset_epsilon_ms: 5.0,
            waveform: Waveform::Sine,
            grid: None,
            samples_dir: None,
            seed: None,
        }
    }
}

pub struct Config {
    audio: AudioConfig,
    music: MusicConfig,
    playback: PlaybackConfig,
}

impl Config {
    /// Embedded defaults merged with the user's config file, if any
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::from_file(embedded()),
        }
    }

    /// Embedded defaults merged with `path`
    ///
    /// An unreadable or malformed file is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let mut base = embedded();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => {
                    log::info!(target: "config", "loaded {}", path.display());
                    merge(&mut base, user);
                }
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        Self::from_file(base)
    }

    /// Embedded defaults merged with `text`; malformed text is an error
    pub fn parse(text: &str) -> Result<Self> {
        let user: ConfigFile = toml::from_str(text)?;
        let mut base = embedded();
        merge(&mut base, user);
        Ok(Self::from_file(base))
    }

    fn from_file(file: ConfigFile) -> Self {
        Config {
            audio: file.audio,
            music: file.music,
            playback: file.playback,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.audio.frame_size.unwrap_or(64).clamp(1, 8192)
    }

    pub fn samples_dir(&self) -> Option<&Path> {
        self.audio.samples_dir.as_deref()
    }

    pub fn session(&self) -> SessionConfig {
        let fallback = SessionConfig::default();

        let min_pitch = self.music.min_pitch.unwrap_or(fallback.pitch_range.min);
        let max_pitch = self.music.max_pitch.unwrap_or(fallback.pitch_range.max);
        let grid = match (self.playback.grid_columns, self.playback.grid_rows) {
            (Some(columns), Some(rows)) if columns > 0 && rows > 0 => Some((columns, rows)),
            (None, None) => None,
            (columns, rows) => {
                log::warn!(target: "config", "ignoring incomplete grid {:?}x{:?}", columns, rows);
                None
            }
        };

        SessionConfig {
            sample_rate: self
                .audio
                .sample_rate
                .filter(|&rate| rate > 0)
                .unwrap_or(fallback.sample_rate),
            frame_size: self.frame_size(),
            bpm: self
                .music
                .bpm
                .filter(|bpm| *bpm > 0.0 && bpm.is_finite())
                .unwrap_or(fallback.bpm),
            scale: self
                .music
                .scale
                .as_deref()
                .map(Scale::from_name)
                .unwrap_or(fallback.scale),
            pitch_range: PitchRange::new(min_pitch, max_pitch),
            mode: self
                .playback
                .mode
                .as_deref()
                .and_then(PlaybackMode::from_name)
                .unwrap_or(fallback.mode),
            duration: self
                .music
                .duration
                .as_deref()
                .and_then(DurationPolicy::from_name)
                .unwrap_or(fallback.duration),
            fade_ms: self.audio.fade_ms.unwrap_or(fallback.fade_ms).max(0.0),
            onset_epsilon_ms: self
                .music
                .onset_epsilon_ms
                .unwrap_or(fallback.onset_epsilon_ms)
                .max(0.0),
            waveform: self
                .audio
                .waveform
                .as_deref()
                .and_then(Waveform::from_name)
                .unwrap_or(fallback.waveform),
            grid,
            samples_dir: self.audio.samples_dir.clone(),
            seed: self.music.seed,
        }
    }
}

fn embedded() -> ConfigFile {
    toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
        log::error!(target: "config", "embedded config.toml is invalid: {}", e);
        ConfigFile::default()
    })
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chromatone").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    merge_audio(&mut base.audio, user.audio);
    merge_music(&mut base.music, user.music);
    merge_playback(&mut base.playback, user.playback);
}

fn merge_audio(base: &mut AudioConfig, user: AudioConfig) {
    if user.sample_rate.is_some() {
        base.sample_rate = user.sample_rate;
    }
    if user.frame_size.is_some() {
        base.frame_size = user.frame_size;
    }
    if user.fade_ms.is_some() {
        base.fade_ms = user.fade_ms;
    }
    if user.waveform.is_some() {
        base.waveform = user.waveform;
    }
    if user.samples_dir.is_some() {
        base.samples_dir = user.samples_dir;
    }
}

fn merge_music(base: &mut MusicConfig, user: MusicConfig) {
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
    if user.scale.is_some() {
        base.scale = user.scale;
    }
    if user.min_pitch.is_some() {
        base.min_pitch = user.min_pitch;
    }
    if user.max_pitch.is_some() {
        base.max_pitch = user.max_pitch;
    }
    if user.duration.is_some() {
        base.duration = user.duration;
    }
    if user.onset_epsilon_ms.is_some() {
        base.onset_epsilon_ms = user.onset_epsilon_ms;
    }
    if user.seed.is_some() {
        base.seed = user.seed;
    }
}

fn merge_playback(base: &mut PlaybackConfig, user: PlaybackConfig) {
    if user.mode.is_some() {
        base.mode = user.mode;
    }
    if user.grid_columns.is_some() {
        base.grid_columns = user.grid_columns;
    }
    if user.grid_rows.is_some() {
        base.grid_rows = user.grid_rows;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::pipeline::tempo::NoteDuration;

    #[test]
    fn test_embedded_defaults_match_session_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.session(), SessionConfig::default());
    }

    #[test]
    fn test_user_keys_override_defaults() {
        let config = Config::parse(
            r#"
[music]
bpm = 90.0
scale = "dorian"
duration = "random"
seed = 7

[playback]
mode = "loop"
grid_columns = 16
grid_rows = 12
"#,
        )
        .unwrap();
        let session = config.session();

        assert_eq!(session.bpm, 90.0);
        assert_eq!(session.scale, Scale::Dorian);
        assert_eq!(session.duration, DurationPolicy::Random);
        assert_eq!(session.seed, Some(7));
        assert_eq!(session.mode, PlaybackMode::LoopingLine);
        assert_eq!(session.grid, Some((16, 12)));
        // untouched keys keep their defaults
        assert_eq!(session.sample_rate, 44100);
        assert_eq!(session.fade_ms, 30.0);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = Config::parse(
            r#"
[audio]
waveform = "square"
sample_rate = 0

[music]
bpm = -10.0
duration = "whole"
min_pitch = 200
max_pitch = 200

[playback]
mode = "chord"
grid_columns = 8
"#,
        )
        .unwrap();
        let session = config.session();

        assert_eq!(session.waveform, Waveform::Sine);
        assert_eq!(session.sample_rate, 44100);
        assert_eq!(session.bpm, 120.0);
        assert_eq!(session.duration, DurationPolicy::Fixed(NoteDuration::Eighth));
        assert_eq!(session.mode, PlaybackMode::Single);
        assert_eq!(session.pitch_range.max, 127);
        assert_eq!(session.grid, None);
    }

    #[test]
    fn test_malformed_text_is_an_error() {
        assert!(Config::parse("[music\nbpm = ").is_err());
        assert!(Config::parse("[music]\nbpm = \"fast\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[audio]\nsamples_dir = \"/tmp/samples\"\nframe_size = 128").unwrap();

        let config = Config::load_from(file.path());
        assert_eq!(config.frame_size(), 128);
        assert_eq!(config.samples_dir(), Some(Path::new("/tmp/samples")));
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml = = =").unwrap();

        let config = Config::load_from(file.path());
        assert_eq!(config.session(), SessionConfig::default());

        let missing = Config::load_from(Path::new("/nonexistent/chromatone.toml"));
        assert_eq!(missing.session(), SessionConfig::default());
    }
}
