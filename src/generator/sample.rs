//! Sample-based producers
//!
//! A [`SampleBank`] maps note names ("C4", "Db5", ...) to decoded mono
//! buffers. [`SamplePlayer`] plays one buffer once, converting from the
//! buffer's sample rate to the output rate with linear interpolation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::{GeneratorState, SignalGenerator};
use crate::error::{Error, Result};
use crate::wav::read_wav_mono;

/// A decoded, ready-to-play mono buffer
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Plays a [`SampleBuffer`] once
pub struct SamplePlayer {
    buffer: SampleBuffer,
    /// Fractional read position in buffer samples
    position: f64,
    /// Buffer samples advanced per output sample
    step: f64,
    completed: bool,
}

impl SamplePlayer {
    pub fn new(buffer: SampleBuffer, output_rate: u32) -> Self {
        let step = buffer.sample_rate as f64 / output_rate.max(1) as f64;
        let completed = buffer.is_empty();
        Self {
            buffer,
            position: 0.0,
            step,
            completed,
        }
    }

    fn read(&self, position: f64) -> f32 {
        let samples = &self.buffer.samples;
        let index = position as usize;
        let frac = (position - index as f64) as f32;
        let a = samples.get(index).copied().unwrap_or(0.0);
        let b = samples.get(index + 1).copied().unwrap_or(0.0);
        a + (b - a) * frac
    }
}

impl SignalGenerator for SamplePlayer {
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState {
        let len = self.buffer.len() as f64;
        for sample in buffer.iter_mut() {
            if self.completed {
                *sample = 0.0;
                continue;
            }
            *sample = self.read(self.position);
            self.position += self.step;
            if self.position >= len {
                self.completed = true;
            }
        }

        if self.completed {
            GeneratorState::Complete
        } else {
            GeneratorState::Running
        }
    }

    fn is_complete(&self) -> bool {
        self.completed
    }

    fn reset(&mut self) {
        self.position = 0.0;
        self.completed = self.buffer.is_empty();
    }
}

/// Note name to buffer mapping
///
/// An empty bank makes every voice fall back to a synthesized tone.
#[derive(Debug, Clone, Default)]
pub struct SampleBank {
    buffers: HashMap<String, SampleBuffer>,
}

impl SampleBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, note_name: impl Into<String>, buffer: SampleBuffer) {
        self.buffers.insert(note_name.into(), buffer);
    }

    pub fn get(&self, note_name: &str) -> Option<&SampleBuffer> {
        self.buffers.get(note_name)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Load every `<NoteName>.wav` in a directory
    ///
    /// Files that fail to decode are skipped with a warning. A directory that
    /// cannot be listed is reported as [`Error::MalformedSampleBank`].
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| Error::MalformedSampleBank {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut bank = SampleBank::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    log::warn!(target: "samples", "skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let is_wav = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_wav {
                continue;
            }

            match read_wav_mono(&path) {
                Ok((samples, sample_rate)) => {
                    log::debug!(target: "samples", "loaded {} ({} samples)", name, samples.len());
                    bank.insert(name, SampleBuffer::new(samples, sample_rate));
                }
                Err(e) => {
                    log::warn!(target: "samples", "skipping {}: {}", path.display(), e);
                }
            }
        }

        log::info!(target: "samples", "sample bank loaded: {} notes from {}", bank.len(), dir.display());
        Ok(bank)
    }

    /// Like [`SampleBank::load_dir`], but a failed load yields an empty bank
    pub fn load_dir_or_empty(dir: &Path) -> Self {
        match Self::load_dir(dir) {
            Ok(bank) => bank,
            Err(e) => {
                log::warn!(target: "samples", "{}; falling back to synthesized tones", e);
                SampleBank::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::write_wav_mono;

    #[test]
    fn test_player_plays_once() {
        let buffer = SampleBuffer::new(vec![0.5; 10], 44100);
        let mut player = SamplePlayer::new(buffer, 44100);
        let mut frame = [0.0f32; 8];

        assert_eq!(player.process(&mut frame), GeneratorState::Running);
        assert_eq!(frame[0], 0.5);

        assert_eq!(player.process(&mut frame), GeneratorState::Complete);
        assert_eq!(frame[1], 0.5);
        assert_eq!(frame[2], 0.0);
        assert!(player.is_complete());
    }

    #[test]
    fn test_player_rate_conversion() {
        // 22.05kHz buffer at 44.1kHz output lasts twice as many samples
        let buffer = SampleBuffer::new(vec![0.0, 1.0, 0.0, 1.0], 22050);
        let mut player = SamplePlayer::new(buffer, 44100);
        let mut frame = [0.0f32; 8];
        let state = player.process(&mut frame);

        assert_eq!(state, GeneratorState::Complete);
        assert!((frame[1] - 0.5).abs() < 1e-6);
        assert!((frame[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_buffer_is_complete() {
        let player = SamplePlayer::new(SampleBuffer::new(vec![], 44100), 44100);
        assert!(player.is_complete());
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_wav_mono(&dir.path().join("C4.wav"), &[0.25; 100], 44100).unwrap();
        write_wav_mono(&dir.path().join("Db5.wav"), &[0.25; 50], 22050).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not audio").unwrap();
        std::fs::write(dir.path().join("E4.wav"), "not a wav file").unwrap();

        let bank = SampleBank::load_dir(dir.path()).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.get("C4").unwrap().len(), 100);
        assert_eq!(bank.get("Db5").unwrap().sample_rate(), 22050);
        assert!(bank.get("E4").is_none());
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = SampleBank::load_dir(&missing).unwrap_err();
        assert!(matches!(err, Error::MalformedSampleBank { .. }));

        assert!(SampleBank::load_dir_or_empty(&missing).is_empty());
    }
}
