use super::{pitch_frequency, GeneratorState, SignalGenerator};
use std::f32::consts::PI;

/// Oscillator waveform for synthesized voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
}

impl Waveform {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sine" => Some(Waveform::Sine),
            "triangle" => Some(Waveform::Triangle),
            _ => None,
        }
    }

    /// One cycle of the waveform, `phase` in [0, 2π)
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => phase.sin(),
            Waveform::Triangle => {
                let t = phase / (2.0 * PI);
                1.0 - 4.0 * (t - 0.5).abs()
            }
        }
    }
}

/// Synthesized tone at the equal-temperament frequency of a pitch
///
/// The tone never completes on its own; the owning voice fades it out and
/// drops it.
pub struct ToneGenerator {
    waveform: Waveform,
    frequency: f32,
    /// Phase increment per sample in radians
    phase_per_sample: f32,
    phase: f32,
}

impl ToneGenerator {
    /// # Example
    /// ```
    /// use chromatone::generator::{ToneGenerator, Waveform};
    ///
    /// let tone = ToneGenerator::new(69, Waveform::Sine, 44100);
    /// assert!((tone.frequency() - 440.0).abs() < 0.001);
    /// ```
    pub fn new(pitch: u8, waveform: Waveform, sample_rate: u32) -> Self {
        let frequency = pitch_frequency(pitch.min(127));
        Self {
            waveform,
            frequency,
            phase_per_sample: 2.0 * PI * frequency / sample_rate.max(1) as f32,
            phase: 0.0,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }
}

impl SignalGenerator for ToneGenerator {
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState {
        let two_pi = 2.0 * PI;
        for sample in buffer.iter_mut() {
            *sample = self.waveform.sample(self.phase);
            self.phase = (self.phase + self.phase_per_sample) % two_pi;
        }
        GeneratorState::Running
    }

    fn is_complete(&self) -> bool {
        false
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Count upward zero crossings to estimate frequency
    fn count_cycles(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count()
    }

    #[test]
    fn test_tone_frequency_a4() {
        let mut tone = ToneGenerator::new(69, Waveform::Sine, 44100);
        let mut buffer = vec![0.0f32; 44100];
        let state = tone.process(&mut buffer);
        assert_eq!(state, GeneratorState::Running);

        let cycles = count_cycles(&buffer);
        assert!((439..=441).contains(&cycles), "got {} cycles", cycles);
    }

    #[test]
    fn test_triangle_bounds() {
        let mut tone = ToneGenerator::new(60, Waveform::Triangle, 8000);
        let mut buffer = vec![0.0f32; 1000];
        tone.process(&mut buffer);
        assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert_eq!(buffer[0], -1.0);
    }

    #[test]
    fn test_never_completes() {
        let mut tone = ToneGenerator::new(40, Waveform::Sine, 44100);
        let mut buffer = vec![0.0f32; 64];
        for _ in 0..100 {
            tone.process(&mut buffer);
        }
        assert!(!tone.is_complete());
    }

    #[test]
    fn test_waveform_names() {
        assert_eq!(Waveform::from_name("Triangle"), Some(Waveform::Triangle));
        assert_eq!(Waveform::from_name("sine"), Some(Waveform::Sine));
        assert_eq!(Waveform::from_name("saw"), None);
    }
}
