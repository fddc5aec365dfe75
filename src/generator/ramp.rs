use super::{GeneratorState, SignalGenerator};

/// A linear gain ramp
///
/// Moves from a start gain to an end gain over a fixed number of samples,
/// then holds the end gain. Voices use it as the anti-click fade applied
/// before their producer is released.
pub struct GainRamp {
    start: f32,
    end: f32,
    /// Current sample position
    position: usize,
    /// Total duration in samples
    duration: usize,
    completed: bool,
}

impl GainRamp {
    /// Create a new gain ramp
    ///
    /// # Example
    /// ```
    /// use chromatone::generator::GainRamp;
    ///
    /// let fade = GainRamp::new(1.0, 0.0, 1323); // 30ms fade-out at 44.1kHz
    /// assert_eq!(fade.value(), 1.0);
    /// ```
    pub fn new(start: f32, end: f32, duration_samples: usize) -> Self {
        Self {
            start,
            end,
            position: 0,
            duration: duration_samples.max(1),
            completed: false,
        }
    }

    /// Fade from `start` down to silence
    pub fn fade_out(start: f32, duration_samples: usize) -> Self {
        Self::new(start, 0.0, duration_samples)
    }

    /// Gain at the current position
    pub fn value(&self) -> f32 {
        if self.completed {
            return self.end;
        }
        self.value_at(self.position)
    }

    fn value_at(&self, position: usize) -> f32 {
        let t = (position as f32 / self.duration as f32).min(1.0);
        self.start + (self.end - self.start) * t
    }

    pub fn duration(&self) -> usize {
        self.duration
    }
}

impl SignalGenerator for GainRamp {
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState {
        if self.completed {
            buffer.fill(self.end);
            return GeneratorState::Complete;
        }

        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample = self.value_at(self.position + i + 1);
        }

        self.position += buffer.len();

        if self.position >= self.duration {
            self.completed = true;
            GeneratorState::Complete
        } else {
            GeneratorState::Running
        }
    }

    fn is_complete(&self) -> bool {
        self.completed
    }

    fn reset(&mut self) {
        self.position = 0;
        self.completed = false;
    }
}
