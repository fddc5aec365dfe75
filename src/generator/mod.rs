pub mod ramp;
pub mod sample;
pub mod tone;

pub use ramp::GainRamp;
pub use sample::{SampleBank, SampleBuffer, SamplePlayer};
pub use tone::{ToneGenerator, Waveform};

/// Represents the current state of a signal generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Generator is still producing samples
    Running,
    /// Generator has completed and will produce no more samples
    Complete,
}

/// Core trait for all signal generators
///
/// Signal generators produce mono samples frame by frame. Voices own one
/// producer each and apply gain and pan on top of it.
pub trait SignalGenerator {
    /// Process the next frame of samples
    ///
    /// # Arguments
    /// * `buffer` - Mutable slice to write samples into. The length determines frame size.
    ///
    /// # Returns
    /// * `GeneratorState::Running` if the generator is still active
    /// * `GeneratorState::Complete` if the generator has finished
    ///
    /// # Note
    /// Even when Complete is returned, the buffer should still be filled with valid samples
    /// (typically zeros or the final held value) for the current frame.
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState;

    /// Check if this generator has completed
    fn is_complete(&self) -> bool;

    /// Reset the generator to its initial state
    fn reset(&mut self);
}

/// Equal-temperament frequency of a MIDI pitch, A4 (69) = 440 Hz
pub fn pitch_frequency(pitch: u8) -> f32 {
    440.0 * 2f32.powf((pitch as f32 - 69.0) / 12.0)
}
