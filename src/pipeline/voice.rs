//! Voices and the sound source selection policy
//!
//! A [`Voice`] is one sounding note: a producer (sample or tone) behind a
//! volume stage and a linear pan stage. Stopping a voice ramps its gain to
//! zero over a short fade, after which the producer is dropped.

use std::sync::Arc;

use crate::error::PlaybackIssue;
use crate::generator::{
    GainRamp, GeneratorState, SampleBank, SamplePlayer, SignalGenerator, ToneGenerator, Waveform,
};
use crate::pipeline::lines::LineId;
use crate::pipeline::scale::note_name;

/// Who a voice belongs to; each owner has at most one live voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VoiceOwner {
    /// The single free-play slot
    FreePlay,
    Line(LineId),
}

/// The two kinds of sound production
pub enum Producer {
    Sample(SamplePlayer),
    Tone(ToneGenerator),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerKind {
    Sample,
    Tone,
}

impl Producer {
    pub fn kind(&self) -> ProducerKind {
        match self {
            Producer::Sample(_) => ProducerKind::Sample,
            Producer::Tone(_) => ProducerKind::Tone,
        }
    }
}

impl SignalGenerator for Producer {
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState {
        match self {
            Producer::Sample(player) => player.process(buffer),
            Producer::Tone(tone) => tone.process(buffer),
        }
    }

    fn is_complete(&self) -> bool {
        match self {
            Producer::Sample(player) => player.is_complete(),
            Producer::Tone(tone) => tone.is_complete(),
        }
    }

    fn reset(&mut self) {
        match self {
            Producer::Sample(player) => player.reset(),
            Producer::Tone(tone) => tone.reset(),
        }
    }
}

/// Left and right gains for a pan position in [-1, 1]
///
/// Linear balance: the centre plays both channels at full level and each
/// side attenuates the opposite channel down to silence.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

pub struct Voice {
    owner: VoiceOwner,
    pitch: u8,
    kind: ProducerKind,
    /// Dropped once the fade completes or the producer runs out
    producer: Option<Producer>,
    volume: f32,
    pan: f32,
    created_at: u64,
    /// Gate end; the owning registry stops the voice once reached
    release_at: Option<u64>,
    fade: Option<GainRamp>,
    fade_samples: usize,
}

impl Voice {
    pub fn new(
        owner: VoiceOwner,
        pitch: u8,
        volume: f32,
        pan: f32,
        producer: Producer,
        created_at: u64,
        fade_samples: usize,
    ) -> Self {
        Self {
            owner,
            pitch: pitch.min(127),
            kind: producer.kind(),
            producer: Some(producer),
            volume: volume.clamp(0.0, 1.0),
            pan: pan.clamp(-1.0, 1.0),
            created_at,
            release_at: None,
            fade: None,
            fade_samples,
        }
    }

    pub fn owner(&self) -> VoiceOwner {
        self.owner
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn kind(&self) -> ProducerKind {
        self.kind
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn release_at(&self) -> Option<u64> {
        self.release_at
    }

    pub fn with_release_at(mut self, at: u64) -> Self {
        self.release_at = Some(at);
        self
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some() && self.producer.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.producer.is_none()
    }

    /// Begin the fade-out
    ///
    /// A voice that is already fading or released reports
    /// [`PlaybackIssue::ProducerAlreadyReleased`] and is left untouched.
    pub fn stop(&mut self) -> std::result::Result<(), PlaybackIssue> {
        if self.producer.is_none() || self.fade.is_some() {
            return Err(PlaybackIssue::ProducerAlreadyReleased);
        }
        self.fade = Some(GainRamp::fade_out(1.0, self.fade_samples));
        Ok(())
    }

    /// Mix this voice into the stereo buffers
    ///
    /// Returns `Complete` once the voice is silent for good.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> GeneratorState {
        let Some(producer) = self.producer.as_mut() else {
            return GeneratorState::Complete;
        };

        let len = left.len().min(right.len());
        let mut mono = vec![0.0f32; len];
        let mut state = producer.process(&mut mono);

        if let Some(fade) = self.fade.as_mut() {
            let mut gain = vec![0.0f32; len];
            if fade.process(&mut gain) == GeneratorState::Complete {
                state = GeneratorState::Complete;
            }
            for (sample, g) in mono.iter_mut().zip(&gain) {
                *sample *= g;
            }
        }

        let (left_gain, right_gain) = pan_gains(self.pan);
        for (i, &sample) in mono.iter().enumerate() {
            let sample = sample * self.volume;
            left[i] += sample * left_gain;
            right[i] += sample * right_gain;
        }

        if state == GeneratorState::Complete {
            self.producer = None;
        }
        state
    }
}

/// Chooses and builds producers
///
/// Prefers a sample for the pitch's note name and falls back to a
/// synthesized tone when the bank has none.
pub struct Instrument {
    bank: Arc<SampleBank>,
    waveform: Waveform,
    sample_rate: u32,
    fade_samples: usize,
}

impl Instrument {
    pub fn new(sample_rate: u32, waveform: Waveform, fade_samples: usize) -> Self {
        Self {
            bank: Arc::new(SampleBank::new()),
            waveform,
            sample_rate,
            fade_samples,
        }
    }

    /// Replace the sample bank; an empty bank means tones only
    pub fn set_bank(&mut self, bank: SampleBank) {
        if bank.is_empty() {
            log::info!("no samples loaded, using synthesized tones");
        }
        self.bank = Arc::new(bank);
    }

    pub fn bank(&self) -> &SampleBank {
        &self.bank
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn fade_samples(&self) -> usize {
        self.fade_samples
    }

    pub fn producer_for(&self, pitch: u8) -> Producer {
        let pitch = pitch.min(127);
        if let Some(buffer) = self.bank.get(&note_name(pitch)) {
            return Producer::Sample(SamplePlayer::new(buffer.clone(), self.sample_rate));
        }
        if !self.bank.is_empty() {
            log::debug!("{}", PlaybackIssue::SampleMissing { pitch });
        }
        Producer::Tone(ToneGenerator::new(pitch, self.waveform, self.sample_rate))
    }

    /// Build a voice for `owner`; registering it is up to the caller
    pub fn voice(&self, owner: VoiceOwner, pitch: u8, volume: f32, pan: f32, now: u64) -> Voice {
        Voice::new(
            owner,
            pitch,
            volume,
            pan,
            self.producer_for(pitch),
            now,
            self.fade_samples,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SampleBuffer;

    fn tone_voice(pan: f32) -> Voice {
        let instrument = Instrument::new(44100, Waveform::Sine, 64);
        instrument.voice(VoiceOwner::FreePlay, 69, 1.0, pan, 0)
    }

    #[test]
    fn test_pan_gains() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
        assert_eq!(pan_gains(-1.0), (1.0, 0.0));
        assert_eq!(pan_gains(1.0), (0.0, 1.0));
        assert_eq!(pan_gains(0.5), (0.5, 1.0));
        assert_eq!(pan_gains(3.0), (0.0, 1.0));
    }

    #[test]
    fn test_hard_left_is_silent_on_right() {
        let mut voice = tone_voice(-1.0);
        let mut left = vec![0.0f32; 256];
        let mut right = vec![0.0f32; 256];
        voice.render(&mut left, &mut right);

        assert!(left.iter().any(|&s| s.abs() > 0.1));
        assert!(right.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stop_fades_to_silence() {
        let mut voice = tone_voice(0.0);
        let mut left = vec![0.0f32; 32];
        let mut right = vec![0.0f32; 32];
        voice.render(&mut left, &mut right);

        assert!(voice.stop().is_ok());
        assert!(voice.is_fading());

        let mut state = GeneratorState::Running;
        let mut frames = 0;
        let mut peak_last_frame = 0.0f32;
        while state == GeneratorState::Running {
            left.fill(0.0);
            right.fill(0.0);
            state = voice.render(&mut left, &mut right);
            peak_last_frame = left.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            frames += 1;
            assert!(frames < 10);
        }

        // 64-sample fade over 32-sample frames
        assert_eq!(frames, 2);
        assert!(peak_last_frame < 0.5);
        assert!(voice.is_released());
    }

    #[test]
    fn test_stop_twice_is_reported_not_fatal() {
        let mut voice = tone_voice(0.0);
        assert!(voice.stop().is_ok());
        assert_eq!(voice.stop(), Err(PlaybackIssue::ProducerAlreadyReleased));

        let mut left = vec![0.0f32; 128];
        let mut right = vec![0.0f32; 128];
        voice.render(&mut left, &mut right);
        assert!(voice.is_released());
        assert_eq!(voice.stop(), Err(PlaybackIssue::ProducerAlreadyReleased));
        assert_eq!(voice.render(&mut left, &mut right), GeneratorState::Complete);
    }

    #[test]
    fn test_sample_preferred_over_tone() {
        let mut bank = SampleBank::new();
        bank.insert("C4", SampleBuffer::new(vec![0.5; 100], 44100));
        let mut instrument = Instrument::new(44100, Waveform::Sine, 64);
        instrument.set_bank(bank);

        assert_eq!(instrument.producer_for(60).kind(), ProducerKind::Sample);
        assert_eq!(instrument.producer_for(61).kind(), ProducerKind::Tone);
    }

    #[test]
    fn test_empty_bank_uses_tones() {
        let instrument = Instrument::new(44100, Waveform::Triangle, 64);
        let voice = instrument.voice(VoiceOwner::FreePlay, 60, 0.7, 0.0, 10);
        assert_eq!(voice.kind(), ProducerKind::Tone);
        assert_eq!(voice.created_at(), 10);
    }

    #[test]
    fn test_sample_voice_completes_on_its_own() {
        let mut bank = SampleBank::new();
        bank.insert("A4", SampleBuffer::new(vec![0.5; 40], 44100));
        let mut instrument = Instrument::new(44100, Waveform::Sine, 64);
        instrument.set_bank(bank);

        let mut voice = instrument.voice(VoiceOwner::FreePlay, 69, 1.0, 0.0, 0);
        let mut left = vec![0.0f32; 64];
        let mut right = vec![0.0f32; 64];
        assert_eq!(voice.render(&mut left, &mut right), GeneratorState::Complete);
        assert!(voice.is_released());
        assert_eq!(left[0], 0.5);
    }

    #[test]
    fn test_inputs_are_clamped() {
        let instrument = Instrument::new(44100, Waveform::Sine, 64);
        let voice = instrument.voice(VoiceOwner::FreePlay, 200, 3.0, -4.0, 0);
        assert_eq!(voice.pitch(), 127);
        assert_eq!(voice.volume(), 1.0);
        assert_eq!(voice.pan(), -1.0);
    }
}
