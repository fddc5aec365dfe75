//! Voice registry
//!
//! Tracks the live voice of every owner, retires superseded or stopped
//! voices into a fade tail, and mixes everything into stereo frames.

use std::collections::BTreeMap;

use crate::generator::GeneratorState;
use crate::pipeline::voice::{Voice, VoiceOwner};

/// Concurrency policy for a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicePolicy {
    /// Starting any voice stops every other voice first
    Exclusive,
    /// Starting a voice only replaces its own owner's previous voice
    Polyphonic,
}

/// Owner-keyed map of live voices
pub struct VoiceRegistry {
    policy: VoicePolicy,
    active: BTreeMap<VoiceOwner, Voice>,
    /// Stopped voices still playing their fade
    tails: Vec<Voice>,
}

impl VoiceRegistry {
    pub fn new(policy: VoicePolicy) -> Self {
        Self {
            policy,
            active: BTreeMap::new(),
            tails: Vec::new(),
        }
    }

    pub fn policy(&self) -> VoicePolicy {
        self.policy
    }

    /// Register a voice under its owner
    ///
    /// Any previous voice of the same owner (or, in exclusive mode, every
    /// voice) is stopped first.
    pub fn start(&mut self, voice: Voice) {
        if self.policy == VoicePolicy::Exclusive {
            self.stop_all();
        }
        let owner = voice.owner();
        if let Some(previous) = self.active.insert(owner, voice) {
            self.retire(previous);
        }
    }

    /// Fade out and forget the voice of `owner`; no-op if there is none
    pub fn stop_one(&mut self, owner: VoiceOwner) {
        if let Some(voice) = self.active.remove(&owner) {
            self.retire(voice);
        }
    }

    /// Fade out and forget every voice
    pub fn stop_all(&mut self) {
        let voices = std::mem::take(&mut self.active);
        for (_, voice) in voices {
            self.retire(voice);
        }
    }

    fn retire(&mut self, mut voice: Voice) {
        if let Err(issue) = voice.stop() {
            log::trace!("stop {:?}: {}", voice.owner(), issue);
        }
        if !voice.is_released() {
            self.tails.push(voice);
        }
    }

    pub fn contains(&self, owner: VoiceOwner) -> bool {
        self.active.contains_key(&owner)
    }

    pub fn get(&self, owner: VoiceOwner) -> Option<&Voice> {
        self.active.get(&owner)
    }

    /// Number of live (not fading) voices
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Number of voices still fading out
    pub fn tail_count(&self) -> usize {
        self.tails.len()
    }

    /// Earliest gate end among live voices
    pub fn next_release(&self) -> Option<u64> {
        self.active.values().filter_map(|v| v.release_at()).min()
    }

    /// True while anything is audible
    pub fn has_sound(&self) -> bool {
        !self.active.is_empty() || !self.tails.is_empty()
    }

    /// Add one frame of all voices to the stereo buffers
    ///
    /// `now` is the sample position of the frame start. Voices whose gate
    /// ends by then start fading; voices whose producer ran out are dropped.
    pub fn process_frame(&mut self, now: u64, left: &mut [f32], right: &mut [f32]) {
        let expired: Vec<VoiceOwner> = self
            .active
            .values()
            .filter(|v| v.release_at().is_some_and(|at| at <= now))
            .map(|v| v.owner())
            .collect();
        for owner in expired {
            self.stop_one(owner);
        }

        let mut finished = Vec::new();
        for (owner, voice) in self.active.iter_mut() {
            if voice.render(left, right) == GeneratorState::Complete {
                finished.push(*owner);
            }
        }
        for owner in finished {
            self.active.remove(&owner);
        }

        self.tails
            .retain_mut(|voice| voice.render(left, right) == GeneratorState::Running);
    }
}

/// Soft clip a mixed stereo frame in place
pub fn soft_clip_frame(left: &mut [f32], right: &mut [f32]) {
    for sample in left.iter_mut().chain(right.iter_mut()) {
        *sample = soft_clip(*sample);
    }
}

/// Soft clipping to prevent distortion
/// Uses a gentle tanh-like curve for values above threshold
fn soft_clip(sample: f32) -> f32 {
    if sample.abs() <= 1.0 {
        sample
    } else {
        sample.signum() * (1.0 + (sample.abs() - 1.0).tanh() * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Waveform;
    use crate::pipeline::lines::LineId;
    use crate::pipeline::voice::Instrument;

    fn instrument() -> Instrument {
        Instrument::new(44100, Waveform::Sine, 128)
    }

    fn line(n: u64) -> VoiceOwner {
        VoiceOwner::Line(LineId::new(n))
    }

    fn run(registry: &mut VoiceRegistry, now: u64, frames: usize) {
        let mut left = vec![0.0f32; 64];
        let mut right = vec![0.0f32; 64];
        for i in 0..frames {
            left.fill(0.0);
            right.fill(0.0);
            registry.process_frame(now + (i * 64) as u64, &mut left, &mut right);
        }
    }

    #[test]
    fn test_stop_twice_is_idempotent() {
        let mut registry = VoiceRegistry::new(VoicePolicy::Polyphonic);
        registry.start(instrument().voice(line(1), 60, 0.5, 0.0, 0));
        assert!(registry.contains(line(1)));

        registry.stop_one(line(1));
        registry.stop_one(line(1));
        assert!(!registry.contains(line(1)));
        assert_eq!(registry.tail_count(), 1);

        // unknown owner
        registry.stop_one(line(42));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_restart_keeps_one_entry_per_owner() {
        let mut registry = VoiceRegistry::new(VoicePolicy::Polyphonic);
        let inst = instrument();
        registry.start(inst.voice(line(1), 60, 0.5, 0.0, 0));
        registry.start(inst.voice(line(1), 64, 0.5, 0.0, 10));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(line(1)).unwrap().pitch(), 64);
        // the first voice is still fading
        assert_eq!(registry.tail_count(), 1);
    }

    #[test]
    fn test_polyphonic_owners_are_independent() {
        let mut registry = VoiceRegistry::new(VoicePolicy::Polyphonic);
        let inst = instrument();
        registry.start(inst.voice(line(1), 60, 0.5, 0.0, 0));
        registry.start(inst.voice(line(2), 64, 0.5, 0.0, 0));
        registry.start(inst.voice(line(3), 67, 0.5, 0.0, 0));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.tail_count(), 0);

        registry.stop_one(line(2));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(line(1)));
        assert!(registry.contains(line(3)));
    }

    #[test]
    fn test_exclusive_stops_everything_else() {
        let mut registry = VoiceRegistry::new(VoicePolicy::Exclusive);
        let inst = instrument();
        registry.start(inst.voice(line(1), 60, 0.5, 0.0, 0));
        registry.start(inst.voice(line(2), 64, 0.5, 0.0, 0));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(line(2)));
        assert_eq!(registry.tail_count(), 1);
    }

    #[test]
    fn test_stop_all_then_tails_drain() {
        let mut registry = VoiceRegistry::new(VoicePolicy::Polyphonic);
        let inst = instrument();
        registry.start(inst.voice(line(1), 60, 0.5, 0.0, 0));
        registry.start(inst.voice(line(2), 62, 0.5, 0.0, 0));

        registry.stop_all();
        assert!(registry.is_empty());
        assert_eq!(registry.tail_count(), 2);
        assert!(registry.has_sound());

        // 128-sample fade
        run(&mut registry, 0, 2);
        assert_eq!(registry.tail_count(), 0);
        assert!(!registry.has_sound());
    }

    #[test]
    fn test_gate_releases_voice() {
        let mut registry = VoiceRegistry::new(VoicePolicy::Exclusive);
        let voice = instrument()
            .voice(VoiceOwner::FreePlay, 60, 0.5, 0.0, 0)
            .with_release_at(128);
        registry.start(voice);

        run(&mut registry, 0, 2);
        assert!(registry.contains(VoiceOwner::FreePlay));

        run(&mut registry, 128, 1);
        assert!(!registry.contains(VoiceOwner::FreePlay));
        assert_eq!(registry.tail_count(), 1);
    }

    #[test]
    fn test_soft_clip() {
        assert_eq!(soft_clip(0.5), 0.5);
        assert!(soft_clip(3.0) < 1.5);
        assert!(soft_clip(-3.0) > -1.5);
    }
}
