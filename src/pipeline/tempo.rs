//! Tempo grid
//!
//! [`TempoGrid`] turns the tempo and note-duration policy into note lengths
//! in samples. [`OnsetGrid`] aligns free-play onsets to a shared beat clock:
//! an onset either fires at once or waits for the next grid boundary.
//!
//! The anchor only ever moves by whole grid periods, so onsets stay on the
//! lattice `first_onset + k * period` no matter how input arrives.

/// Note lengths relative to a quarter-note beat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteDuration {
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteDuration {
    pub const ALL: [NoteDuration; 3] = [
        NoteDuration::Quarter,
        NoteDuration::Eighth,
        NoteDuration::Sixteenth,
    ];

    pub fn beats(self) -> f64 {
        match self {
            NoteDuration::Quarter => 1.0,
            NoteDuration::Eighth => 0.5,
            NoteDuration::Sixteenth => 0.25,
        }
    }
}

/// How the next note's duration is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationPolicy {
    Fixed(NoteDuration),
    /// Uniform draw among quarter, eighth and sixteenth on every request
    Random,
}

impl DurationPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "quarter" | "4n" => Some(DurationPolicy::Fixed(NoteDuration::Quarter)),
            "eighth" | "8n" => Some(DurationPolicy::Fixed(NoteDuration::Eighth)),
            "sixteenth" | "16n" => Some(DurationPolicy::Fixed(NoteDuration::Sixteenth)),
            "random" => Some(DurationPolicy::Random),
            _ => None,
        }
    }
}

impl Default for DurationPolicy {
    fn default() -> Self {
        DurationPolicy::Fixed(NoteDuration::Eighth)
    }
}

/// Tempo and duration policy
pub struct TempoGrid {
    bpm: f64,
    policy: DurationPolicy,
    sample_rate: u32,
    rng: fastrand::Rng,
}

impl TempoGrid {
    /// # Arguments
    /// * `bpm` - Quarter notes per minute
    /// * `policy` - Duration policy for [`TempoGrid::next_note_duration`]
    /// * `sample_rate` - Output sample rate in Hz
    /// * `seed` - Seed for the random policy; `None` seeds from entropy
    pub fn new(bpm: f64, policy: DurationPolicy, sample_rate: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            bpm: bpm.max(1.0),
            policy,
            sample_rate,
            rng,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm.max(1.0);
    }

    pub fn policy(&self) -> DurationPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: DurationPolicy) {
        self.policy = policy;
    }

    /// Length of `duration` in samples at the current tempo, at least 1
    pub fn duration_samples(&self, duration: NoteDuration) -> u64 {
        let seconds = 60.0 / self.bpm * duration.beats();
        ((seconds * self.sample_rate as f64).round() as u64).max(1)
    }

    /// Duration of the next note in samples
    ///
    /// Deterministic for a fixed policy; a fresh draw under the random policy.
    pub fn next_note_duration(&mut self) -> u64 {
        let duration = match self.policy {
            DurationPolicy::Fixed(duration) => duration,
            DurationPolicy::Random => NoteDuration::ALL[self.rng.usize(..NoteDuration::ALL.len())],
        };
        self.duration_samples(duration)
    }
}

/// Outcome of submitting an onset to the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Onset {
    /// Fire immediately; the anchor has already been moved
    Now,
    /// Wait for the boundary at this sample position, then call
    /// [`OnsetGrid::commit`]
    At(u64),
}

/// Beat clock for free-play onsets
#[derive(Debug, Clone)]
pub struct OnsetGrid {
    anchor: Option<u64>,
    /// Elapsed time this close to a boundary counts as on the boundary
    epsilon: u64,
}

impl OnsetGrid {
    pub fn new(epsilon: u64) -> Self {
        Self {
            anchor: None,
            epsilon,
        }
    }

    /// Sample position of the last grid boundary that fired
    pub fn anchor(&self) -> Option<u64> {
        self.anchor
    }

    /// Decide when an onset submitted at `now` should fire
    ///
    /// Without an anchor the onset fires now and establishes one. When a
    /// boundary has been reached (or is within epsilon), the onset fires now
    /// and the anchor advances to that boundary. Otherwise the onset waits
    /// for `anchor + period`.
    pub fn schedule(&mut self, now: u64, period: u64) -> Onset {
        let period = period.max(1);
        let Some(anchor) = self.anchor else {
            self.anchor = Some(now);
            return Onset::Now;
        };

        let elapsed = now.saturating_sub(anchor);
        if elapsed + self.epsilon >= period {
            let periods = (elapsed + self.epsilon) / period;
            self.anchor = Some(anchor + periods * period);
            Onset::Now
        } else {
            Onset::At(anchor + period)
        }
    }

    /// Record that a waiting onset fired at its boundary
    pub fn commit(&mut self, boundary: u64) {
        self.anchor = Some(boundary);
    }

    pub fn reset(&mut self) {
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_at_120_bpm() {
        let grid = TempoGrid::new(120.0, DurationPolicy::default(), 44100, Some(1));
        assert_eq!(grid.duration_samples(NoteDuration::Quarter), 22050);
        assert_eq!(grid.duration_samples(NoteDuration::Eighth), 11025);
        assert_eq!(grid.duration_samples(NoteDuration::Sixteenth), 5513);
    }

    #[test]
    fn test_fixed_policy_is_deterministic() {
        let mut grid = TempoGrid::new(
            100.0,
            DurationPolicy::Fixed(NoteDuration::Quarter),
            48000,
            None,
        );
        let first = grid.next_note_duration();
        assert_eq!(first, 28800);
        for _ in 0..10 {
            assert_eq!(grid.next_note_duration(), first);
        }
    }

    #[test]
    fn test_random_policy_draws_all_durations() {
        let mut grid = TempoGrid::new(120.0, DurationPolicy::Random, 44100, Some(7));
        let allowed = [22050, 11025, 5513];
        let mut seen = [false; 3];
        for _ in 0..200 {
            let d = grid.next_note_duration();
            let i = allowed.iter().position(|&a| a == d).expect("unexpected duration");
            seen[i] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(
            DurationPolicy::from_name("Sixteenth"),
            Some(DurationPolicy::Fixed(NoteDuration::Sixteenth))
        );
        assert_eq!(DurationPolicy::from_name("random"), Some(DurationPolicy::Random));
        assert_eq!(DurationPolicy::from_name("whole"), None);
    }

    #[test]
    fn test_first_onset_fires_now() {
        let mut onsets = OnsetGrid::new(10);
        assert_eq!(onsets.schedule(500, 1000), Onset::Now);
        assert_eq!(onsets.anchor(), Some(500));
    }

    #[test]
    fn test_onset_waits_for_boundary() {
        let mut onsets = OnsetGrid::new(10);
        onsets.schedule(0, 1000);
        assert_eq!(onsets.schedule(300, 1000), Onset::At(1000));
        // later input before the boundary targets the same boundary
        assert_eq!(onsets.schedule(700, 1000), Onset::At(1000));
        assert_eq!(onsets.anchor(), Some(0));

        onsets.commit(1000);
        assert_eq!(onsets.schedule(1200, 1000), Onset::At(2000));
    }

    #[test]
    fn test_near_boundary_fires_now() {
        let mut onsets = OnsetGrid::new(10);
        onsets.schedule(0, 1000);
        assert_eq!(onsets.schedule(995, 1000), Onset::Now);
        assert_eq!(onsets.anchor(), Some(1000));

        // just outside the tolerance still waits
        assert_eq!(onsets.schedule(1989, 1000), Onset::At(2000));
    }

    #[test]
    fn test_late_onset_resyncs_to_lattice() {
        let mut onsets = OnsetGrid::new(10);
        onsets.schedule(0, 1000);
        assert_eq!(onsets.schedule(3700, 1000), Onset::Now);
        assert_eq!(onsets.anchor(), Some(3000));
        assert_eq!(onsets.schedule(3800, 1000), Onset::At(4000));
    }

    #[test]
    fn test_no_drift_over_many_steps() {
        // Continuous input every quarter period; a pending onset fires at its
        // boundary before the next input is handled.
        let period = 5513u64;
        let mut onsets = OnsetGrid::new(44);
        let mut pending: Option<u64> = None;
        let mut fired = Vec::new();

        let mut now = 1234u64;
        while fired.len() < 101 {
            if let Some(at) = pending {
                if at <= now {
                    onsets.commit(at);
                    fired.push(at);
                    pending = None;
                }
            }
            match onsets.schedule(now, period) {
                Onset::Now => {
                    fired.push(now);
                    pending = None;
                }
                Onset::At(at) => pending = Some(at),
            }
            now += period / 4;
        }

        let first = fired[0];
        for (k, &t) in fired.iter().enumerate() {
            let expected = first + k as u64 * period;
            assert!(
                t.abs_diff(expected) <= 44,
                "onset {} at {} expected {}",
                k,
                t,
                expected
            );
        }
        assert_eq!(onsets.anchor(), Some(first + 100 * period));
    }
}
