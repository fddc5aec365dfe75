//! Scale catalog and pitch quantization
//!
//! Scales are fixed sets of pitch-class offsets from C. Quantizing snaps a
//! raw pitch to the nearest scale member inside the active pitch range.

/// Closed MIDI pitch range `[min, max]`, both within 0..=127
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchRange {
    pub min: u8,
    pub max: u8,
}

impl PitchRange {
    /// Values above 127 are clamped. `min > max` is kept as given and yields
    /// an empty scale enumeration.
    pub fn new(min: u8, max: u8) -> Self {
        Self {
            min: min.min(127),
            max: max.min(127),
        }
    }

    pub fn contains(&self, pitch: u8) -> bool {
        (self.min..=self.max).contains(&pitch)
    }

    /// `max - min`, zero for a degenerate range
    pub fn span(&self) -> u8 {
        self.max.saturating_sub(self.min)
    }
}

impl Default for PitchRange {
    fn default() -> Self {
        Self { min: 40, max: 100 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    Chromatic,
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    WholeTone,
}

impl Scale {
    pub const ALL: [Scale; 12] = [
        Scale::Chromatic,
        Scale::Major,
        Scale::Minor,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Locrian,
        Scale::PentatonicMajor,
        Scale::PentatonicMinor,
        Scale::Blues,
        Scale::WholeTone,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scale::Chromatic => "chromatic",
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
            Scale::Locrian => "locrian",
            Scale::PentatonicMajor => "pentatonic-major",
            Scale::PentatonicMinor => "pentatonic-minor",
            Scale::Blues => "blues",
            Scale::WholeTone => "whole-tone",
        }
    }

    /// Look up a scale by name; unknown names fall back to major
    pub fn from_name(name: &str) -> Self {
        let wanted = name.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match Scale::ALL.iter().find(|s| s.name() == wanted) {
            Some(&scale) => scale,
            None => {
                log::debug!("unknown scale {:?}, using major", name);
                Scale::Major
            }
        }
    }

    /// Semitone offsets from the root
    pub fn offsets(self) -> &'static [u8] {
        match self {
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Scale::PentatonicMajor => &[0, 2, 4, 7, 9],
            Scale::PentatonicMinor => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::WholeTone => &[0, 2, 4, 6, 8, 10],
        }
    }
}

/// Every pitch in `range` whose pitch class belongs to `scale`, ascending
pub fn scale_notes(scale: Scale, range: PitchRange) -> Vec<u8> {
    if range.min > range.max {
        return Vec::new();
    }

    let mut notes = Vec::new();
    for octave in (range.min / 12)..=(range.max / 12) {
        for &offset in scale.offsets() {
            let pitch = octave as u16 * 12 + offset as u16;
            if pitch >= range.min as u16 && pitch <= range.max as u16 {
                notes.push(pitch as u8);
            }
        }
    }
    notes.sort_unstable();
    notes.dedup();
    notes
}

/// Snap `raw` to the nearest note of `scale` within `range`
///
/// Ties resolve to the lower pitch. An empty enumeration returns `raw`
/// unchanged.
pub fn quantize(raw: u8, scale: Scale, range: PitchRange) -> u8 {
    nearest(raw, &scale_notes(scale, range))
}

fn nearest(raw: u8, notes: &[u8]) -> u8 {
    let mut best: Option<(u8, u8)> = None;
    for &note in notes {
        let dist = note.abs_diff(raw);
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((note, dist));
        }
    }
    best.map_or(raw, |(note, _)| note)
}

/// Flat-spelled note name with octave, 60 -> "C4"
pub fn note_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
    ];
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}
