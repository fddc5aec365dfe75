//! Color to sound mapping
//!
//! Red picks the raw pitch inside the pitch range, green the volume (40% to
//! 100%) and blue the stereo position (-1 left to 1 right).

use crate::image::Rgb;
use crate::pipeline::scale::PitchRange;

/// Lowest volume a pixel can produce
pub const VOLUME_FLOOR: f32 = 0.4;

/// Raw sound parameters for one pixel, before scale quantization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundParams {
    pub pitch: u8,
    pub volume: f32,
    pub pan: f32,
}

pub fn map_color(color: Rgb, range: PitchRange) -> SoundParams {
    let span = range.max as f64 - range.min as f64;
    let raw = (color.r as f64 / 255.0 * span).floor() + range.min as f64;

    SoundParams {
        pitch: raw.clamp(0.0, 127.0) as u8,
        volume: VOLUME_FLOOR + (color.g as f32 / 255.0) * (1.0 - VOLUME_FLOOR),
        pan: (color.b as f32 / 255.0) * 2.0 - 1.0,
    }
}

/// Volume as a whole percentage
pub fn volume_percent(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Display label for a pan position: "C", "L40%" or "R25%"
pub fn pan_label(pan: f32) -> String {
    let pan = pan.clamp(-1.0, 1.0);
    let percent = (pan.abs() * 100.0).round() as u8;
    if pan.abs() < 0.05 {
        "C".to_string()
    } else if pan < 0.0 {
        format!("L{}%", percent)
    } else {
        format!("R{}%", percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: PitchRange = PitchRange { min: 40, max: 100 };

    #[test]
    fn test_black() {
        let params = map_color(Rgb::new(0, 0, 0), RANGE);
        assert_eq!(params.pitch, 40);
        assert!((params.volume - 0.4).abs() < 1e-6);
        assert_eq!(params.pan, -1.0);
    }

    #[test]
    fn test_white() {
        let params = map_color(Rgb::new(255, 255, 255), RANGE);
        assert_eq!(params.pitch, 100);
        assert!((params.volume - 1.0).abs() < 1e-6);
        assert_eq!(params.pan, 1.0);
    }

    #[test]
    fn test_mid_red_is_near_midpoint() {
        let params = map_color(Rgb::new(128, 0, 0), RANGE);
        assert_eq!(params.pitch, 70);
    }

    #[test]
    fn test_pitch_stays_in_range() {
        for r in 0..=255u8 {
            let params = map_color(Rgb::new(r, 0, 0), RANGE);
            assert!(RANGE.contains(params.pitch));
        }
    }

    #[test]
    fn test_degenerate_range_stays_valid() {
        let params = map_color(Rgb::new(255, 0, 0), PitchRange { min: 10, max: 0 });
        assert_eq!(params.pitch, 0);
    }

    #[test]
    fn test_labels() {
        assert_eq!(volume_percent(0.4), 40);
        assert_eq!(volume_percent(1.0), 100);
        assert_eq!(pan_label(0.01), "C");
        assert_eq!(pan_label(-0.4), "L40%");
        assert_eq!(pan_label(1.0), "R100%");
    }
}
