//! WAV file utilities
//!
//! 16-bit PCM writers for rendered sessions and a reader that decodes sample
//! bank files (any bit depth, any channel count) down to mono f32.

use std::path::Path;

use crate::error::Result;

fn to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        // -1.0 maps to -32768
        (clamped * -(i16::MIN as f32)) as i16
    }
}

/// Write a mono 16-bit PCM WAV file
///
/// # Example
/// ```
/// use chromatone::wav::write_wav_mono;
///
/// let path = std::env::temp_dir().join("chromatone_silence.wav");
/// let samples = vec![0.0f32; 16000]; // 1 second of silence at 16kHz
/// write_wav_mono(&path, &samples, 16000).unwrap();
/// ```
pub fn write_wav_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(to_i16(s))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write a stereo 16-bit PCM WAV file from separate channel buffers
///
/// The shorter channel is padded with silence.
pub fn write_wav_stereo(path: &Path, left: &[f32], right: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = left.len().max(right.len());
    for i in 0..frames {
        writer.write_sample(to_i16(left.get(i).copied().unwrap_or(0.0)))?;
        writer.write_sample(to_i16(right.get(i).copied().unwrap_or(0.0)))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a WAV file and average its channels down to mono
///
/// Returns the samples and the file's sample rate.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_val))
                .collect::<std::result::Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok((mono, spec.sample_rate))
}
