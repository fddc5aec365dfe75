//! Error types
//!
//! [`Error`] covers everything that can fail at the edges of the crate:
//! reading configuration, decoding samples, writing WAV output and parsing
//! gesture scripts. Conditions inside the playback core never surface here;
//! they are described by [`PlaybackIssue`], logged, and absorbed.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::parser::ParseError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Configuration text could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The sample bank directory is missing or unreadable.
    #[error("Malformed sample bank at {path}: {reason}")]
    MalformedSampleBank { path: PathBuf, reason: String },

    /// RGBA data length does not match `width * height * 4`.
    #[error("Invalid pixel buffer: expected {expected} bytes for {width}x{height}, got {actual}")]
    InvalidPixelBuffer {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Script error: {0}")]
    Script(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable conditions inside the playback core.
///
/// None of these abort a line or the free-play session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackIssue {
    /// No pixel buffer has been loaded yet.
    InputUnavailable,
    /// Grid coordinate outside the pixel buffer.
    OutOfBounds { x: i32, y: i32 },
    /// No sample for the resolved note; a tone is used instead.
    SampleMissing { pitch: u8 },
    /// Stop requested for a voice that is already fading or released.
    ProducerAlreadyReleased,
}

impl std::fmt::Display for PlaybackIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackIssue::InputUnavailable => write!(f, "no pixel buffer loaded"),
            PlaybackIssue::OutOfBounds { x, y } => write!(f, "cell ({}, {}) outside grid", x, y),
            PlaybackIssue::SampleMissing { pitch } => {
                write!(f, "no sample for pitch {}, using tone", pitch)
            }
            PlaybackIssue::ProducerAlreadyReleased => write!(f, "producer already released"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::InvalidPixelBuffer {
            width: 2,
            height: 2,
            expected: 16,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "Invalid pixel buffer: expected 16 bytes for 2x2, got 12"
        );

        let issue = PlaybackIssue::OutOfBounds { x: -1, y: 4 };
        assert_eq!(issue.to_string(), "cell (-1, 4) outside grid");
    }
}
