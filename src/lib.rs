//! Chromatone: play an image as music
//!
//! Pixels become notes: red picks the pitch, green the volume and blue the
//! stereo position. A [`pipeline::Session`] turns pointer gestures over the
//! pixel grid into scheduled, scale-quantized voices and renders them into
//! stereo audio frames.

pub mod config;
pub mod error;
pub mod generator;
pub mod image;
pub mod pipeline;
pub mod wav;

pub use error::{Error, Result};
