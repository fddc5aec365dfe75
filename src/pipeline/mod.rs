//! Playback pipeline
//!
//! Turns pointer gestures over a pixel grid into scheduled notes:
//! - Scale / Mapper: color to pitch, volume and pan, snapped to a scale
//! - Tempo / Timer: duration policy, onset grid and the sample-accurate timer queue
//! - Voice / VoiceRegistry / Lines: sound sources, ownership and line playback
//! - Session: the orchestrator fed by pointer events
//! - Parser / Scheduler: gesture scripts replayed offline into audio

pub mod lines;
pub mod mapper;
pub mod parser;
pub mod scale;
pub mod scheduler;
pub mod session;
pub mod tempo;
pub mod timer;
pub mod voice;
pub mod voicemgr;

pub use lines::{rasterize_line, LineId};
pub use mapper::{map_color, SoundParams};
pub use parser::{parse_script, ParseError, ScriptEvent, TimedEvents};
pub use scale::{note_name, quantize, PitchRange, Scale};
pub use scheduler::{Performance, PerformanceConfig, Rendered};
pub use session::{NoteFacts, PlaybackEvent, PlaybackMode, Session};
pub use tempo::{DurationPolicy, NoteDuration, TempoGrid};
pub use voice::{Instrument, Voice, VoiceOwner};
pub use voicemgr::{VoicePolicy, VoiceRegistry};
