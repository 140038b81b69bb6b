//! Speech-to-text backends.
//!
//! The engine only depends on the [`Transcriber`] trait; the whisper-rs
//! implementation lives behind the `whisper` feature.

pub mod transcriber;
pub mod whisper;

pub use transcriber::{MockTranscriber, Segment, SpeechGatedTranscriber, Transcriber};
pub use whisper::{WhisperConfig, WhisperTranscriber};
