//! turnstream - streaming speech-turn segmentation for live call agents
//!
//! Feeds a continuous stream of mono float samples through a step-sized
//! transcription loop and emits ordered turn lifecycle events for a
//! downstream conversational agent.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod stt;

// Core engine surface
pub use engine::{
    EngineConfig, EngineHandle, EventStream, Segmenter, StepBuffer, TurnBuffer, TurnEngine,
    TurnEvent, TurnEventKind,
};

// Speech-to-text seam
pub use stt::transcriber::{MockTranscriber, Segment, SpeechGatedTranscriber, Transcriber};
pub use stt::whisper::{WhisperConfig, WhisperTranscriber};

// Error handling
pub use error::{Result, TurnstreamError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
