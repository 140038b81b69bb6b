//! Streaming speech-turn segmentation engine.
//!
//! Turns a continuous feed of mono float samples into ordered turn
//! lifecycle events:
//! ```text
//! ┌───────────┐    ┌────────────┐    ┌───────────┐    ┌────────────┐    ┌──────────┐
//! │ Transport │───▶│   Step     │───▶│Transcriber│───▶│ Segmenter  │───▶│  Event   │───▶ Consumer
//! │  frames   │    │  Buffer    │    │ (blocking)│    │ (Silent /  │    │  Stream  │
//! └───────────┘    └────────────┘    └───────────┘    │  Speaking) │    └──────────┘
//!                    one inference                    └────────────┘
//!                    per full step                      Turn Buffer
//! ```
//!
//! The whole loop runs on one dedicated worker thread per engine instance
//! because step transcription blocks; consumers read events over an async
//! channel and never touch the buffers.

pub mod engine;
pub mod event;
pub mod segmenter;
pub mod step;
pub mod turn;

pub use engine::{EngineHandle, EventStream, TurnEngine};
pub use event::{TurnEvent, TurnEventKind};
pub use segmenter::Segmenter;
pub use step::StepBuffer;
pub use turn::TurnBuffer;

use crate::defaults;
use crate::error::{Result, TurnstreamError};

/// Configuration for a segmentation engine instance.
///
/// Fixed at construction; buffers are sized from these values once and
/// reused for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Working sample rate in Hz. Frames must already be mono at this rate.
    pub sample_rate: u32,
    /// Step duration in seconds; one inference call per full step.
    pub step_seconds: u32,
    /// Maximum turn duration in seconds before a forced split.
    pub max_turn_seconds: u32,
    /// Segments with no-speech probability at or above this are discarded.
    pub no_speech_threshold: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            step_seconds: defaults::STEP_SECONDS,
            max_turn_seconds: defaults::MAX_TURN_SECONDS,
            no_speech_threshold: defaults::NO_SPEECH_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Number of samples in one step.
    pub fn step_samples(&self) -> usize {
        (self.sample_rate * self.step_seconds) as usize
    }

    /// Number of samples the turn buffer holds.
    pub fn turn_samples(&self) -> usize {
        (self.sample_rate * self.max_turn_seconds) as usize
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `TurnstreamError::ConfigInvalidValue` naming the offending
    /// field when a duration or rate is zero, the turn is not longer than
    /// the step, or the threshold is outside (0, 1].
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(TurnstreamError::ConfigInvalidValue {
                key: "sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.step_seconds == 0 {
            return Err(TurnstreamError::ConfigInvalidValue {
                key: "step_seconds".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.max_turn_seconds <= self.step_seconds {
            return Err(TurnstreamError::ConfigInvalidValue {
                key: "max_turn_seconds".to_string(),
                message: "must be longer than step_seconds".to_string(),
            });
        }
        if !(self.no_speech_threshold > 0.0 && self.no_speech_threshold <= 1.0) {
            return Err(TurnstreamError::ConfigInvalidValue {
                key: "no_speech_threshold".to_string(),
                message: "must be in (0, 1]".to_string(),
            });
        }
        Ok(())
    }
}
