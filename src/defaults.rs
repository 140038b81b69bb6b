//! Default configuration constants for turnstream.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default step duration in seconds.
///
/// Each step worth of audio triggers one inference call. One second keeps
/// turn events responsive without swamping the model with tiny windows.
pub const STEP_SECONDS: u32 = 1;

/// Default maximum turn duration in seconds.
///
/// A speaker holding the floor longer than this gets their turn force-split
/// into two consecutive turns, since the turn buffer is fixed-capacity.
pub const MAX_TURN_SECONDS: u32 = 30;

/// Default no-speech probability threshold.
///
/// Segments whose no-speech probability is at or above this value are
/// discarded during classification. A step is classified as speech iff the
/// text that survives this filter is non-empty.
pub const NO_SPEECH_THRESHOLD: f32 = 0.5;

/// Default Whisper model name.
///
/// "tiny.en" trades accuracy for the low per-step latency that live call
/// segmentation needs.
pub const DEFAULT_MODEL: &str = "tiny.en";

/// Default language code for transcription.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Default capacity of the frame channel feeding an engine's worker thread.
///
/// Sized for several seconds of 10ms transport frames so a slow inference
/// step does not immediately push back on the frame source.
pub const FRAME_CHANNEL_CAPACITY: usize = 1024;
