use crate::error::{Result, TurnstreamError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One transcribed segment with its no-speech confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Transcribed text for this segment.
    pub text: String,
    /// Probability (0.0..1.0) that the segment contains no actual speech.
    pub no_speech_prob: f32,
}

impl Segment {
    /// Creates a segment.
    pub fn new(text: impl Into<String>, no_speech_prob: f32) -> Self {
        Self {
            text: text.into(),
            no_speech_prob,
        }
    }
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real Whisper vs mock).
/// Implementations are stateless from the engine's point of view: each call
/// transcribes exactly the samples it is handed.
pub trait Transcriber: Send + Sync {
    /// Transcribe audio samples to segments.
    ///
    /// # Arguments
    /// * `samples` - Mono f32 audio normalized to [-1.0, 1.0] at the
    ///   engine's working sample rate
    ///
    /// # Returns
    /// Transcribed segments with per-segment no-speech probability, or an
    /// error. Errors are never retried by the engine.
    fn transcribe(&self, samples: &[f32]) -> Result<Vec<Segment>>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

/// Implement Transcriber for Arc<T> to allow sharing across engine instances.
impl<T: Transcriber> Transcriber for Arc<T> {
    fn transcribe(&self, samples: &[f32]) -> Result<Vec<Segment>> {
        (**self).transcribe(samples)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock transcriber for testing.
///
/// Returns a fixed segment list by default; `with_script` queues per-call
/// responses so each step can be classified differently.
#[derive(Debug)]
pub struct MockTranscriber {
    model_name: String,
    segments: Vec<Segment>,
    script: Mutex<VecDeque<Result<Vec<Segment>>>>,
    should_fail: bool,
    calls: AtomicUsize,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            segments: vec![Segment::new("mock transcription", 0.0)],
            script: Mutex::new(VecDeque::new()),
            should_fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Configure the mock to return a single confident segment with `text`
    pub fn with_text(mut self, text: &str) -> Self {
        self.segments = vec![Segment::new(text, 0.0)];
        self
    }

    /// Configure the mock to return specific segments on every call
    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    /// Queue per-call responses, consumed front to back.
    ///
    /// Entries may be `Err` to fail one specific call. Once the script is
    /// exhausted the mock falls back to its fixed segments.
    pub fn with_script(self, script: Vec<Result<Vec<Segment>>>) -> Self {
        *self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = script.into();
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of transcribe calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _samples: &[f32]) -> Result<Vec<Segment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(TurnstreamError::InferenceFailed {
                message: "mock transcription failure".to_string(),
            });
        }
        if let Some(scripted) = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
        {
            return scripted;
        }
        Ok(self.segments.clone())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}

/// Deterministic transcriber whose output is a pure function of the audio.
///
/// Any sample with amplitude above 0.01 counts as voiced. Voiced audio
/// yields one confident segment whose text encodes the voiced-sample count;
/// quiet audio yields one segment with a high no-speech probability, the
/// shape real models produce for breath noise. Useful for driving the
/// segmentation state machine with synthetic audio.
#[derive(Debug, Clone)]
pub struct SpeechGatedTranscriber {
    model_name: String,
}

impl SpeechGatedTranscriber {
    pub fn new() -> Self {
        Self {
            model_name: "speech-gated".to_string(),
        }
    }
}

impl Default for SpeechGatedTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for SpeechGatedTranscriber {
    fn transcribe(&self, samples: &[f32]) -> Result<Vec<Segment>> {
        let voiced = samples.iter().filter(|s| s.abs() > 0.01).count();
        if voiced > 0 {
            Ok(vec![Segment::new(format!(" {} voiced", voiced), 0.05)])
        } else {
            Ok(vec![Segment::new(" [BLANK_AUDIO]", 0.95)])
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}
