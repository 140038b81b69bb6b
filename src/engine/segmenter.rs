//! Segmentation state machine: classifies steps and drives turn lifecycle.

use crate::engine::EngineConfig;
use crate::engine::event::{TurnEvent, TurnEventKind};
use crate::engine::turn::TurnBuffer;
use crate::error::Result;
use crate::stt::transcriber::Transcriber;
use tracing::debug;

/// Whether the speaker currently holds the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpeakState {
    Silent,
    Speaking,
}

/// Classifies each completed step as speech or silence and emits turn
/// lifecycle events.
///
/// Speech detection is purely transcript-based: a step is speech iff the
/// text surviving the no-speech-probability filter is non-empty. There is
/// no energy-based VAD. While speaking, every step re-transcribes the whole
/// turn buffer, so the running transcript depends only on the audio
/// accumulated since the turn began.
///
/// A turn outliving the buffer is force-split into two consecutive turns.
/// This can fragment a long monologue's transcript at an arbitrary
/// boundary; changing the policy (e.g. to a sliding window) needs product
/// sign-off, so keep it as is.
pub struct Segmenter<T: Transcriber> {
    config: EngineConfig,
    transcriber: T,
    turn_buffer: TurnBuffer,
    state: SpeakState,
    /// Incremented on every turn start and every silence-run start.
    turn_id: u64,
    /// Samples of consecutive silent steps since speech last stopped.
    silence_samples: u64,
    /// Set once the current silence run has announced itself.
    silence_run_started: bool,
    /// Latest full-turn transcript; superseded each speaking step.
    last_text: String,
}

impl<T: Transcriber> Segmenter<T> {
    /// Creates a segmenter in the silent state with an empty turn buffer.
    pub fn new(config: EngineConfig, transcriber: T) -> Self {
        let turn_buffer = TurnBuffer::new(config.turn_samples());
        Self {
            config,
            transcriber,
            turn_buffer,
            state: SpeakState::Silent,
            turn_id: 0,
            silence_samples: 0,
            silence_run_started: false,
            last_text: String::new(),
        }
    }

    /// Processes one completed step and returns the events it produced.
    ///
    /// At most two events come back: the forced split and the speech-to-
    /// silence transition each finish one span and start the next.
    ///
    /// # Errors
    /// Propagates transcriber failures untouched; no retry. A failed step
    /// leaves the segmenter exactly as it was, so the caller may retry the
    /// step, skip it, or drop the instance.
    pub fn process_step(&mut self, step: &[f32]) -> Result<Vec<TurnEvent>> {
        let step_text = self.classify(step)?;
        if step_text.is_empty() {
            Ok(self.on_silent_step(step.len()))
        } else {
            self.on_speech_step(step)
        }
    }

    /// Transcribes samples and concatenates the text of every segment below
    /// the no-speech threshold. Empty result means silence.
    fn classify(&self, samples: &[f32]) -> Result<String> {
        let segments = self.transcriber.transcribe(samples)?;
        let threshold = self.config.no_speech_threshold;
        Ok(segments
            .into_iter()
            .filter(|segment| segment.no_speech_prob < threshold)
            .map(|segment| segment.text)
            .collect())
    }

    fn on_speech_step(&mut self, step: &[f32]) -> Result<Vec<TurnEvent>> {
        let mut events = Vec::with_capacity(2);
        let split = self.state == SpeakState::Speaking && !self.turn_buffer.has_room(step.len());

        // Re-transcribe before committing anything: a failure here must
        // leave the id, counters, buffer and state exactly as they were.
        let new_text = if self.state == SpeakState::Speaking && !split {
            let committed = self.turn_buffer.len();
            self.turn_buffer.append(step);
            match self.classify(self.turn_buffer.samples()) {
                Ok(text) => text,
                Err(e) => {
                    self.turn_buffer.truncate(committed);
                    return Err(e);
                }
            }
        } else {
            // Fresh turn, from silence or a forced split: only this step.
            self.classify(step)?
        };

        if split {
            // Forced split: the buffer is out of room, so finish the turn
            // with its contents as-is and start a fresh one for this step.
            debug!(turn_id = self.turn_id, "turn buffer full, splitting turn");
            events.push(self.finish_turn());
        }

        match self.state {
            SpeakState::Silent => {
                self.turn_id += 1;
                self.silence_samples = 0;
                self.silence_run_started = false;
                self.turn_buffer.append(step);
                self.last_text = new_text;
                debug!(turn_id = self.turn_id, "turn started");
                events.push(self.turn_event(TurnEventKind::TurnStarted));
                self.state = SpeakState::Speaking;
            }
            SpeakState::Speaking => {
                self.last_text = new_text;
                events.push(self.turn_event(TurnEventKind::TurnUpdated));
            }
        }

        Ok(events)
    }

    fn on_silent_step(&mut self, step_len: usize) -> Vec<TurnEvent> {
        let mut events = Vec::with_capacity(2);

        if self.state == SpeakState::Speaking {
            debug!(turn_id = self.turn_id, "silence after turn");
            events.push(self.finish_turn());
        }

        if !self.silence_run_started {
            self.turn_id += 1;
            self.silence_samples = 0;
            self.silence_run_started = true;
            events.push(self.silence_event(TurnEventKind::SilenceStarted));
        } else {
            self.silence_samples += step_len as u64;
            events.push(self.silence_event(TurnEventKind::SilenceUpdated));
        }

        events
    }

    /// Emits `TurnFinished` with the last computed transcript and resets the
    /// turn buffer. Does not start the next span; callers do.
    fn finish_turn(&mut self) -> TurnEvent {
        let event = self.turn_event(TurnEventKind::TurnFinished);
        self.last_text.clear();
        self.turn_buffer.clear();
        self.state = SpeakState::Silent;
        event
    }

    fn turn_event(&self, kind: TurnEventKind) -> TurnEvent {
        TurnEvent {
            turn_id: self.turn_id,
            kind,
            text: self.last_text.clone(),
            elapsed_seconds: self.turn_buffer.elapsed_seconds(self.config.sample_rate),
        }
    }

    fn silence_event(&self, kind: TurnEventKind) -> TurnEvent {
        TurnEvent {
            turn_id: self.turn_id,
            kind,
            text: String::new(),
            elapsed_seconds: self.silence_samples as f32 / self.config.sample_rate as f32,
        }
    }

    /// Current turn or silence-span identifier.
    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    /// True while a turn is in progress.
    pub fn is_speaking(&self) -> bool {
        self.state == SpeakState::Speaking
    }

    /// Latest running transcript; empty outside a turn.
    pub fn transcript(&self) -> &str {
        &self.last_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TurnstreamError;
    use crate::stt::transcriber::{MockTranscriber, Segment, SpeechGatedTranscriber};

    fn inference_error() -> Result<Vec<Segment>> {
        Err(TurnstreamError::InferenceFailed {
            message: "transient failure".to_string(),
        })
    }

    /// Tiny config so tests stay readable: 100 samples per step, 3-step turns.
    fn test_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 100,
            step_seconds: 1,
            max_turn_seconds: 3,
            no_speech_threshold: 0.5,
        }
    }

    fn speech_step() -> Vec<f32> {
        vec![0.5; 100]
    }

    fn silent_step() -> Vec<f32> {
        vec![0.0; 100]
    }

    fn kinds(events: &[TurnEvent]) -> Vec<TurnEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_segmenter_starts_silent() {
        let segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());
        assert!(!segmenter.is_speaking());
        assert_eq!(segmenter.turn_id(), 0);
        assert_eq!(segmenter.transcript(), "");
    }

    #[test]
    fn test_first_silent_step_starts_silence_run() {
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        let events = segmenter.process_step(&silent_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::SilenceStarted]);
        assert_eq!(events[0].turn_id, 1);
        assert_eq!(events[0].text, "");
        assert_eq!(events[0].elapsed_seconds, 0.0);
    }

    #[test]
    fn test_silence_updates_accumulate_strictly_increasing() {
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        let mut elapsed = Vec::new();
        for _ in 0..4 {
            let events = segmenter.process_step(&silent_step()).unwrap();
            assert_eq!(events.len(), 1);
            elapsed.push(events[0].elapsed_seconds);
        }

        assert_eq!(elapsed, vec![0.0, 1.0, 2.0, 3.0]);
        // One id for the whole silence run
        assert_eq!(segmenter.turn_id(), 1);
    }

    #[test]
    fn test_speech_step_starts_turn() {
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::TurnStarted]);
        assert_eq!(events[0].turn_id, 1);
        assert_eq!(events[0].elapsed_seconds, 1.0);
        assert!(events[0].text.contains("voiced"));
        assert!(segmenter.is_speaking());
    }

    #[test]
    fn test_turn_lifecycle_start_update_finish() {
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        let started = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&started), vec![TurnEventKind::TurnStarted]);

        let updated = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&updated), vec![TurnEventKind::TurnUpdated]);
        assert_eq!(updated[0].turn_id, started[0].turn_id);
        assert!(updated[0].elapsed_seconds > started[0].elapsed_seconds);

        let finished = segmenter.process_step(&silent_step()).unwrap();
        assert_eq!(
            kinds(&finished),
            vec![TurnEventKind::TurnFinished, TurnEventKind::SilenceStarted]
        );
        assert_eq!(finished[0].turn_id, started[0].turn_id);
        // Turn finished with the full turn's duration and transcript
        assert_eq!(finished[0].elapsed_seconds, 2.0);
        assert!(finished[0].text.contains("200 voiced"));
        // The silence span takes the next id
        assert_eq!(finished[1].turn_id, started[0].turn_id + 1);
        assert!(!segmenter.is_speaking());
        assert_eq!(segmenter.transcript(), "");
    }

    #[test]
    fn test_running_transcript_covers_full_buffer_not_delta() {
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        segmenter.process_step(&speech_step()).unwrap();
        let events = segmenter.process_step(&speech_step()).unwrap();

        // 2 steps of 100 voiced samples each: transcript reflects all 200,
        // not just the newest step.
        assert!(events[0].text.contains("200 voiced"));
        assert_eq!(segmenter.transcript(), events[0].text);
    }

    #[test]
    fn test_forced_split_on_turn_overflow() {
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        // Fill the 3-step turn buffer
        for _ in 0..3 {
            segmenter.process_step(&speech_step()).unwrap();
        }
        let first_id = segmenter.turn_id();

        // Fourth speech step does not fit: exactly one finish/start pair
        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(
            kinds(&events),
            vec![TurnEventKind::TurnFinished, TurnEventKind::TurnStarted]
        );
        assert_eq!(events[0].turn_id, first_id);
        assert_eq!(events[1].turn_id, first_id + 1);
        // Finished with the old turn's full length, restarted with one step
        assert_eq!(events[0].elapsed_seconds, 3.0);
        assert_eq!(events[1].elapsed_seconds, 1.0);
        assert!(segmenter.is_speaking());
    }

    #[test]
    fn test_forced_split_finishes_with_last_computed_transcript() {
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        let mut last_update_text = String::new();
        for _ in 0..3 {
            let events = segmenter.process_step(&speech_step()).unwrap();
            last_update_text = events.last().unwrap().text.clone();
        }

        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(events[0].kind, TurnEventKind::TurnFinished);
        assert_eq!(events[0].text, last_update_text);
    }

    #[test]
    fn test_speech_after_silence_reuses_counter_rule() {
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        segmenter.process_step(&silent_step()).unwrap(); // id 1: silence run
        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(events[0].kind, TurnEventKind::TurnStarted);
        assert_eq!(events[0].turn_id, 2);

        // Back to silence: finish (id 2) + new silence run (id 3)
        let events = segmenter.process_step(&silent_step()).unwrap();
        assert_eq!(events[0].turn_id, 2);
        assert_eq!(events[1].turn_id, 3);
        assert_eq!(events[1].elapsed_seconds, 0.0);

        // Next silent step resumes accumulation from the new run's start
        let events = segmenter.process_step(&silent_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::SilenceUpdated]);
        assert_eq!(events[0].turn_id, 3);
        assert_eq!(events[0].elapsed_seconds, 1.0);
    }

    #[test]
    fn test_classification_threshold_filters_segments() {
        // Two segments: one confident, one above the 0.5 threshold.
        let transcriber = MockTranscriber::new("mock").with_segments(vec![
            Segment::new(" hello", 0.2),
            Segment::new(" [noise]", 0.8),
        ]);
        let mut segmenter = Segmenter::new(test_config(), transcriber);

        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(events[0].kind, TurnEventKind::TurnStarted);
        assert_eq!(events[0].text, " hello");
    }

    #[test]
    fn test_all_segments_above_threshold_is_silence() {
        let transcriber =
            MockTranscriber::new("mock").with_segments(vec![Segment::new(" breathing", 0.9)]);
        let mut segmenter = Segmenter::new(test_config(), transcriber);

        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::SilenceStarted]);
    }

    #[test]
    fn test_segments_concatenate_in_order() {
        let transcriber = MockTranscriber::new("mock").with_segments(vec![
            Segment::new(" one", 0.1),
            Segment::new(" two", 0.1),
            Segment::new(" three", 0.4),
        ]);
        let mut segmenter = Segmenter::new(test_config(), transcriber);

        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(events[0].text, " one two three");
    }

    #[test]
    fn test_custom_threshold_applies() {
        let config = EngineConfig {
            no_speech_threshold: 0.3,
            ..test_config()
        };
        // 0.4 would pass the default threshold but not this one
        let transcriber =
            MockTranscriber::new("mock").with_segments(vec![Segment::new(" maybe", 0.4)]);
        let mut segmenter = Segmenter::new(config, transcriber);

        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::SilenceStarted]);
    }

    #[test]
    fn test_inference_failure_propagates_without_state_change() {
        let transcriber = MockTranscriber::new("mock").with_failure();
        let mut segmenter = Segmenter::new(test_config(), transcriber);

        let result = segmenter.process_step(&speech_step());
        assert!(result.is_err());
        assert!(!segmenter.is_speaking());
        assert_eq!(segmenter.turn_id(), 0);
        assert_eq!(segmenter.transcript(), "");
    }

    #[test]
    fn test_failed_turn_start_leaves_state_untouched() {
        // Step classification succeeds, the fresh turn's transcription fails
        let transcriber = MockTranscriber::new("mock").with_script(vec![
            Ok(vec![Segment::new(" hello", 0.1)]),
            inference_error(),
            Ok(vec![Segment::new(" hello", 0.1)]),
            Ok(vec![Segment::new(" hello", 0.1)]),
        ]);
        let mut segmenter = Segmenter::new(test_config(), transcriber);

        assert!(segmenter.process_step(&speech_step()).is_err());
        assert_eq!(segmenter.turn_id(), 0);
        assert!(!segmenter.is_speaking());
        assert_eq!(segmenter.transcript(), "");

        // The failed step was skipped: the retry starts a clean one-step turn
        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::TurnStarted]);
        assert_eq!(events[0].turn_id, 1);
        assert_eq!(events[0].elapsed_seconds, 1.0);
    }

    #[test]
    fn test_failed_turn_update_rolls_back_buffer() {
        let transcriber = MockTranscriber::new("mock").with_script(vec![
            Ok(vec![Segment::new(" one", 0.1)]), // step 1 classification
            Ok(vec![Segment::new(" one", 0.1)]), // turn start transcript
            Ok(vec![Segment::new(" two", 0.1)]), // step 2 classification
            inference_error(),                   // full-turn re-transcription
            Ok(vec![Segment::new(" two", 0.1)]), // step 2 retried
            Ok(vec![Segment::new(" one two", 0.1)]),
        ]);
        let mut segmenter = Segmenter::new(test_config(), transcriber);

        let started = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&started), vec![TurnEventKind::TurnStarted]);

        assert!(segmenter.process_step(&speech_step()).is_err());
        assert_eq!(segmenter.turn_id(), started[0].turn_id);
        assert!(segmenter.is_speaking());
        assert_eq!(segmenter.transcript(), " one");

        // The retried step grows the turn by exactly one step, proving the
        // failed step's samples were rolled back out of the buffer.
        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::TurnUpdated]);
        assert_eq!(events[0].elapsed_seconds, 2.0);
        assert_eq!(events[0].text, " one two");
    }

    #[test]
    fn test_failed_split_keeps_old_turn_open() {
        let speech = || Ok(vec![Segment::new(" go", 0.1)]);
        let transcriber = MockTranscriber::new("mock").with_script(vec![
            speech(),
            speech(), // turn 1: started
            speech(),
            speech(), // turn 1: updated
            speech(),
            speech(), // turn 1: updated, buffer now full
            speech(),
            inference_error(), // split step: fresh turn's transcription fails
            speech(),
            speech(), // split step retried
        ]);
        let mut segmenter = Segmenter::new(test_config(), transcriber);

        for _ in 0..3 {
            segmenter.process_step(&speech_step()).unwrap();
        }
        let first_id = segmenter.turn_id();

        // The failing overflow step emits nothing and finishes nothing
        assert!(segmenter.process_step(&speech_step()).is_err());
        assert_eq!(segmenter.turn_id(), first_id);
        assert!(segmenter.is_speaking());
        assert_eq!(segmenter.transcript(), " go");

        // Retried, the split happens as usual
        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(
            kinds(&events),
            vec![TurnEventKind::TurnFinished, TurnEventKind::TurnStarted]
        );
        assert_eq!(events[0].turn_id, first_id);
        assert_eq!(events[0].elapsed_seconds, 3.0);
        assert_eq!(events[1].turn_id, first_id + 1);
        assert_eq!(events[1].elapsed_seconds, 1.0);
    }

    #[test]
    fn test_speaking_step_transcribes_step_then_full_turn() {
        let transcriber = MockTranscriber::new("mock");
        let mut segmenter = Segmenter::new(test_config(), transcriber);

        segmenter.process_step(&speech_step()).unwrap();
        // One classification call for the step plus one re-transcription of
        // the turn buffer.
        assert_eq!(segmenter.transcriber.calls(), 2);

        segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(segmenter.transcriber.calls(), 4);
    }

    #[test]
    fn test_silent_step_transcribes_once() {
        let counting = MockTranscriber::new("mock").with_segments(vec![Segment::new("", 0.9)]);
        let mut segmenter = Segmenter::new(test_config(), counting);
        segmenter.process_step(&silent_step()).unwrap();
        assert_eq!(segmenter.transcriber.calls(), 1);
    }

    #[test]
    fn test_end_to_end_counter_rule() {
        // canonical scenario: silence, speech, speech, silence
        let mut segmenter = Segmenter::new(test_config(), SpeechGatedTranscriber::new());

        let events = segmenter.process_step(&silent_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::SilenceStarted]);

        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::TurnStarted]);
        let turn_id = events[0].turn_id;

        let events = segmenter.process_step(&speech_step()).unwrap();
        assert_eq!(kinds(&events), vec![TurnEventKind::TurnUpdated]);

        let events = segmenter.process_step(&silent_step()).unwrap();
        assert_eq!(
            kinds(&events),
            vec![TurnEventKind::TurnFinished, TurnEventKind::SilenceStarted]
        );
        // One increment for the turn, one for the new silence span
        assert_eq!(events[1].turn_id, turn_id + 1);
        assert_eq!(segmenter.turn_id(), turn_id + 1);
    }
}
