//! Event types emitted by the segmentation engine.

use serde::Serialize;

/// Lifecycle stage a [`TurnEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEventKind {
    /// A new speech turn began on this step.
    TurnStarted,
    /// The current turn grew by one step; `text` carries the re-transcribed
    /// running transcript of the whole turn so far.
    TurnUpdated,
    /// The current turn ended, either because silence resumed or because the
    /// turn buffer filled and the turn was force-split.
    TurnFinished,
    /// A silence run began after a finished turn.
    SilenceStarted,
    /// The ongoing silence run grew by one step.
    SilenceUpdated,
}

impl TurnEventKind {
    /// Stable string tag, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnEventKind::TurnStarted => "turn_started",
            TurnEventKind::TurnUpdated => "turn_updated",
            TurnEventKind::TurnFinished => "turn_finished",
            TurnEventKind::SilenceStarted => "silence_started",
            TurnEventKind::SilenceUpdated => "silence_updated",
        }
    }

    /// Returns true for the three turn lifecycle kinds.
    pub fn is_turn(&self) -> bool {
        matches!(
            self,
            TurnEventKind::TurnStarted | TurnEventKind::TurnUpdated | TurnEventKind::TurnFinished
        )
    }
}

/// One segmentation event, correlated to a turn or silence span by `turn_id`.
#[derive(Debug, Clone, Serialize)]
pub struct TurnEvent {
    /// Monotonic identifier; incremented on every turn start and every
    /// silence-run start, so consecutive events with the same id belong to
    /// the same logical span.
    pub turn_id: u64,
    /// Lifecycle stage.
    pub kind: TurnEventKind,
    /// Running transcript for turn events, empty for silence events.
    pub text: String,
    /// Audio accumulated in the current span, in seconds: turn buffer length
    /// for turn events, consecutive silence for silence events.
    pub elapsed_seconds: f32,
}
