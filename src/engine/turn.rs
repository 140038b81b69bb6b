//! Turn buffer: all audio of the speech turn currently being assembled.

/// Fixed-capacity buffer holding the current turn's samples.
///
/// Grows only by appending just-completed steps while the engine is in the
/// speaking state; cleared when a turn finishes, normally or through a
/// forced overflow split. The backing storage is allocated once and reused.
#[derive(Debug)]
pub struct TurnBuffer {
    samples: Vec<f32>,
    cursor: usize,
}

impl TurnBuffer {
    /// Creates a turn buffer holding `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            cursor: 0,
        }
    }

    /// True if `len` more samples fit without overflowing.
    pub fn has_room(&self, len: usize) -> bool {
        self.cursor + len <= self.samples.len()
    }

    /// Appends a completed step's samples.
    ///
    /// Callers must check `has_room()` first; anything beyond capacity is
    /// silently ignored, matching the step buffer's lossy policy.
    pub fn append(&mut self, step: &[f32]) {
        let remaining = self.samples.len() - self.cursor;
        let writable = step.len().min(remaining);
        self.samples[self.cursor..self.cursor + writable].copy_from_slice(&step[..writable]);
        self.cursor += writable;
    }

    /// Samples accumulated for the current turn.
    pub fn samples(&self) -> &[f32] {
        &self.samples[..self.cursor]
    }

    /// Number of samples in the current turn.
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// True if no turn audio is buffered.
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Current turn length in seconds at the given sample rate.
    pub fn elapsed_seconds(&self, sample_rate: u32) -> f32 {
        self.cursor as f32 / sample_rate as f32
    }

    /// Rolls the cursor back to `len` samples, discarding anything appended
    /// past that point. A `len` beyond the cursor is a no-op.
    pub fn truncate(&mut self, len: usize) {
        self.cursor = self.cursor.min(len);
    }

    /// Drops the current turn's audio, keeping the allocation.
    pub fn clear(&mut self) {
        self.cursor = 0;
    }
}
