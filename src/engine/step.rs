//! Step accumulator: one inference window's worth of samples.

use tracing::warn;

/// Fixed-capacity buffer that collects exactly one step of audio.
///
/// Frames append at the write cursor; a frame larger than the remaining
/// capacity is truncated to fit and the excess is dropped, not carried into
/// the next step. This is a known lossy simplification: transports deliver
/// frames of 10-20ms, far below the step size, so in practice nothing is
/// lost. Once the cursor reaches capacity the buffer is full and must be
/// `reset()` before further appends.
#[derive(Debug)]
pub struct StepBuffer {
    samples: Vec<f32>,
    cursor: usize,
}

impl StepBuffer {
    /// Creates a step buffer holding `capacity` samples.
    ///
    /// The backing storage is allocated once here and reused for the
    /// lifetime of the engine instance.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            cursor: 0,
        }
    }

    /// Appends samples at the write cursor, truncating to remaining capacity.
    ///
    /// Returns the number of samples actually written. Logs one warning per
    /// truncated frame; never fails and never allocates.
    pub fn append(&mut self, frame: &[f32]) -> usize {
        let remaining = self.samples.len() - self.cursor;
        let writable = frame.len().min(remaining);
        if writable < frame.len() {
            warn!(
                frame_len = frame.len(),
                remaining,
                dropped = frame.len() - writable,
                "frame larger than remaining step capacity, truncating"
            );
        }
        self.samples[self.cursor..self.cursor + writable].copy_from_slice(&frame[..writable]);
        self.cursor += writable;
        writable
    }

    /// True once the cursor has reached capacity.
    pub fn is_full(&self) -> bool {
        self.cursor == self.samples.len()
    }

    /// Number of samples accumulated so far.
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// True if nothing has been accumulated since the last reset.
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Total capacity in samples.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// The full step window, for handing to inference once `is_full()`.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Resets the write cursor so the buffer can collect the next step.
    ///
    /// Sample contents are left in place; the next step overwrites them.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}
