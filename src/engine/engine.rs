//! Engine core and the worker-thread bridge around it.
//!
//! [`TurnEngine`] is the synchronous core: feed it frames, get events back.
//! [`TurnEngine::start`] wraps it in a dedicated worker thread so the
//! blocking per-step inference never runs on the consumer's context; frames
//! go in over a crossbeam channel and events come out over an unbounded
//! tokio channel that never blocks the worker.

use crate::defaults;
use crate::engine::EngineConfig;
use crate::engine::event::TurnEvent;
use crate::engine::segmenter::Segmenter;
use crate::engine::step::StepBuffer;
use crate::error::{Result, TurnstreamError};
use crate::stt::transcriber::Transcriber;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Streaming segmentation engine for one audio source.
///
/// Owns the step accumulator and the segmentation state machine. All
/// buffers are allocated at construction and reused; only cursors and
/// counters mutate afterwards.
pub struct TurnEngine<T: Transcriber> {
    step_buffer: StepBuffer,
    segmenter: Segmenter<T>,
}

impl<T: Transcriber> TurnEngine<T> {
    /// Creates an engine with the given configuration and transcriber.
    ///
    /// # Errors
    /// Returns `ConfigInvalidValue` when the configuration fails
    /// [`EngineConfig::validate`].
    pub fn new(config: EngineConfig, transcriber: T) -> Result<Self> {
        config.validate()?;
        let step_buffer = StepBuffer::new(config.step_samples());
        let segmenter = Segmenter::new(config, transcriber);
        Ok(Self {
            step_buffer,
            segmenter,
        })
    }

    /// Feeds one frame of mono samples at the working rate.
    ///
    /// Returns the events produced if this frame completed a step, an empty
    /// vec otherwise. A frame overflowing the remaining step capacity is
    /// truncated to fit; the excess is dropped, not deferred.
    ///
    /// # Errors
    /// Propagates transcriber failures. The step that failed is skipped;
    /// the engine stays usable and keeps accumulating the next step.
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<Vec<TurnEvent>> {
        self.step_buffer.append(frame);
        if !self.step_buffer.is_full() {
            return Ok(Vec::new());
        }

        // Cursor resets before the blocking transcription so the buffer is
        // ready for the next step no matter how classification ends.
        self.step_buffer.reset();
        self.segmenter.process_step(self.step_buffer.samples())
    }

    /// Read access to the state machine (id, speaking flag, transcript).
    pub fn segmenter(&self) -> &Segmenter<T> {
        &self.segmenter
    }
}

impl<T: Transcriber + Send + 'static> TurnEngine<T> {
    /// Moves the engine onto its own worker thread.
    ///
    /// Returns a handle for pushing frames and an [`EventStream`] for the
    /// consumer. The worker runs until the handle is stopped, every frame
    /// sender is dropped, the event stream is dropped, or inference fails.
    pub fn start(self) -> (EngineHandle, EventStream) {
        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<Vec<f32>>(defaults::FRAME_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        let worker_running = running.clone();
        let mut engine = self;
        let thread = thread::spawn(move || {
            while worker_running.load(Ordering::SeqCst) {
                let frame = match frame_rx.recv() {
                    Ok(frame) => frame,
                    Err(_) => break,
                };
                match engine.process_frame(&frame) {
                    Ok(events) => {
                        for event in events {
                            if event_tx.send(event).is_err() {
                                debug!("event receiver dropped, stopping worker");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "step classification failed, stopping engine instance");
                        return;
                    }
                }
            }
        });

        (
            EngineHandle {
                frame_tx,
                running,
                thread,
            },
            EventStream { rx: event_rx },
        )
    }
}

/// Handle to a running engine's worker thread.
///
/// Owned by whatever attaches the engine to an audio source; dropping it
/// closes the frame channel and lets the worker wind down.
pub struct EngineHandle {
    frame_tx: crossbeam_channel::Sender<Vec<f32>>,
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl EngineHandle {
    /// Pushes one frame of mono samples at the working rate.
    ///
    /// Applies backpressure when the frame channel is full, which only
    /// happens if inference falls far behind the audio source.
    ///
    /// # Errors
    /// Returns `EngineStopped` once the worker has exited.
    pub fn push_frame(&self, frame: &[f32]) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TurnstreamError::EngineStopped {
                message: "engine handle was stopped".to_string(),
            });
        }
        self.frame_tx
            .send(frame.to_vec())
            .map_err(|_| TurnstreamError::EngineStopped {
                message: "worker thread exited".to_string(),
            })
    }

    /// Returns true while the worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.thread.is_finished()
    }

    /// Stops the worker and waits for it to finish.
    ///
    /// Frames still queued are discarded; an in-flight classification is
    /// allowed to complete but no final `TurnFinished` is flushed.
    pub fn stop(self) {
        let EngineHandle {
            frame_tx,
            running,
            thread,
        } = self;
        running.store(false, Ordering::SeqCst);
        // Unblocks a worker parked in recv()
        drop(frame_tx);
        if let Err(panic_info) = thread.join() {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            error!(panic = msg, "engine worker thread panicked");
        }
    }
}

/// Ordered, asynchronous view of a running engine's events.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<TurnEvent>,
}

impl EventStream {
    /// Waits for the next event; `None` once the engine has stopped.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll for an already-delivered event.
    pub fn try_next_event(&mut self) -> Option<TurnEvent> {
        self.rx.try_recv().ok()
    }

    /// Drains the stream into `callback`, one in-order call per event.
    ///
    /// Runs on the consumer's async context, never on the engine's worker
    /// thread. The returned task finishes when the engine stops.
    pub fn forward<F>(mut self, mut callback: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(TurnEvent) + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(event) = self.rx.recv().await {
                callback(event);
            }
        })
    }
}
