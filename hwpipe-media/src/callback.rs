//! Callback demultiplexer
//!
//! The hardware pipeline delivers notifications on its own event thread.
//! The demultiplexer never touches session fields directly: state changes
//! are posted as [`SessionSignal`]s that the owning thread drains on its
//! next call, and the audio clock is updated through single-writer atomics.

use hwpipe_core::{AudioClock, EsKind, EventKind, HardwarePipeline, PipelineCallback, PipelineEvent};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// State change posted from the callback thread to the owning thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// The asynchronous load finished (possibly again)
    LoadCompleted,
}

/// Event sink registered with `load`
pub struct CallbackDemux {
    session_id: Uuid,
    kind: EsKind,
    pipeline: Weak<dyn HardwarePipeline>,
    clock: Option<Arc<AudioClock>>,
    signals: Option<UnboundedSender<SessionSignal>>,
}

impl CallbackDemux {
    /// Demultiplexer for a video session
    pub fn video(
        session_id: Uuid,
        pipeline: &Arc<dyn HardwarePipeline>,
        signals: UnboundedSender<SessionSignal>,
    ) -> Self {
        Self {
            session_id,
            kind: EsKind::Video,
            pipeline: Arc::downgrade(pipeline),
            clock: None,
            signals: Some(signals),
        }
    }

    /// Demultiplexer for an audio session
    pub fn audio(
        session_id: Uuid,
        pipeline: &Arc<dyn HardwarePipeline>,
        clock: Arc<AudioClock>,
    ) -> Self {
        Self {
            session_id,
            kind: EsKind::Audio,
            pipeline: Arc::downgrade(pipeline),
            clock: Some(clock),
            signals: None,
        }
    }

    /// Dispatch one notification
    pub fn handle(&self, event: PipelineEvent) {
        match event.kind {
            EventKind::LoadCompleted => {
                debug!(session = %self.session_id, kind = ?self.kind, "load completed, starting playback");
                match self.pipeline.upgrade() {
                    Some(pipeline) => {
                        if !pipeline.play() {
                            warn!(session = %self.session_id, "play after load completion was refused");
                        }
                    }
                    None => trace!(session = %self.session_id, "load completed after session teardown"),
                }
                if let Some(signals) = &self.signals {
                    // receiver gone means the session was dropped
                    let _ = signals.send(SessionSignal::LoadCompleted);
                }
            }
            EventKind::FrameReady => match &self.clock {
                Some(clock) => {
                    clock.on_frame_ready(event.value);
                    trace!(session = %self.session_id, playtime = event.value, "frame ready");
                }
                None => trace!(session = %self.session_id, %event, "frame ready ignored"),
            },
            EventKind::Other(_) => {
                debug!(session = %self.session_id, kind = ?self.kind, %event, "unhandled pipeline event");
            }
        }
    }

    /// Wrap into the callback type accepted by `load`
    pub fn into_callback(self) -> PipelineCallback {
        Arc::new(move |event| self.handle(event))
    }
}
