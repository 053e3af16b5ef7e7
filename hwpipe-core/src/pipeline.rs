//! Narrow command interface to the out-of-process hardware pipeline
//!
//! The hardware decoder/renderer is a black box. Sessions talk to it only
//! through [`HardwarePipeline`], passing textual command documents and
//! receiving sparse notifications through a [`PipelineCallback`] that may be
//! invoked from any thread.

use std::fmt;
use std::sync::Arc;

/// Kind of notification delivered by the hardware event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Asynchronous Load finished; the pipeline is ready to play
    LoadCompleted,
    /// A unit was rendered; the numeric value carries the device playtime (ns)
    FrameReady,
    /// Informational event the sessions do not act on (raw type code)
    Other(i32),
}

/// Single notification from the hardware pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEvent {
    /// Event type tag
    pub kind: EventKind,
    /// Numeric value attached to the event
    pub value: i64,
    /// Optional string payload
    pub payload: Option<String>,
}

impl PipelineEvent {
    /// Create an event without a string payload
    pub fn new(kind: EventKind, value: i64) -> Self {
        Self {
            kind,
            value,
            payload: None,
        }
    }

    /// Attach a string payload
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Load-complete notification
    pub fn load_completed() -> Self {
        Self::new(EventKind::LoadCompleted, 0)
    }

    /// Frame-ready notification carrying the device playtime in nanoseconds
    pub fn frame_ready(playtime_ns: i64) -> Self {
        Self::new(EventKind::FrameReady, playtime_ns)
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} value={} payload={}",
            self.kind,
            self.value,
            self.payload.as_deref().unwrap_or("")
        )
    }
}

/// Event sink registered with [`HardwarePipeline::load`].
///
/// Invoked on a thread owned by the hardware pipeline, never on the session's
/// owning thread.
pub type PipelineCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Command surface of one exclusive hardware pipeline handle.
///
/// Every command is a single synchronous call; documents are JSON text.
/// Implementations must tolerate commands issued from the callback thread
/// (Play on load completion) concurrently with the owning thread.
pub trait HardwarePipeline: Send + Sync {
    /// Declare that this client owns the foreground media resources
    fn notify_foreground(&self) {}

    /// Start an asynchronous load; `false` means the device refused it
    fn load(&self, document: &str, callback: PipelineCallback) -> bool;

    /// Feed one buffer described by `document`; returns the raw status string
    fn feed(&self, document: &str) -> String;

    /// Seek to a position given in milliseconds
    fn seek(&self, position_ms: &str) -> bool;

    /// Start or resume playback
    fn play(&self) -> bool;

    /// Pause playback
    fn pause(&self) -> bool;

    /// Release the pipeline
    fn unload(&self) -> bool;

    /// Discard all queued data
    fn flush(&self) -> bool;

    /// Signal end of stream
    fn push_eos(&self) -> bool;

    /// Current device playtime in nanoseconds
    fn current_playtime(&self) -> i64;

    /// Hand static HDR metadata to the pipeline
    fn set_hdr_info(&self, document: &str) -> bool;
}

/// Creates a fresh pipeline handle for each session
pub trait PipelineFactory: Send + Sync {
    /// Create a new, unloaded pipeline handle
    fn create(&self) -> Arc<dyn HardwarePipeline>;
}

impl<F> PipelineFactory for F
where
    F: Fn() -> Arc<dyn HardwarePipeline> + Send + Sync,
{
    fn create(&self) -> Arc<dyn HardwarePipeline> {
        self()
    }
}
