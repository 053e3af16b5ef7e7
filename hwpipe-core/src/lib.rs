//! # hwpipe core
//!
//! Foundational pieces shared by every hardware media pipeline session: the
//! narrow command interface to the out-of-process decoder/renderer, the
//! textual command documents it consumes, the status parser for its replies,
//! and the timing and exclusivity primitives the sessions are built from.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backpressure;
pub mod cancel;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod guard;
pub mod pipeline;
pub mod status;

// Re-export main types
pub use backpressure::{IngestStats, RetryPolicy, SubmitOutcome};
pub use cancel::CancelToken;
pub use clock::{ns_to_duration, AudioClock, ClockReconciler};
pub use command::{
    Ac3PlusInfo, BufferLevel, BufferingControl, CodecNames, Contents, DolbyHdrInfo, EsInfo,
    EsKind, ExternalStreamingInfo, FeedCommand, LoadCommand, LoadOption, LoadPayload,
    Transmission,
};
pub use config::{PipelineConfig, VideoBufferLevels};
pub use error::{ErrorCategory, HwPipeError, HwPipeResult};
pub use guard::{GuardLease, InstanceGuard};
pub use pipeline::{EventKind, HardwarePipeline, PipelineCallback, PipelineEvent, PipelineFactory};
pub use status::FeedStatus;
