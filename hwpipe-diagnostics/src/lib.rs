//! # hwpipe diagnostics
//!
//! Debugging and test tools for hardware pipeline sessions: subscriber
//! setup, a recording [`HardwarePipeline`](hwpipe_core::HardwarePipeline)
//! that stands in for the device, and serialisable session reports.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod logging;
pub mod recording;
pub mod report;

// Re-export main types
pub use logging::init_logging;
pub use recording::{RecordedCommand, RecordingPipeline};
pub use report::{CommandSummary, SessionReport};
