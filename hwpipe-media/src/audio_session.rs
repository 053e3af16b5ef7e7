//! Hardware audio passthrough session
//!
//! Compressed Dolby Digital family streams are handed to the pipeline
//! untouched. PCM is not supported: the pipeline's PCM path adds too much
//! latency. The session keeps its own presentation-time accumulator, since
//! the engine hands over raw frames without timestamps.

use crate::callback::CallbackDemux;
use crate::stream::{AudioFormat, AudioStreamType, SampleFormat};
use hwpipe_core::{
    ns_to_duration, Ac3PlusInfo, AudioClock, BufferingControl, CancelToken, EsKind, FeedCommand,
    HardwarePipeline, HwPipeError, HwPipeResult, IngestStats, LoadCommand, LoadPayload,
    PipelineConfig, RetryPolicy, SubmitOutcome,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Fixed output latency of the hardware pipeline
pub const HARDWARE_LATENCY: Duration = Duration::from_millis(250);

/// Samples per frame assumed when the stream does not say
const DEFAULT_AC3_FRAME_SIZE: u32 = 1536;

/// Units of playback time reported as cached in the device
const CACHED_UNITS: u32 = 8;

/// Whether a call advances the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtsAdvance {
    /// Advance by one unit duration
    Advance,
    /// Leave the accumulator where it is
    Skip,
}

/// Frame-count table deciding whether an AddPackets call advances the pts
/// accumulator.
///
/// Transcoded content arrives as a 1024-frame call followed by a 1536-frame
/// call for the same unit of time; only the second may advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtsAdvancePolicy {
    skip_frame_counts: Vec<u32>,
}

impl Default for PtsAdvancePolicy {
    fn default() -> Self {
        Self {
            skip_frame_counts: vec![1024],
        }
    }
}

impl PtsAdvancePolicy {
    /// Decide for a call carrying `frames` frames
    pub fn decide(&self, frames: u32) -> PtsAdvance {
        if self.skip_frame_counts.contains(&frames) {
            PtsAdvance::Skip
        } else {
            PtsAdvance::Advance
        }
    }
}

/// Lifecycle state of an audio session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioSessionState {
    /// Not initialized, or deinitialized
    Closed,
    /// Load issued; packets may be added
    Loaded,
}

impl fmt::Display for AudioSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSessionState::Closed => f.write_str("closed"),
            AudioSessionState::Loaded => f.write_str("loaded"),
        }
    }
}

/// Session driving one hardware audio pipeline
pub struct AudioSession {
    id: Uuid,
    pipeline: Arc<dyn HardwarePipeline>,
    config: PipelineConfig,
    state: AudioSessionState,
    format: Option<AudioFormat>,
    clock: Arc<AudioClock>,
    policy: PtsAdvancePolicy,
    cancel: CancelToken,
    queue_level: u32,
    stats: IngestStats,
}

impl AudioSession {
    /// Create a closed session over `pipeline`
    pub fn new(pipeline: Arc<dyn HardwarePipeline>, config: PipelineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline,
            config,
            state: AudioSessionState::Closed,
            format: None,
            clock: Arc::new(AudioClock::new()),
            policy: PtsAdvancePolicy::default(),
            cancel: CancelToken::new(),
            queue_level: 0,
            stats: IngestStats::default(),
        }
    }

    /// Session id used in log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> AudioSessionState {
        self.state
    }

    /// Negotiated format
    pub fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }

    /// Accumulated presentation time in nanoseconds
    pub fn pts_ns(&self) -> i64 {
        self.clock.pts_ns()
    }

    /// Ingest queue level in bytes
    pub fn queue_level(&self) -> u32 {
        self.queue_level
    }

    /// Ingest counters
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Handle another thread can use to abandon an in-flight retry or pause
    pub fn interrupt_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Negotiate `requested` and load the pipeline; returns the accepted format
    pub fn initialize(&mut self, requested: AudioFormat) -> HwPipeResult<AudioFormat> {
        if self.state != AudioSessionState::Closed {
            return Err(HwPipeError::InvalidState {
                expected: AudioSessionState::Closed.to_string(),
                actual: self.state.to_string(),
            });
        }
        if requested.sample_format != SampleFormat::Raw {
            return Err(HwPipeError::UnsupportedFormat {
                format: format!("{:?} audio, only compressed passthrough", requested.sample_format),
            });
        }

        let (codec_name, ac3_plus_info) = match requested.stream_type {
            Some(AudioStreamType::Ac3) => ("AC3", None),
            Some(AudioStreamType::Eac3) => (
                "AC3 PLUS",
                Some(Ac3PlusInfo {
                    channels: requested.channels,
                    frequency: f64::from(requested.sample_rate) / 1000.0,
                }),
            ),
            other => {
                return Err(HwPipeError::UnsupportedFormat {
                    format: format!("{other:?} passthrough"),
                })
            }
        };

        let mut format = requested;
        if format.ac3_frame_size == 0 {
            format.ac3_frame_size = DEFAULT_AC3_FRAME_SIZE;
        }
        format.frames = format.ac3_frame_size;
        format.frame_size = 1;
        let queue_level = format
            .frames
            .saturating_mul(self.config.audio_buffer_frames_multiplier);

        debug!(session = %self.id, channels = format.channels, codec = codec_name, "initializing audio");

        let payload = LoadPayload::audio(
            &self.config,
            codec_name,
            ac3_plus_info,
            BufferingControl::audio(queue_level, format.frames),
        );
        let document = LoadCommand::new(payload).to_json()?;

        self.clock.reset();
        self.pipeline.notify_foreground();
        debug!(session = %self.id, payload = %document, "sending load");

        let callback =
            CallbackDemux::audio(self.id, &self.pipeline, self.clock.clone()).into_callback();
        if !self.pipeline.load(&document, callback) {
            error!(session = %self.id, "audio load failed");
            return Err(HwPipeError::DeviceRejected {
                reason: "load refused".to_string(),
            });
        }

        self.state = AudioSessionState::Loaded;
        self.queue_level = queue_level;
        self.format = Some(format.clone());
        self.stats = IngestStats::default();
        self.cancel.rearm();
        info!(session = %self.id, codec = codec_name, queue_level, "audio pipeline opened");
        Ok(format)
    }

    fn unit_duration(&self) -> Duration {
        self.format
            .as_ref()
            .map(AudioFormat::unit_duration)
            .unwrap_or_default()
    }

    /// Feed `frames` frames starting at frame `offset` of `data`.
    ///
    /// Returns the number of frames consumed; zero when interrupted. A full
    /// ingest buffer is retried, paced by the unit duration.
    pub fn add_packets(&mut self, data: &[u8], frames: u32, offset: u32) -> HwPipeResult<u32> {
        let Some(format) = self.format.as_ref().filter(|_| self.state == AudioSessionState::Loaded)
        else {
            return Err(HwPipeError::InvalidState {
                expected: AudioSessionState::Loaded.to_string(),
                actual: self.state.to_string(),
            });
        };

        let frame_size = format.frame_size as usize;
        let range = (offset as usize)
            .checked_mul(frame_size)
            .zip((frames as usize).checked_mul(frame_size))
            .and_then(|(start, len)| Some(start..start.checked_add(len)?));
        let Some(buffer) = range.and_then(|range| data.get(range)) else {
            return Err(HwPipeError::InvalidStreamDescriptor {
                reason: format!(
                    "{frames} frames at offset {offset} outside a {} byte buffer",
                    data.len()
                ),
            });
        };

        let pts = self.clock.pts_ns();
        let unit = self.unit_duration();
        let document = FeedCommand::new(buffer, Some(pts), EsKind::Audio).to_json()?;
        trace!(session = %self.id, payload = %document, "add packets");

        let pipeline = &self.pipeline;
        let outcome = RetryPolicy::paced(unit).submit(&self.cancel, || pipeline.feed(&document));
        self.stats.record(&outcome, buffer.len());

        match outcome {
            SubmitOutcome::Accepted { .. } => {
                // Only data the device took moves the accumulator
                if self.policy.decide(frames) == PtsAdvance::Advance {
                    self.clock
                        .advance(i64::try_from(unit.as_nanos()).unwrap_or(i64::MAX));
                }
                Ok(frames)
            }
            SubmitOutcome::Fatal { status, .. } => {
                warn!(session = %self.id, status = %status, "buffer submit returned error");
                Err(HwPipeError::IngestFatal { status })
            }
            SubmitOutcome::Cancelled { retries } => {
                debug!(session = %self.id, retries, "add packets interrupted");
                Ok(0)
            }
        }
    }

    /// Pause output for `millis` milliseconds, then resume
    pub fn add_pause(&mut self, millis: u64) {
        if self.state == AudioSessionState::Closed {
            return;
        }
        self.pipeline.pause();
        if self.cancel.wait_for(Duration::from_millis(millis)) {
            debug!(session = %self.id, "pause interrupted");
        }
        self.pipeline.play();
    }

    /// Time until audio fed now becomes audible
    pub fn delay(&self) -> Duration {
        let queued = self.clock.delay_ns().map(ns_to_duration).unwrap_or_default();
        HARDWARE_LATENCY + queued
    }

    /// Playback time the device can hold
    pub fn cache_total(&self) -> Duration {
        self.unit_duration() * CACHED_UNITS
    }

    /// Extra output latency beyond [`delay`](Self::delay)
    pub fn latency(&self) -> Duration {
        Duration::ZERO
    }

    /// Whether the session controls volume
    pub fn has_volume(&self) -> bool {
        false
    }

    /// Discard queued audio and restart the accumulator at zero
    pub fn drain(&mut self) {
        if self.state == AudioSessionState::Closed {
            return;
        }
        debug!(session = %self.id, "drain");
        self.pipeline.flush();
        self.clock.reset();
        self.cancel.rearm();
    }

    /// Same as [`drain`](Self::drain)
    pub fn flush(&mut self) {
        self.drain();
    }

    /// Unload the pipeline; idempotent
    pub fn deinitialize(&mut self) {
        self.cancel.close();
        if self.state == AudioSessionState::Closed {
            return;
        }
        self.pipeline.unload();
        self.state = AudioSessionState::Closed;
        info!(session = %self.id, fed = self.stats.packets_fed, "audio pipeline closed");
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.deinitialize();
    }
}

impl fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("format", &self.format)
            .field("pts_ns", &self.clock.pts_ns())
            .finish()
    }
}
