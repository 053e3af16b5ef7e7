//! # hwpipe - Hardware Media Pipeline Adapter
//!
//! hwpipe feeds demuxed audio and video elementary streams from a media
//! player engine into an out-of-process hardware decoder/renderer. The
//! device accepts JSON command documents, answers feeds with a status
//! string, and reports progress through an asynchronous callback.
//!
//! ## Key Features
//!
//! - **Hardware video sessions**: open, feed, seek, reset and drain one
//!   exclusive hardware video pipeline
//! - **Passthrough audio**: compressed AC-3 / E-AC-3 straight to the device
//! - **Backpressure**: `BufferFull` answers are retried at frame pacing
//! - **HDR signalling**: mastering metadata forwarded as SEI/VUI documents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hwpipe::{GlobalConfig, HwPipe, Packet, StreamDescriptor, VideoCodecId};
//! use hwpipe::{HardwarePipeline, PipelineFactory};
//! use std::sync::Arc;
//!
//! # fn device() -> Arc<dyn HardwarePipeline> { unimplemented!() }
//! let factory: Arc<dyn PipelineFactory> = Arc::new(|| device());
//! let hwpipe = HwPipe::init_with(GlobalConfig::default(), factory)?;
//! hwpipe.window().bind("window-0");
//!
//! let descriptor = StreamDescriptor::video(VideoCodecId::H264, 1920, 1080).with_fps(24000, 1001);
//! let mut video = hwpipe.open_video(descriptor)?;
//! video.add_data(&Packet::new(&[0, 0, 0, 1, 0x65]).with_pts(std::time::Duration::ZERO));
//! # Ok::<(), hwpipe::HwPipeError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use hwpipe_core::{
    AudioClock, CancelToken, ErrorCategory, EventKind, FeedStatus, GuardLease, HardwarePipeline,
    HwPipeError, HwPipeResult, IngestStats, InstanceGuard, PipelineCallback, PipelineConfig,
    PipelineEvent, PipelineFactory, RetryPolicy, SubmitOutcome, VideoBufferLevels,
};

pub use hwpipe_media::{
    AudioDeviceInfo, AudioFormat, AudioSession, AudioSessionState, AudioStreamType,
    BitstreamConverter, CodecControl, CodecRegistry, ContentLightMetadata, ConverterFactory,
    DecoderInfo, FrameEvent, FrameMarker, HdrType, KeyframeGate, MasteringMetadata,
    OutputRegionSink, Packet, Rect, SampleFormat, StreamDescriptor, TransferCharacteristic,
    VideoCodecId, VideoSession, VideoState, WindowBinding, HW_AUDIO_SINK, HW_VIDEO_DECODER,
};

#[cfg(feature = "diagnostics")]
pub use hwpipe_diagnostics::{init_logging, CommandSummary, SessionReport};

// Public API modules
pub mod config;

pub use config::GlobalConfig;

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Video session shared between the owning thread and async feeders
pub type SharedVideoSession = Arc<Mutex<VideoSession>>;

/// Main entry point for hwpipe
#[derive(Debug, Clone)]
pub struct HwPipe {
    inner: Arc<HwPipeInner>,
}

struct HwPipeInner {
    config: GlobalConfig,
    registry: CodecRegistry,
    guard: InstanceGuard,
    window: WindowBinding,
    factory: Arc<dyn PipelineFactory>,
}

impl fmt::Debug for HwPipeInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwPipeInner")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("guard", &self.guard.resource())
            .field("window_bound", &self.window.is_bound())
            .finish()
    }
}

impl HwPipe {
    /// Initialize with custom global configuration.
    ///
    /// Video sessions share the process-wide hardware video guard.
    pub fn init_with(
        config: GlobalConfig,
        factory: Arc<dyn PipelineFactory>,
    ) -> HwPipeResult<Self> {
        Self::init_with_guard(config, factory, InstanceGuard::process_wide_video())
    }

    /// Initialize with an explicit instance guard
    pub fn init_with_guard(
        config: GlobalConfig,
        factory: Arc<dyn PipelineFactory>,
        guard: InstanceGuard,
    ) -> HwPipeResult<Self> {
        config.pipeline.validate()?;

        install_logging(&config);

        let registry = CodecRegistry::with_defaults(&config.pipeline);
        info!(
            codecs = ?registry.list_codecs(),
            hw_video = config.pipeline.video_enabled(),
            "hwpipe initialized"
        );

        Ok(Self {
            inner: Arc::new(HwPipeInner {
                config,
                registry,
                guard,
                window: WindowBinding::new(),
                factory,
            }),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }

    /// Capability registry consulted by the player engine
    pub fn registry(&self) -> &CodecRegistry {
        &self.inner.registry
    }

    /// Window binding shared by every video session
    pub fn window(&self) -> &WindowBinding {
        &self.inner.window
    }

    /// Guard protecting the hardware video pipeline
    pub fn video_guard(&self) -> &InstanceGuard {
        &self.inner.guard
    }

    /// Open a hardware video session for `descriptor`.
    ///
    /// Packets must already be in the device's wire format.
    pub fn open_video(&self, descriptor: StreamDescriptor) -> HwPipeResult<VideoSession> {
        self.open_video_inner(descriptor, None)
    }

    /// Open a hardware video session whose packets pass through `converter`
    /// when the descriptor carries out-of-band codec configuration
    pub fn open_video_with_converter(
        &self,
        descriptor: StreamDescriptor,
        converter: ConverterFactory,
    ) -> HwPipeResult<VideoSession> {
        self.open_video_inner(descriptor, Some(converter))
    }

    fn open_video_inner(
        &self,
        descriptor: StreamDescriptor,
        converter: Option<ConverterFactory>,
    ) -> HwPipeResult<VideoSession> {
        let entry = match self.inner.registry.find_video_decoder(descriptor.codec) {
            Some(entry) => entry,
            None if !self.inner.config.pipeline.video_enabled() => {
                return Err(HwPipeError::FeatureDisabled {
                    feature: "hardware video".to_string(),
                })
            }
            None => {
                return Err(HwPipeError::UnsupportedFormat {
                    format: format!("{:?}", descriptor.codec),
                })
            }
        };

        let mut session = (entry.create)(
            self.inner.factory.create(),
            self.inner.guard.clone(),
            self.inner.config.pipeline.clone(),
        );
        if let Some(converter) = converter {
            session.set_converter_factory(converter);
        }

        session.open(descriptor, &self.inner.window.window_handle())?;
        debug!(session = %session.id(), decoder = %entry.name, "video session opened");
        Ok(session)
    }

    /// Open a passthrough audio session.
    ///
    /// The session is returned initialized; [`AudioSession::format`] holds
    /// the negotiated format.
    pub fn open_audio(&self, format: AudioFormat) -> HwPipeResult<AudioSession> {
        let entry = self
            .inner
            .registry
            .get_audio_sink(HW_AUDIO_SINK)
            .ok_or_else(|| HwPipeError::FeatureDisabled {
                feature: "hardware audio".to_string(),
            })?;

        let mut session = (entry.create)(
            self.inner.factory.create(),
            self.inner.config.pipeline.clone(),
        );
        session.initialize(format)?;
        debug!(session = %session.id(), sink = %entry.name, "audio session opened");
        Ok(session)
    }

    /// Feed one video packet from async code.
    ///
    /// Submission may block while the device reports a full buffer, so it
    /// runs on the blocking pool. Returns what [`VideoSession::add_data`]
    /// returns.
    pub async fn feed_video_async(
        session: SharedVideoSession,
        data: Vec<u8>,
        pts: Option<Duration>,
    ) -> HwPipeResult<bool> {
        let accepted = tokio::task::spawn_blocking(move || {
            let mut packet = Packet::new(&data);
            packet.pts = pts;
            session.lock().add_data(&packet)
        })
        .await
        .map_err(std::io::Error::from)?;
        Ok(accepted)
    }
}

#[cfg(feature = "diagnostics")]
fn install_logging(config: &GlobalConfig) {
    if config.debug_logging || config.log_filter.is_some() {
        init_logging(&config.effective_log_filter());
    }
}

#[cfg(not(feature = "diagnostics"))]
fn install_logging(_config: &GlobalConfig) {}
