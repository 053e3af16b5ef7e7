//! Hardware video pipeline session
//!
//! One session owns one hardware pipeline handle for a video elementary
//! stream. Packets are fed by reference in decode order; the decoded picture
//! never leaves the hardware, so the session's output is a [`FrameMarker`]
//! timed from the device playtime.
//!
//! Lifecycle:
//!
//! ```text
//!   Closed --open--> Flushed --add_data--> Running
//!                       ^                     |
//!                       +---reset / load------+
//!   any --dispose--> Closed
//! ```

use crate::callback::{CallbackDemux, SessionSignal};
use crate::codecs::ResolvedVideoFormat;
use crate::converter::{BitstreamConverter, ConverterFactory};
use crate::hdr::HdrDocument;
use crate::stream::{FrameEvent, FrameMarker, Packet, StreamDescriptor};
use hwpipe_core::{
    CancelToken, ClockReconciler, EsInfo, EsKind, FeedCommand, GuardLease, HardwarePipeline,
    HwPipeError, HwPipeResult, IngestStats, InstanceGuard, LoadCommand, LoadPayload,
    PipelineConfig, RetryPolicy, SubmitOutcome,
};
use serde::Serialize;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Number of reference frames the engine may hold back
const ALLOWED_REFERENCES: u32 = 4;

/// Lifecycle state of a video session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VideoState {
    /// Not opened, or disposed
    Closed,
    /// Loaded or flushed; the next packet primes the device position
    Flushed,
    /// Packets are flowing
    Running,
}

impl fmt::Display for VideoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoState::Closed => "closed",
            VideoState::Flushed => "flushed",
            VideoState::Running => "running",
        };
        f.write_str(name)
    }
}

/// Decoder control flags set by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecControl(u32);

impl CodecControl {
    /// No flags
    pub const NONE: CodecControl = CodecControl(0);
    /// Drain: stop consuming input until cleared
    pub const DRAIN: CodecControl = CodecControl(0x01);
    /// Skip post-processing
    pub const NO_POSTPROC: CodecControl = CodecControl(0x02);

    /// Whether all flags in `other` are set
    pub fn contains(self, other: CodecControl) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for CodecControl {
    type Output = CodecControl;

    fn bitor(self, rhs: Self) -> Self::Output {
        CodecControl(self.0 | rhs.0)
    }
}

/// Decoder description reported to the player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecoderInfo {
    /// Decoder name
    pub decoder_name: String,
    /// Output pixel format
    pub pixel_format: String,
    /// Deinterlacing method
    pub deinterlace_method: String,
    /// Coded width
    pub width: u32,
    /// Coded height
    pub height: u32,
    /// Display aspect ratio
    pub aspect: f64,
    /// Frames per second
    pub fps: f64,
}

/// Session driving one hardware video pipeline
pub struct VideoSession {
    id: Uuid,
    pipeline: Arc<dyn HardwarePipeline>,
    guard: InstanceGuard,
    lease: Option<GuardLease>,
    config: PipelineConfig,
    state: VideoState,
    descriptor: Option<StreamDescriptor>,
    format: Option<ResolvedVideoFormat>,
    converter_factory: Option<ConverterFactory>,
    converter: Option<Box<dyn BitstreamConverter>>,
    signals: Option<UnboundedReceiver<SessionSignal>>,
    clock: ClockReconciler,
    last_picture_pts: Option<Duration>,
    retry: RetryPolicy,
    cancel: CancelToken,
    control: CodecControl,
    hdr_sent: bool,
    stats: IngestStats,
}

impl VideoSession {
    /// Create a closed session over `pipeline`, gated by `guard`
    pub fn new(
        pipeline: Arc<dyn HardwarePipeline>,
        guard: InstanceGuard,
        config: PipelineConfig,
    ) -> Self {
        let retry = RetryPolicy::paced(config.retry_fallback_interval());
        Self {
            id: Uuid::new_v4(),
            pipeline,
            guard,
            lease: None,
            config,
            state: VideoState::Closed,
            descriptor: None,
            format: None,
            converter_factory: None,
            converter: None,
            signals: None,
            clock: ClockReconciler::new(),
            last_picture_pts: None,
            retry,
            cancel: CancelToken::new(),
            control: CodecControl::NONE,
            hdr_sent: false,
            stats: IngestStats::default(),
        }
    }

    /// Install the factory used for streams that need bitstream conversion
    pub fn set_converter_factory(&mut self, factory: ConverterFactory) {
        self.converter_factory = Some(factory);
    }

    /// Session id used in log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    ///
    /// Takes `&mut self` because it first applies any device callbacks
    /// queued since the last call, which may move the session from
    /// `Flushed` to `Running`.
    pub fn state(&mut self) -> VideoState {
        self.drain_signals();
        self.state
    }

    /// Descriptor of the open stream
    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.descriptor.as_ref()
    }

    /// Ingest counters
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Presentation time of the last frame returned, cleared by reset
    pub fn last_picture_pts(&self) -> Option<Duration> {
        self.last_picture_pts
    }

    /// Handle another thread can use to abandon an in-flight retry.
    ///
    /// `cancel()` on the handle ends one buffer-full wait; the interrupted
    /// [`add_data`](Self::add_data) returns `false` and later feeds retry
    /// normally.
    pub fn interrupt_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Open the hardware pipeline for `descriptor`, rendering into `window_handle`.
    ///
    /// The instance guard is taken first and released again on any failure.
    pub fn open(&mut self, descriptor: StreamDescriptor, window_handle: &str) -> HwPipeResult<()> {
        if self.state != VideoState::Closed {
            return Err(HwPipeError::InvalidState {
                expected: VideoState::Closed.to_string(),
                actual: self.state.to_string(),
            });
        }

        let lease = self.guard.try_acquire()?;

        debug!(
            session = %self.id,
            codec = ?descriptor.codec,
            width = descriptor.width,
            height = descriptor.height,
            fps_rate = descriptor.fps_rate,
            fps_scale = descriptor.fps_scale,
            profile = descriptor.profile,
            level = descriptor.level,
            pts_invalid = descriptor.pts_invalid,
            codec_tag = descriptor.codec_tag,
            extradata = descriptor.extradata.len(),
            "opening video pipeline"
        );

        let format = match self.load(&descriptor, window_handle) {
            Ok(format) => format,
            Err(e) => {
                error!(session = %self.id, error = %e, "video open failed");
                return Err(e);
            }
        };

        self.converter = if descriptor.needs_bitstream_conversion() {
            self.converter_factory
                .as_ref()
                .and_then(|factory| factory(&descriptor))
        } else {
            None
        };

        self.retry = RetryPolicy::paced(
            descriptor
                .frame_duration()
                .unwrap_or_else(|| self.config.retry_fallback_interval()),
        );
        self.lease = Some(lease);
        self.descriptor = Some(descriptor);
        self.state = VideoState::Flushed;
        self.clock = ClockReconciler::new();
        self.last_picture_pts = None;
        self.control = CodecControl::NONE;
        self.hdr_sent = false;
        self.stats = IngestStats::default();
        self.cancel.rearm();

        if let Err(e) = self.set_hdr() {
            warn!(session = %self.id, error = %e, "could not send HDR metadata");
        }

        info!(
            session = %self.id,
            codec = format.codec_name,
            decoder = format.decoder_name,
            converter = self.converter.is_some(),
            "video pipeline opened"
        );
        self.format = Some(format);
        Ok(())
    }

    fn load(
        &mut self,
        descriptor: &StreamDescriptor,
        window_handle: &str,
    ) -> HwPipeResult<ResolvedVideoFormat> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(HwPipeError::InvalidStreamDescriptor {
                reason: format!("null size {}x{}", descriptor.width, descriptor.height),
            });
        }
        if !self.config.video_enabled() {
            return Err(HwPipeError::FeatureDisabled {
                feature: "hardware video".to_string(),
            });
        }
        let format = ResolvedVideoFormat::for_descriptor(descriptor)?;

        self.pipeline.notify_foreground();

        if window_handle.is_empty() {
            warn!(session = %self.id, "no exported window yet, loading without a bound surface");
        }

        let payload = LoadPayload::video(
            &self.config,
            window_handle,
            format.codec_name,
            EsInfo::video(
                descriptor.width,
                descriptor.height,
                descriptor.fps_rate,
                descriptor.fps_scale,
            ),
            format.dolby_vision.clone(),
        );
        let document = LoadCommand::new(payload).to_json()?;
        debug!(session = %self.id, payload = %document, "sending load");

        let (tx, rx) = mpsc::unbounded_channel();
        let callback = CallbackDemux::video(self.id, &self.pipeline, tx).into_callback();
        if !self.pipeline.load(&document, callback) {
            return Err(HwPipeError::DeviceRejected {
                reason: "load refused".to_string(),
            });
        }
        self.signals = Some(rx);

        Ok(format)
    }

    /// Apply state changes posted by the callback thread
    fn drain_signals(&mut self) {
        let Some(signals) = self.signals.as_mut() else {
            return;
        };
        while let Ok(signal) = signals.try_recv() {
            match signal {
                SessionSignal::LoadCompleted if self.state != VideoState::Closed => {
                    trace!(session = %self.id, "load completed, state flushed");
                    self.state = VideoState::Flushed;
                }
                SessionSignal::LoadCompleted => {}
            }
        }
    }

    /// Feed one packet.
    ///
    /// Returns `false` when the device answered with a fatal status, or when
    /// an interrupt abandoned the packet while the ingest buffer was full.
    /// Otherwise a full buffer is retried here, paced by the frame duration.
    pub fn add_data(&mut self, packet: &Packet<'_>) -> bool {
        self.drain_signals();
        if self.state == VideoState::Closed {
            return true;
        }

        let mut converter = self.converter.take();
        let result = self.feed_packet(packet, converter.as_deref_mut());
        self.converter = converter;
        result
    }

    fn feed_packet(
        &mut self,
        packet: &Packet<'_>,
        converter: Option<&mut (dyn BitstreamConverter + 'static)>,
    ) -> bool {
        let pts = match &self.descriptor {
            Some(descriptor) if descriptor.pts_invalid => None,
            _ => packet.pts,
        };

        trace!(
            session = %self.id,
            pts = ?pts,
            dts = ?packet.dts,
            size = packet.data.len(),
            state = %self.state,
            "add data"
        );

        let mut data = packet.data;
        if let Some(converter) = converter {
            if !data.is_empty() {
                if converter.convert(data) {
                    if self.state == VideoState::Flushed && !converter.can_start_decode() {
                        debug!(session = %self.id, "waiting for keyframe");
                        return true;
                    }
                    data = converter.converted();
                } else {
                    warn!(session = %self.id, "bitstream conversion failed, feeding packet as is");
                }
            }
        }

        if self.state == VideoState::Flushed {
            if let Some(pts) = pts {
                let position = pts.as_millis().to_string();
                debug!(session = %self.id, position_ms = %position, "priming device position");
                self.pipeline.seek(&position);
                self.stats.seeks += 1;
            }
            self.state = VideoState::Running;
        }

        if data.is_empty() {
            return true;
        }

        let pts_ns = pts.map(|pts| i64::try_from(pts.as_nanos()).unwrap_or(i64::MAX));
        let document = match FeedCommand::new(data, pts_ns, EsKind::Video).to_json() {
            Ok(document) => document,
            Err(e) => {
                error!(session = %self.id, error = %e, "could not build feed document");
                return false;
            }
        };

        let pipeline = &self.pipeline;
        let outcome = self.retry.submit(&self.cancel, || pipeline.feed(&document));
        self.stats.record(&outcome, data.len());

        match outcome {
            SubmitOutcome::Accepted { retries } => {
                if retries > 0 {
                    debug!(session = %self.id, retries, "packet accepted after buffer full");
                }
                true
            }
            SubmitOutcome::Fatal { status, .. } => {
                warn!(session = %self.id, status = %status, "feed returned error");
                false
            }
            SubmitOutcome::Cancelled { retries } => {
                debug!(session = %self.id, retries, "feed interrupted, packet not taken");
                false
            }
        }
    }

    /// Poll for a new frame
    pub fn get_frame(&mut self) -> FrameEvent {
        self.drain_signals();
        match self.state {
            VideoState::Closed => FrameEvent::Closed,
            VideoState::Flushed => FrameEvent::NotReady,
            VideoState::Running => {
                let playtime = self.pipeline.current_playtime();
                let Some(pts) = self.clock.observe(playtime) else {
                    return FrameEvent::NoNewFrame;
                };
                self.last_picture_pts = Some(pts);
                trace!(session = %self.id, pts = ?pts, "frame");

                let (width, height, stereo_mode) = self
                    .descriptor
                    .as_ref()
                    .map(|d| (d.width, d.height, d.stereo_mode.clone()))
                    .unwrap_or_default();
                FrameEvent::Frame(FrameMarker {
                    pts,
                    dts: None,
                    width,
                    height,
                    display_width: width,
                    display_height: height,
                    stereo_mode,
                })
            }
        }
    }

    /// Flush the device and return to the flushed state
    pub fn reset(&mut self) {
        self.drain_signals();
        debug!(session = %self.id, "reset");
        if self.state == VideoState::Closed {
            return;
        }

        self.pipeline.flush();
        self.state = VideoState::Flushed;
        self.last_picture_pts = None;
        if let Some(converter) = self.converter.as_mut() {
            converter.reset_start_decode();
        }
        self.cancel.rearm();
    }

    /// Accept `descriptor` without reopening if only id or extradata changed
    pub fn reconfigure(&mut self, descriptor: StreamDescriptor) -> bool {
        let compatible = self
            .descriptor
            .as_ref()
            .is_some_and(|current| current.is_compatible_reconfiguration(&descriptor));
        debug!(session = %self.id, compatible, "reconfigure");
        if compatible {
            self.descriptor = Some(descriptor);
        }
        compatible
    }

    /// Send static HDR metadata, once per open.
    ///
    /// Returns `Ok(false)` when already sent or the stream has no mastering
    /// metadata.
    pub fn set_hdr(&mut self) -> HwPipeResult<bool> {
        if self.hdr_sent || self.state == VideoState::Closed {
            return Ok(false);
        }
        let Some(document) = self.descriptor.as_ref().and_then(HdrDocument::from_descriptor)
        else {
            return Ok(false);
        };

        let payload = document.to_json()?;
        debug!(session = %self.id, payload = %payload, "setting hdr data");
        self.hdr_sent = true;
        Ok(self.pipeline.set_hdr_info(&payload))
    }

    /// Apply decoder control flags; entering drain pauses, leaving it plays
    pub fn set_codec_control(&mut self, flags: CodecControl) {
        if flags == self.control {
            return;
        }
        debug!(session = %self.id, from = self.control.bits(), to = flags.bits(), "codec control");

        let draining = self.control.contains(CodecControl::DRAIN);
        if flags.contains(CodecControl::DRAIN) && !draining {
            self.pipeline.pause();
        } else if !flags.contains(CodecControl::DRAIN) && draining {
            self.pipeline.play();
        }
        self.control = flags;
    }

    /// Tell the device no more packets follow
    pub fn signal_end_of_stream(&mut self) {
        if self.state != VideoState::Closed {
            self.pipeline.push_eos();
        }
    }

    /// Reference frames the engine may keep outstanding
    pub fn allowed_references(&self) -> u32 {
        ALLOWED_REFERENCES
    }

    /// Decoder description, once opened
    pub fn decoder_info(&self) -> Option<DecoderInfo> {
        let descriptor = self.descriptor.as_ref()?;
        let format = self.format.as_ref()?;
        Some(DecoderInfo {
            decoder_name: format.decoder_name.to_string(),
            pixel_format: "Surface".to_string(),
            deinterlace_method: "hardware".to_string(),
            width: descriptor.width,
            height: descriptor.height,
            aspect: descriptor.aspect,
            fps: descriptor.fps(),
        })
    }

    /// Unload the pipeline and release the instance guard; idempotent
    pub fn dispose(&mut self) {
        self.cancel.close();
        if self.state == VideoState::Closed && self.lease.is_none() {
            return;
        }

        self.pipeline.unload();
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
        self.state = VideoState::Closed;
        self.signals = None;
        self.converter = None;
        info!(session = %self.id, fed = self.stats.packets_fed, "video pipeline closed");
    }
}

impl Drop for VideoSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for VideoSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("descriptor", &self.descriptor)
            .field("stats", &self.stats)
            .finish()
    }
}
