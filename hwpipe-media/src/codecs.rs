//! Capability registry
//!
//! Maps logical codec identifiers to the hardware path that can handle them,
//! so the player engine can discover a hardware decoder or audio sink without
//! hard-coding it. Registration is gated by the pipeline feature flags.

use crate::audio_session::AudioSession;
use crate::stream::{fourcc, AudioStreamType, HdrType, SampleFormat, StreamDescriptor, VideoCodecId};
use crate::video_session::VideoSession;
use hwpipe_core::{
    DolbyHdrInfo, HardwarePipeline, HwPipeError, HwPipeResult, InstanceGuard, PipelineConfig,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registry name of the hardware video decoder
pub const HW_VIDEO_DECODER: &str = "hwpipe_dec";
/// Registry name of the hardware passthrough audio sink
pub const HW_AUDIO_SINK: &str = "hwpipe_sink";

/// Static hardware mapping of one codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCodecSpec {
    /// Codec name placed into the Load document
    pub codec_name: &'static str,
    /// MIME type
    pub mime: &'static str,
    /// Decoder name reported to the player
    pub decoder_name: &'static str,
}

impl VideoCodecId {
    /// Hardware mapping, or `None` when the codec has no hardware path
    pub fn hardware_mapping(self) -> Option<VideoCodecSpec> {
        let (codec_name, mime, decoder_name) = match self {
            VideoCodecId::Mpeg2 => ("MPEG2", "video/mpeg2", "amc-mpeg2"),
            VideoCodecId::Mpeg4 => ("MPEG4", "video/mp4v-es", "amc-mpeg4"),
            VideoCodecId::Vp8 => ("VP8", "video/x-vnd.on2.vp8", "amc-vp8"),
            VideoCodecId::Vp9 => ("VP9", "video/x-vnd.on2.vp9", "amc-vp9"),
            VideoCodecId::Avs | VideoCodecId::Cavs | VideoCodecId::H264 => {
                ("H264", "video/avc", "amc-h264")
            }
            VideoCodecId::Hevc => ("H265", "video/hevc", "amc-hevc"),
            VideoCodecId::Vc1 => ("VC1", "video/wvc1", "amc-vc1"),
            VideoCodecId::Av1 => ("AV1", "video/av01", "amc-av1"),
            VideoCodecId::Theora | VideoCodecId::Mjpeg => return None,
        };
        Some(VideoCodecSpec {
            codec_name,
            mime,
            decoder_name,
        })
    }
}

/// Hardware format chosen for a concrete stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVideoFormat {
    /// Codec name for the Load document
    pub codec_name: &'static str,
    /// Effective MIME type
    pub mime: &'static str,
    /// Effective decoder name
    pub decoder_name: &'static str,
    /// Dolby Vision block, present for Dolby Vision streams
    pub dolby_vision: Option<DolbyHdrInfo>,
}

impl ResolvedVideoFormat {
    /// Resolve the hardware format for `descriptor`, including Dolby Vision detection
    pub fn for_descriptor(descriptor: &StreamDescriptor) -> HwPipeResult<Self> {
        let spec =
            descriptor
                .codec
                .hardware_mapping()
                .ok_or_else(|| HwPipeError::UnsupportedFormat {
                    format: format!("{:?}", descriptor.codec),
                })?;

        let mut resolved = Self {
            codec_name: spec.codec_name,
            mime: spec.mime,
            decoder_name: spec.decoder_name,
            dolby_vision: None,
        };

        if descriptor.codec == VideoCodecId::Hevc {
            let mut dvhe = descriptor.codec_tag == fourcc(b"dvhe");
            let mut dvh1 = descriptor.codec_tag == fourcc(b"dvh1");

            // Dolby Vision side data without a Dolby Vision sample entry
            if !dvhe && !dvh1 && descriptor.hdr_type == HdrType::DolbyVision {
                if descriptor.codec_tag == fourcc(b"hvc1") {
                    dvh1 = true;
                } else {
                    dvhe = true;
                }
            }

            if dvhe || dvh1 {
                resolved.mime = "video/dolby-vision";
                resolved.decoder_name = if dvhe { "amc-dvhe" } else { "amc-dvh1" };
                resolved.dolby_vision = Some(DolbyHdrInfo::default());
                debug!(decoder = resolved.decoder_name, "Dolby Vision stream detected");
            }
        }

        Ok(resolved)
    }
}

/// Constructor for hardware video sessions
pub type CreateVideoSession =
    fn(Arc<dyn HardwarePipeline>, InstanceGuard, PipelineConfig) -> VideoSession;

/// Constructor for hardware audio sessions
pub type CreateAudioSession = fn(Arc<dyn HardwarePipeline>, PipelineConfig) -> AudioSession;

/// Registered hardware video decoder
#[derive(Clone)]
pub struct VideoDecoderEntry {
    /// Registry name
    pub name: String,
    /// Session constructor
    pub create: CreateVideoSession,
}

impl VideoDecoderEntry {
    /// Whether this decoder has a hardware path for `codec`
    pub fn supports(&self, codec: VideoCodecId) -> bool {
        codec.hardware_mapping().is_some()
    }
}

impl fmt::Debug for VideoDecoderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoDecoderEntry")
            .field("name", &self.name)
            .finish()
    }
}

/// Output device advertised by an audio sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioDeviceInfo {
    /// Device name
    pub name: String,
    /// Human-readable name
    pub display_name: String,
    /// Channel layout name
    pub channel_layout: String,
    /// Accepted sample formats
    pub sample_formats: Vec<SampleFormat>,
    /// Accepted compressed stream types
    pub stream_types: Vec<AudioStreamType>,
    /// Accepted sample rates in Hz
    pub sample_rates: Vec<u32>,
}

impl AudioDeviceInfo {
    /// The single passthrough device of the hardware pipeline.
    ///
    /// PCM is not offered: the pipeline's PCM latency is too high.
    pub fn hardware_passthrough() -> Self {
        Self {
            name: "hw-passthrough".to_string(),
            display_name: "Hardware pipeline (Passthrough only)".to_string(),
            channel_layout: "5.1".to_string(),
            sample_formats: vec![SampleFormat::Raw],
            stream_types: vec![AudioStreamType::Ac3],
            sample_rates: vec![48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 8_000],
        }
    }
}

/// Registered hardware audio sink
#[derive(Clone)]
pub struct AudioSinkEntry {
    /// Registry name
    pub name: String,
    /// Session constructor
    pub create: CreateAudioSession,
    /// Device enumeration
    pub enumerate: fn() -> Vec<AudioDeviceInfo>,
}

impl fmt::Debug for AudioSinkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSinkEntry")
            .field("name", &self.name)
            .finish()
    }
}

/// Registry of hardware decoders and sinks
#[derive(Debug, Default)]
pub struct CodecRegistry {
    video: HashMap<String, VideoDecoderEntry>,
    audio: HashMap<String, AudioSinkEntry>,
}

impl CodecRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the hardware entries enabled by `config`.
    ///
    /// The video decoder is registered only when at least one hardware video
    /// flag is set; the passthrough sink is always available.
    pub fn with_defaults(config: &PipelineConfig) -> Self {
        let mut registry = Self::new();

        if config.video_enabled() {
            registry.register_video_decoder(VideoDecoderEntry {
                name: HW_VIDEO_DECODER.to_string(),
                create: VideoSession::new,
            });
        } else {
            debug!("hardware video disabled by configuration, decoder not registered");
        }

        registry.register_audio_sink(AudioSinkEntry {
            name: HW_AUDIO_SINK.to_string(),
            create: AudioSession::new,
            enumerate: || vec![AudioDeviceInfo::hardware_passthrough()],
        });

        registry
    }

    /// Register a video decoder, replacing any entry with the same name
    pub fn register_video_decoder(&mut self, entry: VideoDecoderEntry) {
        self.video.insert(entry.name.clone(), entry);
    }

    /// Register an audio sink, replacing any entry with the same name
    pub fn register_audio_sink(&mut self, entry: AudioSinkEntry) {
        self.audio.insert(entry.name.clone(), entry);
    }

    /// Get a video decoder by name
    pub fn get_video_decoder(&self, name: &str) -> Option<&VideoDecoderEntry> {
        self.video.get(name)
    }

    /// Get an audio sink by name
    pub fn get_audio_sink(&self, name: &str) -> Option<&AudioSinkEntry> {
        self.audio.get(name)
    }

    /// First video decoder with a hardware path for `codec`
    pub fn find_video_decoder(&self, codec: VideoCodecId) -> Option<&VideoDecoderEntry> {
        self.video.values().find(|entry| entry.supports(codec))
    }

    /// Video decoder handling a MIME type
    pub fn get_decoder_by_mime_type(&self, mime_type: &str) -> Option<&VideoDecoderEntry> {
        const ALL: [VideoCodecId; 12] = [
            VideoCodecId::Mpeg2,
            VideoCodecId::Mpeg4,
            VideoCodecId::Vp8,
            VideoCodecId::Vp9,
            VideoCodecId::Avs,
            VideoCodecId::Cavs,
            VideoCodecId::H264,
            VideoCodecId::Hevc,
            VideoCodecId::Vc1,
            VideoCodecId::Av1,
            VideoCodecId::Theora,
            VideoCodecId::Mjpeg,
        ];
        let codec = ALL.into_iter().find(|codec| {
            codec
                .hardware_mapping()
                .is_some_and(|spec| spec.mime == mime_type)
        })?;
        self.find_video_decoder(codec)
    }

    /// List registered decoder and sink names
    pub fn list_codecs(&self) -> Vec<String> {
        self.video.keys().chain(self.audio.keys()).cloned().collect()
    }

    /// Enumerate the devices of every registered audio sink
    pub fn enumerate_audio_devices(&self) -> Vec<AudioDeviceInfo> {
        self.audio.values().flat_map(|entry| (entry.enumerate)()).collect()
    }
}
