//! Textual command documents sent to the hardware pipeline
//!
//! Documents are modelled as serde structs and only turned into JSON text at
//! the [`HardwarePipeline`](crate::pipeline::HardwarePipeline) boundary.

use crate::config::{PipelineConfig, VideoBufferLevels};
use crate::error::HwPipeResult;
use serde::Serialize;

/// Elementary stream kind tag carried by every feed document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsKind {
    /// Video elementary stream
    Video,
    /// Audio elementary stream
    Audio,
}

impl EsKind {
    /// Numeric tag used on the wire
    pub fn wire_value(self) -> u8 {
        match self {
            EsKind::Video => 1,
            EsKind::Audio => 2,
        }
    }
}

/// Load command: a single payload wrapped as `{"args":[payload]}`
#[derive(Debug, Clone, Serialize)]
pub struct LoadCommand {
    args: [LoadPayload; 1],
}

impl LoadCommand {
    /// Wrap a payload
    pub fn new(payload: LoadPayload) -> Self {
        Self { args: [payload] }
    }

    /// The wrapped payload
    pub fn payload(&self) -> &LoadPayload {
        &self.args[0]
    }

    /// Serialize to the JSON text handed to `load`
    pub fn to_json(&self) -> HwPipeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Top level of a Load payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadPayload {
    /// Present (and true) only for audio-only pipelines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_audio_only: Option<bool>,
    /// Always `BUFFERSTREAM`
    pub media_transport_type: String,
    /// Pipeline options
    pub option: LoadOption,
}

/// Options block of a Load payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOption {
    /// Exported compositor window to render into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    /// Ask the pipeline to track its playback position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_position: Option<bool>,
    /// Client application id
    pub app_id: String,
    /// Stream description and buffering thresholds
    pub external_streaming_info: ExternalStreamingInfo,
    /// Transport class
    pub transmission: Transmission,
    /// Whether the pipeline should expect audio
    pub need_audio: bool,
    /// Seek strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek_mode: Option<String>,
    /// Low-delay rendering mode
    pub low_delay_mode: bool,
}

/// Streaming info block
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalStreamingInfo {
    /// What is being streamed
    pub contents: Contents,
    /// Buffer thresholds
    pub buffering_ctr_info: BufferingControl,
}

/// Contents block: codec names, elementary stream info and format
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contents {
    /// Codec names per stream kind
    pub codec: CodecNames,
    /// Elementary stream info
    pub es_info: EsInfo,
    /// Always `RAW`
    pub format: String,
    /// E-AC3 channel/frequency info
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac3_plus_info: Option<Ac3PlusInfo>,
    /// Dolby Vision descriptor
    #[serde(rename = "DolbyHdrInfo", skip_serializing_if = "Option::is_none")]
    pub dolby_hdr_info: Option<DolbyHdrInfo>,
}

/// Codec name per stream kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct CodecNames {
    /// Video codec name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    /// Audio codec name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Elementary stream info
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EsInfo {
    /// Hold each unit until its decode time
    pub pause_at_decode_time: bool,
    /// Presentation timestamps are supplied separately per feed
    #[serde(rename = "seperatedPTS")]
    pub separated_pts: bool,
    /// Initial decode position
    pub pts_to_decode: i64,
    /// Coded width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_width: Option<u32>,
    /// Coded height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_height: Option<u32>,
    /// Frame rate numerator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_fps_value: Option<u32>,
    /// Frame rate denominator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_fps_scale: Option<u32>,
}

impl EsInfo {
    /// Info block for an audio stream
    pub fn audio() -> Self {
        Self {
            pause_at_decode_time: true,
            separated_pts: true,
            pts_to_decode: 0,
            video_width: None,
            video_height: None,
            video_fps_value: None,
            video_fps_scale: None,
        }
    }

    /// Info block for a video stream
    pub fn video(width: u32, height: u32, fps_rate: u32, fps_scale: u32) -> Self {
        Self {
            video_width: Some(width),
            video_height: Some(height),
            video_fps_value: Some(fps_rate),
            video_fps_scale: Some(fps_scale),
            ..Self::audio()
        }
    }
}

/// E-AC3 stream parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ac3PlusInfo {
    /// Channel count
    pub channels: u32,
    /// Sample rate in kHz
    pub frequency: f64,
}

/// Dolby Vision descriptor added for Dolby Vision video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DolbyHdrInfo {
    /// Encryption layers
    pub encryption_type: String,
    /// Dolby Vision profile
    pub profile_id: u32,
    /// Single or dual track
    pub track_type: String,
}

impl Default for DolbyHdrInfo {
    fn default() -> Self {
        Self {
            encryption_type: "clear".to_string(),
            profile_id: 5,
            track_type: "single".to_string(),
        }
    }
}

/// Min/max source buffer level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferLevel {
    /// Lower threshold
    pub minimum: u32,
    /// Upper threshold
    pub maximum: u32,
}

/// Buffering control block
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferingControl {
    /// Bytes to buffer before starting
    pub pre_buffer_byte: u32,
    /// Global minimum level
    pub buffer_min_level: u32,
    /// Global maximum level
    pub buffer_max_level: u32,
    /// Video queue level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q_buffer_level_video: Option<u32>,
    /// Video source buffer thresholds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_buffer_level_video: Option<BufferLevel>,
    /// Audio queue level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q_buffer_level_audio: Option<u32>,
    /// Audio source buffer thresholds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_buffer_level_audio: Option<BufferLevel>,
}

impl BufferingControl {
    fn empty() -> Self {
        Self {
            pre_buffer_byte: 0,
            buffer_min_level: 0,
            buffer_max_level: 0,
            q_buffer_level_video: None,
            src_buffer_level_video: None,
            q_buffer_level_audio: None,
            src_buffer_level_audio: None,
        }
    }

    /// Thresholds for a video pipeline
    pub fn video(levels: &VideoBufferLevels) -> Self {
        Self {
            q_buffer_level_video: Some(levels.queue_level),
            src_buffer_level_video: Some(BufferLevel {
                minimum: levels.source_minimum,
                maximum: levels.source_maximum,
            }),
            ..Self::empty()
        }
    }

    /// Thresholds for an audio pipeline
    pub fn audio(queue_level: u32, source_minimum: u32) -> Self {
        Self {
            q_buffer_level_audio: Some(queue_level),
            src_buffer_level_audio: Some(BufferLevel {
                minimum: source_minimum,
                maximum: queue_level,
            }),
            ..Self::empty()
        }
    }
}

/// Transport class
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transmission {
    /// `LIVE` or `WebRTC`
    pub contents_type: String,
}

impl LoadPayload {
    /// Video Load payload
    pub fn video(
        config: &PipelineConfig,
        window_id: &str,
        codec_name: &str,
        es_info: EsInfo,
        dolby_hdr_info: Option<DolbyHdrInfo>,
    ) -> Self {
        Self {
            is_audio_only: None,
            media_transport_type: "BUFFERSTREAM".to_string(),
            option: LoadOption {
                window_id: Some(window_id.to_string()),
                query_position: Some(true),
                app_id: config.app_id.clone(),
                external_streaming_info: ExternalStreamingInfo {
                    contents: Contents {
                        codec: CodecNames {
                            video: Some(codec_name.to_string()),
                            audio: None,
                        },
                        es_info,
                        format: "RAW".to_string(),
                        ac3_plus_info: None,
                        dolby_hdr_info,
                    },
                    buffering_ctr_info: BufferingControl::video(&config.video_buffer),
                },
                transmission: Transmission {
                    contents_type: config.content_type.clone(),
                },
                need_audio: false,
                seek_mode: Some("late_Iframe".to_string()),
                low_delay_mode: config.low_delay,
            },
        }
    }

    /// Audio-only Load payload
    pub fn audio(
        config: &PipelineConfig,
        codec_name: &str,
        ac3_plus_info: Option<Ac3PlusInfo>,
        buffering: BufferingControl,
    ) -> Self {
        Self {
            is_audio_only: Some(true),
            media_transport_type: "BUFFERSTREAM".to_string(),
            option: LoadOption {
                window_id: None,
                query_position: None,
                app_id: config.app_id.clone(),
                external_streaming_info: ExternalStreamingInfo {
                    contents: Contents {
                        codec: CodecNames {
                            video: None,
                            audio: Some(codec_name.to_string()),
                        },
                        es_info: EsInfo::audio(),
                        format: "RAW".to_string(),
                        ac3_plus_info,
                        dolby_hdr_info: None,
                    },
                    buffering_ctr_info: buffering,
                },
                transmission: Transmission {
                    contents_type: config.content_type.clone(),
                },
                need_audio: true,
                seek_mode: None,
                low_delay_mode: config.low_delay,
            },
        }
    }
}

/// Feed command referencing a caller-owned buffer by address and length.
///
/// The referenced memory must stay valid for the duration of the `feed`
/// call that carries this document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedCommand {
    /// Buffer address formatted as a pointer
    pub buffer_addr: String,
    /// Buffer length in bytes
    pub buffer_size: usize,
    /// Presentation time in nanoseconds; absent when invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pts: Option<i64>,
    /// Stream kind tag
    pub es_data: u8,
}

impl FeedCommand {
    /// Describe `data` for a feed call
    pub fn new(data: &[u8], pts_ns: Option<i64>, kind: EsKind) -> Self {
        Self {
            buffer_addr: format!("{:p}", data.as_ptr()),
            buffer_size: data.len(),
            pts: pts_ns,
            es_data: kind.wire_value(),
        }
    }

    /// Serialize to the JSON text handed to `feed`
    pub fn to_json(&self) -> HwPipeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
