//! Stream descriptors, packets and frame events

use serde::Serialize;
use std::time::Duration;

/// Build a little-endian four character code, as found in container codec tags
pub const fn fourcc(tag: &[u8; 4]) -> u32 {
    (tag[0] as u32) | ((tag[1] as u32) << 8) | ((tag[2] as u32) << 16) | ((tag[3] as u32) << 24)
}

/// Logical video codec identifiers known to the player engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VideoCodecId {
    /// MPEG-2 video
    Mpeg2,
    /// MPEG-4 part 2
    Mpeg4,
    /// VP8
    Vp8,
    /// VP9
    Vp9,
    /// AVS
    Avs,
    /// Chinese AVS
    Cavs,
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    Hevc,
    /// VC-1
    Vc1,
    /// AV1
    Av1,
    /// Theora (no hardware path)
    Theora,
    /// Motion JPEG (no hardware path)
    Mjpeg,
}

/// Dynamic range signalled by the container or side data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum HdrType {
    /// Standard dynamic range
    #[default]
    None,
    /// HDR10 (PQ)
    Hdr10,
    /// Hybrid log-gamma
    Hlg,
    /// Dolby Vision side data present
    DolbyVision,
}

/// Colour transfer characteristic (ISO/IEC 23091-2 code points)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TransferCharacteristic {
    /// Not specified
    #[default]
    Unspecified,
    /// BT.709
    Bt709,
    /// SMPTE ST 2084 (PQ)
    Smpte2084,
    /// ARIB STD-B67 (HLG)
    AribStdB67,
    /// Any other code point
    Other(u8),
}

impl TransferCharacteristic {
    /// Numeric code point
    pub fn code(self) -> u8 {
        match self {
            TransferCharacteristic::Bt709 => 1,
            TransferCharacteristic::Unspecified => 2,
            TransferCharacteristic::Smpte2084 => 16,
            TransferCharacteristic::AribStdB67 => 18,
            TransferCharacteristic::Other(code) => code,
        }
    }
}

/// Mastering display colour volume; chromaticities and luminance as plain ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MasteringMetadata {
    /// (x, y) for the three display primaries
    pub display_primaries: [(f64, f64); 3],
    /// (x, y) of the white point
    pub white_point: (f64, f64),
    /// Minimum luminance in cd/m2
    pub min_luminance: f64,
    /// Maximum luminance in cd/m2
    pub max_luminance: f64,
}

impl MasteringMetadata {
    fn to_bits(self) -> [u64; 10] {
        let [(rx, ry), (gx, gy), (bx, by)] = self.display_primaries;
        let (wx, wy) = self.white_point;
        [rx, ry, gx, gy, bx, by, wx, wy, self.min_luminance, self.max_luminance].map(f64::to_bits)
    }
}

/// Content light level information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentLightMetadata {
    /// Maximum content light level
    pub max_cll: u16,
    /// Maximum frame-average light level
    pub max_fall: u16,
}

/// Opaque handle of a content decryption session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CryptoSession {
    /// Key system name
    pub key_system: String,
    /// Session identifier
    pub session_id: Vec<u8>,
}

/// Video stream hints handed over by the player engine.
///
/// Treated as immutable once a session is opened; see
/// [`StreamDescriptor::is_compatible_reconfiguration`] for the one allowed
/// change path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamDescriptor {
    /// Demuxer stream id
    pub id: i32,
    /// Codec identity
    pub codec: VideoCodecId,
    /// Container codec tag
    pub codec_tag: u32,
    /// Coded width
    pub width: u32,
    /// Coded height
    pub height: u32,
    /// Frame rate numerator
    pub fps_rate: u32,
    /// Frame rate denominator
    pub fps_scale: u32,
    /// Display aspect ratio
    pub aspect: f64,
    /// Codec profile
    pub profile: i32,
    /// Codec level
    pub level: i32,
    /// Stereo layout name
    pub stereo_mode: String,
    /// Dynamic range type
    pub hdr_type: HdrType,
    /// Transfer characteristic
    pub transfer: TransferCharacteristic,
    /// Colour primaries code point
    pub color_primaries: u8,
    /// Matrix coefficients code point
    pub matrix_coefficients: u8,
    /// Full (JPEG) range
    pub full_range: bool,
    /// Mastering display metadata
    pub mastering: Option<MasteringMetadata>,
    /// Content light level metadata
    pub content_light: Option<ContentLightMetadata>,
    /// Codec private data
    pub extradata: Vec<u8>,
    /// Decryption session, if the stream is protected
    pub crypto_session: Option<CryptoSession>,
    /// Container timestamps are unusable; the hardware must infer ordering
    pub pts_invalid: bool,
}

impl StreamDescriptor {
    /// Descriptor with the given codec and dimensions and neutral defaults
    pub fn video(codec: VideoCodecId, width: u32, height: u32) -> Self {
        Self {
            id: 0,
            codec,
            codec_tag: 0,
            width,
            height,
            fps_rate: 0,
            fps_scale: 0,
            aspect: 0.0,
            profile: 0,
            level: 0,
            stereo_mode: String::new(),
            hdr_type: HdrType::None,
            transfer: TransferCharacteristic::Unspecified,
            color_primaries: 2,
            matrix_coefficients: 2,
            full_range: false,
            mastering: None,
            content_light: None,
            extradata: Vec::new(),
            crypto_session: None,
            pts_invalid: false,
        }
    }

    /// Set the frame rate as a rational
    pub fn with_fps(mut self, rate: u32, scale: u32) -> Self {
        self.fps_rate = rate;
        self.fps_scale = scale;
        self
    }

    /// Set codec private data
    pub fn with_extradata(mut self, extradata: impl Into<Vec<u8>>) -> Self {
        self.extradata = extradata.into();
        self
    }

    /// Set the container codec tag
    pub fn with_codec_tag(mut self, tag: u32) -> Self {
        self.codec_tag = tag;
        self
    }

    /// Attach HDR signalling
    pub fn with_hdr(
        mut self,
        hdr_type: HdrType,
        transfer: TransferCharacteristic,
        mastering: Option<MasteringMetadata>,
        content_light: Option<ContentLightMetadata>,
    ) -> Self {
        self.hdr_type = hdr_type;
        self.transfer = transfer;
        self.mastering = mastering;
        self.content_light = content_light;
        self
    }

    /// Duration of one frame, if the frame rate is usable
    pub fn frame_duration(&self) -> Option<Duration> {
        if self.fps_rate == 0 || self.fps_scale == 0 {
            return None;
        }
        let nanos = 1_000_000_000u64 * u64::from(self.fps_scale) / u64::from(self.fps_rate);
        Some(Duration::from_nanos(nanos))
    }

    /// Frames per second, zero when unknown
    pub fn fps(&self) -> f64 {
        if self.fps_scale == 0 {
            0.0
        } else {
            f64::from(self.fps_rate) / f64::from(self.fps_scale)
        }
    }

    /// Whether packets must pass through a bitstream converter before feeding.
    ///
    /// H.264 family and HEVC streams carrying codec private data are stored
    /// in length-prefixed form and must be rewritten to start-code form,
    /// unless the stream is protected.
    pub fn needs_bitstream_conversion(&self) -> bool {
        matches!(
            self.codec,
            VideoCodecId::H264 | VideoCodecId::Avs | VideoCodecId::Cavs | VideoCodecId::Hevc
        ) && !self.extradata.is_empty()
            && self.crypto_session.is_none()
    }

    /// True when `other` differs from `self` only in stream id and extradata.
    ///
    /// Floating-point fields compare by bit pattern, so NaN matches NaN.
    pub fn is_compatible_reconfiguration(&self, other: &StreamDescriptor) -> bool {
        self.aspect.to_bits() == other.aspect.to_bits()
            && self.mastering.map(|m| m.to_bits()) == other.mastering.map(|m| m.to_bits())
            && self.identity_stripped() == other.identity_stripped()
    }

    fn identity_stripped(&self) -> StreamDescriptor {
        StreamDescriptor {
            id: 0,
            extradata: Vec::new(),
            aspect: 0.0,
            mastering: None,
            ..self.clone()
        }
    }
}

/// One demuxed unit, borrowed for the duration of a single feed call
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    /// Compressed payload
    pub data: &'a [u8],
    /// Decode timestamp
    pub dts: Option<Duration>,
    /// Presentation timestamp; `None` means invalid
    pub pts: Option<Duration>,
}

impl<'a> Packet<'a> {
    /// Packet without timestamps
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            dts: None,
            pts: None,
        }
    }

    /// Set the presentation timestamp
    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Set the decode timestamp
    pub fn with_dts(mut self, dts: Duration) -> Self {
        self.dts = Some(dts);
        self
    }
}

/// Marker for a frame composited on the hardware side; carries no pixels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameMarker {
    /// Presentation time derived from the device playtime
    pub pts: Duration,
    /// Always absent for hardware frames
    pub dts: Option<Duration>,
    /// Coded width
    pub width: u32,
    /// Coded height
    pub height: u32,
    /// Display width
    pub display_width: u32,
    /// Display height
    pub display_height: u32,
    /// Stereo layout
    pub stereo_mode: String,
}

/// Result of polling a video session for output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Session not open
    Closed,
    /// Flushed; more input is needed before anything can be shown
    NotReady,
    /// Device clock did not move since the last poll
    NoNewFrame,
    /// A new frame is on screen
    Frame(FrameMarker),
}

/// Audio sample layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleFormat {
    /// Compressed bitstream passthrough
    Raw,
    /// Interleaved signed 16 bit PCM
    S16,
    /// Interleaved 32 bit float PCM
    F32,
}

/// Compressed audio stream family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioStreamType {
    /// Dolby Digital
    Ac3,
    /// Dolby Digital Plus
    Eac3,
    /// Dolby TrueHD
    TrueHd,
    /// DTS core
    Dts,
}

/// Audio format requested by the engine and negotiated by the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioFormat {
    /// Sample layout
    pub sample_format: SampleFormat,
    /// Compressed stream type for raw passthrough
    pub stream_type: Option<AudioStreamType>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u32,
    /// Samples per compressed frame; zero when unknown
    pub ac3_frame_size: u32,
    /// Frames per AddPackets call (negotiated)
    pub frames: u32,
    /// Bytes per frame (negotiated)
    pub frame_size: u32,
}

impl AudioFormat {
    /// Raw passthrough format for a compressed stream
    pub fn passthrough(stream_type: AudioStreamType, sample_rate: u32, channels: u32) -> Self {
        Self {
            sample_format: SampleFormat::Raw,
            stream_type: Some(stream_type),
            sample_rate,
            channels,
            ac3_frame_size: 0,
            frames: 0,
            frame_size: 0,
        }
    }

    /// PCM format
    pub fn pcm(sample_format: SampleFormat, sample_rate: u32, channels: u32) -> Self {
        Self {
            sample_format,
            stream_type: None,
            sample_rate,
            channels,
            ac3_frame_size: 0,
            frames: 0,
            frame_size: 0,
        }
    }

    /// Set the samples per compressed frame
    pub fn with_frame_size(mut self, ac3_frame_size: u32) -> Self {
        self.ac3_frame_size = ac3_frame_size;
        self
    }

    /// Playback duration of one compressed frame
    pub fn unit_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos =
            1_000_000_000u64 * u64::from(self.ac3_frame_size) / u64::from(self.sample_rate);
        Duration::from_nanos(nanos)
    }
}
