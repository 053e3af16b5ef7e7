//! # hwpipe media
//!
//! Sessions that drive one exclusive hardware pipeline handle per elementary
//! stream, plus the pieces they are assembled from: the capability registry
//! the player engine consults, stream descriptors and packets, the callback
//! demultiplexer, the HDR metadata translator and the window binding
//! collaborator.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod audio_session;
pub mod callback;
pub mod codecs;
pub mod converter;
pub mod display;
pub mod hdr;
pub mod stream;
pub mod video_session;

// Re-export main types
pub use audio_session::{
    AudioSession, AudioSessionState, PtsAdvance, PtsAdvancePolicy, HARDWARE_LATENCY,
};
pub use callback::{CallbackDemux, SessionSignal};
pub use codecs::{
    AudioDeviceInfo, AudioSinkEntry, CodecRegistry, ResolvedVideoFormat, VideoCodecSpec,
    VideoDecoderEntry, HW_AUDIO_SINK, HW_VIDEO_DECODER,
};
pub use converter::{BitstreamConverter, ConverterFactory, KeyframeGate};
pub use display::{OutputRegionSink, Rect, WindowBinding};
pub use hdr::{HdrDocument, HdrKind, SeiBlock, VuiBlock};
pub use stream::{
    fourcc, AudioFormat, AudioStreamType, ContentLightMetadata, CryptoSession, FrameEvent,
    FrameMarker, HdrType, MasteringMetadata, Packet, SampleFormat, StreamDescriptor,
    TransferCharacteristic, VideoCodecId,
};
pub use video_session::{CodecControl, DecoderInfo, VideoSession, VideoState};
