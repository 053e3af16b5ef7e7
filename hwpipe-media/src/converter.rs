//! Bitstream conversion seam
//!
//! Container-specific rewriting (length-prefixed NAL units to start codes)
//! happens outside this crate. Sessions only see the [`BitstreamConverter`]
//! trait: convert a packet, hand out the converted bytes, and report whether
//! decoding may start yet.

use crate::stream::{StreamDescriptor, VideoCodecId};

/// Packet rewriter installed on a video session
pub trait BitstreamConverter: Send {
    /// Convert one packet; `false` means the packet could not be converted
    fn convert(&mut self, data: &[u8]) -> bool;

    /// Output of the last successful [`convert`](Self::convert)
    fn converted(&self) -> &[u8];

    /// Whether a decodable start point (keyframe) has been seen
    fn can_start_decode(&self) -> bool;

    /// Forget the start point; called on flush
    fn reset_start_decode(&mut self);
}

/// Creates a converter for a stream that needs conversion
pub type ConverterFactory =
    Box<dyn Fn(&StreamDescriptor) -> Option<Box<dyn BitstreamConverter>> + Send + Sync>;

/// Start-code pass-through that holds decoding until a random access point.
///
/// Input is expected in Annex-B form already; the gate copies it unchanged
/// and watches NAL unit types for an H.264 IDR or an HEVC IRAP picture.
#[derive(Debug, Clone)]
pub struct KeyframeGate {
    hevc: bool,
    started: bool,
    output: Vec<u8>,
}

impl KeyframeGate {
    /// Gate for the codec of `descriptor`; `None` for codecs without NAL units
    pub fn for_descriptor(descriptor: &StreamDescriptor) -> Option<Self> {
        let hevc = match descriptor.codec {
            VideoCodecId::H264 | VideoCodecId::Avs | VideoCodecId::Cavs => false,
            VideoCodecId::Hevc => true,
            _ => return None,
        };
        Some(Self {
            hevc,
            started: false,
            output: Vec::new(),
        })
    }

    /// Factory installing a gate on every session that needs conversion
    pub fn factory() -> ConverterFactory {
        Box::new(|descriptor| {
            KeyframeGate::for_descriptor(descriptor)
                .map(|gate| Box::new(gate) as Box<dyn BitstreamConverter>)
        })
    }

    fn is_random_access(&self, header: u8) -> bool {
        if self.hevc {
            // IRAP pictures: BLA, IDR and CRA
            (16..=21).contains(&((header >> 1) & 0x3f))
        } else {
            header & 0x1f == 5
        }
    }
}

/// Iterate the first header byte of every NAL unit in an Annex-B buffer
fn nal_headers(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    data.windows(4).filter_map(|w| match w {
        [0, 0, 1, header] => Some(*header),
        _ => None,
    })
}

impl BitstreamConverter for KeyframeGate {
    fn convert(&mut self, data: &[u8]) -> bool {
        if !self.started {
            self.started = nal_headers(data).any(|header| self.is_random_access(header));
        }
        self.output.clear();
        self.output.extend_from_slice(data);
        true
    }

    fn converted(&self) -> &[u8] {
        &self.output
    }

    fn can_start_decode(&self) -> bool {
        self.started
    }

    fn reset_start_decode(&mut self) {
        self.started = false;
    }
}
