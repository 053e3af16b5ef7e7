//! Static HDR metadata translator
//!
//! Converts mastering display and content light metadata into the document
//! the pipeline consumes once, before playback starts. Chromaticities are
//! expressed in units of 0.00002 and luminance in units of 0.0001 cd/m2
//! (CTA-861.3).

use crate::stream::{StreamDescriptor, TransferCharacteristic};
use hwpipe_core::HwPipeResult;
use serde::Serialize;

const CHROMATICITY_SCALE: f64 = 50_000.0;
const LUMINANCE_SCALE: f64 = 10_000.0;

/// HDR flavour announced to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HdrKind {
    /// PQ transfer
    #[serde(rename = "HDR10")]
    Hdr10,
    /// Hybrid log-gamma transfer
    #[serde(rename = "HLG")]
    Hlg,
    /// Any other transfer
    #[serde(rename = "none")]
    None,
}

impl From<TransferCharacteristic> for HdrKind {
    fn from(transfer: TransferCharacteristic) -> Self {
        match transfer {
            TransferCharacteristic::Smpte2084 => HdrKind::Hdr10,
            TransferCharacteristic::AribStdB67 => HdrKind::Hlg,
            _ => HdrKind::None,
        }
    }
}

/// Mastering display colour volume SEI values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SeiBlock {
    pub display_primaries_x0: u16,
    pub display_primaries_y0: u16,
    pub display_primaries_x1: u16,
    pub display_primaries_y1: u16,
    pub display_primaries_x2: u16,
    pub display_primaries_y2: u16,
    pub white_point_x: u16,
    pub white_point_y: u16,
    pub min_display_mastering_luminance: u32,
    pub max_display_mastering_luminance: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_content_light_level: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pic_average_light_level: Option<u16>,
}

/// Video usability information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VuiBlock {
    /// Transfer characteristic code point
    pub transfer_characteristics: u8,
    /// Colour primaries code point
    pub color_primaries: u8,
    /// Matrix coefficients code point
    pub matrix_coeffs: u8,
    /// Full range flag
    pub video_full_range_flag: bool,
}

/// Document passed to `set_hdr_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HdrDocument {
    /// HDR flavour
    pub hdr_type: HdrKind,
    /// Mastering values
    pub sei: SeiBlock,
    /// Colour description
    pub vui: VuiBlock,
}

fn chromaticity(value: f64) -> u16 {
    // float-to-int `as` saturates, which is the clamp we want
    (value * CHROMATICITY_SCALE + 0.5) as u16
}

fn luminance(value: f64) -> u32 {
    (value * LUMINANCE_SCALE + 0.5) as u32
}

impl HdrDocument {
    /// Build the document; `None` when the stream carries no mastering metadata
    pub fn from_descriptor(descriptor: &StreamDescriptor) -> Option<Self> {
        let mastering = descriptor.mastering.as_ref()?;
        let [p0, p1, p2] = mastering.display_primaries;
        let light = descriptor.content_light;

        Some(Self {
            hdr_type: HdrKind::from(descriptor.transfer),
            sei: SeiBlock {
                display_primaries_x0: chromaticity(p0.0),
                display_primaries_y0: chromaticity(p0.1),
                display_primaries_x1: chromaticity(p1.0),
                display_primaries_y1: chromaticity(p1.1),
                display_primaries_x2: chromaticity(p2.0),
                display_primaries_y2: chromaticity(p2.1),
                white_point_x: chromaticity(mastering.white_point.0),
                white_point_y: chromaticity(mastering.white_point.1),
                min_display_mastering_luminance: luminance(mastering.min_luminance),
                max_display_mastering_luminance: luminance(mastering.max_luminance),
                max_content_light_level: light.map(|l| l.max_cll),
                max_pic_average_light_level: light.map(|l| l.max_fall),
            },
            vui: VuiBlock {
                transfer_characteristics: descriptor.transfer.code(),
                color_primaries: descriptor.color_primaries,
                matrix_coeffs: descriptor.matrix_coefficients,
                video_full_range_flag: descriptor.full_range,
            },
        })
    }

    /// Serialize to the JSON text handed to `set_hdr_info`
    pub fn to_json(&self) -> HwPipeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
