//! Pipeline configuration and defaults

use crate::error::{HwPipeError, HwPipeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Buffer thresholds placed into the video Load document (bytes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoBufferLevels {
    /// Queue level after which the video feed blocks
    pub queue_level: u32,
    /// Minimum source buffer level
    pub source_minimum: u32,
    /// Maximum source buffer level
    pub source_maximum: u32,
}

impl Default for VideoBufferLevels {
    fn default() -> Self {
        Self {
            queue_level: 1_048_576,
            source_minimum: 1_048_576,
            source_maximum: 8_388_608,
        }
    }
}

/// Settings consumed by the pipeline sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hardware video decode enabled
    pub use_hw_video: bool,
    /// Hardware compositor surface mode enabled
    pub use_hw_surface: bool,
    /// Application id reported to the pipeline
    pub app_id: String,
    /// Ask the pipeline for its low-delay mode
    pub low_delay: bool,
    /// Transmission contents type ("LIVE" or "WebRTC")
    pub content_type: String,
    /// Video buffer thresholds
    pub video_buffer: VideoBufferLevels,
    /// Audio queue size as a multiple of the frame count
    pub audio_buffer_frames_multiplier: u32,
    /// Retry interval used when a stream has no usable frame rate
    pub retry_fallback_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_hw_video: true,
            use_hw_surface: false,
            app_id: "org.hwpipe.player".to_string(),
            low_delay: true,
            content_type: "LIVE".to_string(),
            video_buffer: VideoBufferLevels::default(),
            audio_buffer_frames_multiplier: 8,
            retry_fallback_interval_ms: 20,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration document; missing keys take defaults
    pub fn from_json_str(json: &str) -> HwPipeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> HwPipeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Whether any hardware video path is enabled
    pub fn video_enabled(&self) -> bool {
        self.use_hw_video || self.use_hw_surface
    }

    /// Retry interval for streams without a frame rate
    pub fn retry_fallback_interval(&self) -> Duration {
        Duration::from_millis(self.retry_fallback_interval_ms)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> HwPipeResult<()> {
        if self.video_buffer.source_minimum > self.video_buffer.source_maximum {
            return Err(HwPipeError::Configuration {
                reason: format!(
                    "video source buffer minimum {} exceeds maximum {}",
                    self.video_buffer.source_minimum, self.video_buffer.source_maximum
                ),
            });
        }
        if self.audio_buffer_frames_multiplier == 0 {
            return Err(HwPipeError::Configuration {
                reason: "audio buffer multiplier must be non-zero".to_string(),
            });
        }
        if self.retry_fallback_interval_ms == 0 {
            return Err(HwPipeError::Configuration {
                reason: "retry fallback interval must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
