//! Error types for hardware pipeline sessions

use thiserror::Error;

/// Main error type for hardware pipeline operations
#[derive(Error, Debug)]
pub enum HwPipeError {
    /// Stream descriptor is malformed and can never be opened
    #[error("Invalid stream descriptor: {reason}")]
    InvalidStreamDescriptor {
        /// Why the descriptor was rejected
        reason: String,
    },

    /// Codec or profile has no hardware mapping
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// Format description
        format: String,
    },

    /// Hardware path is switched off by configuration
    #[error("Hardware feature disabled: {feature}")]
    FeatureDisabled {
        /// Name of the disabled feature
        feature: String,
    },

    /// The singular hardware resource is owned by another session
    #[error("Device busy: {resource}")]
    DeviceBusy {
        /// Resource that is already in use
        resource: String,
    },

    /// The hardware pipeline refused the request
    #[error("Device rejected request: {reason}")]
    DeviceRejected {
        /// Reason reported for the rejection
        reason: String,
    },

    /// The hardware reported an ingest error that is not a full buffer
    #[error("Fatal ingest response: {status}")]
    IngestFatal {
        /// Verbatim status string returned by the device
        status: String,
    },

    /// Operation issued in the wrong lifecycle state
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Reason for the configuration error
        reason: String,
    },

    /// Command document could not be serialized or parsed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for hardware pipeline operations
pub type HwPipeResult<T> = Result<T, HwPipeError>;

impl HwPipeError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            HwPipeError::InvalidStreamDescriptor { .. } => "INVALID_STREAM_DESCRIPTOR",
            HwPipeError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            HwPipeError::FeatureDisabled { .. } => "FEATURE_DISABLED",
            HwPipeError::DeviceBusy { .. } => "DEVICE_BUSY",
            HwPipeError::DeviceRejected { .. } => "DEVICE_REJECTED",
            HwPipeError::IngestFatal { .. } => "INGEST_FATAL",
            HwPipeError::InvalidState { .. } => "INVALID_STATE",
            HwPipeError::Configuration { .. } => "CONFIGURATION_ERROR",
            HwPipeError::Serialization(_) => "SERIALIZATION_ERROR",
            HwPipeError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the caller may retry the same request later.
    ///
    /// Only exclusivity conflicts clear up on their own; everything else needs
    /// a different descriptor, a fresh session or a configuration change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HwPipeError::DeviceBusy { .. })
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            HwPipeError::InvalidStreamDescriptor { .. } => ErrorCategory::Input,
            HwPipeError::UnsupportedFormat { .. } => ErrorCategory::Format,
            HwPipeError::FeatureDisabled { .. } => ErrorCategory::Format,
            HwPipeError::DeviceBusy { .. } => ErrorCategory::Device,
            HwPipeError::DeviceRejected { .. } => ErrorCategory::Device,
            HwPipeError::IngestFatal { .. } => ErrorCategory::Ingest,
            HwPipeError::InvalidState { .. } => ErrorCategory::State,
            HwPipeError::Configuration { .. } => ErrorCategory::System,
            HwPipeError::Serialization(_) => ErrorCategory::System,
            HwPipeError::Io(_) => ErrorCategory::System,
        }
    }

    pub(crate) fn busy(resource: &str) -> Self {
        HwPipeError::DeviceBusy {
            resource: resource.to_string(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed caller input
    Input,
    /// Codec/profile or feature gating
    Format,
    /// Hardware ownership or refusal
    Device,
    /// Errors while feeding data
    Ingest,
    /// Lifecycle misuse
    State,
    /// Configuration, serialization and I/O
    System,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_busy_is_retryable() {
        assert!(HwPipeError::busy("video").is_retryable());

        let rejected = HwPipeError::DeviceRejected {
            reason: "load refused".to_string(),
        };
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.category(), ErrorCategory::Device);
        assert_eq!(rejected.error_code(), "DEVICE_REJECTED");
    }

    #[test]
    fn test_error_display() {
        let error = HwPipeError::IngestFatal {
            status: "DecoderError".to_string(),
        };
        assert_eq!(error.to_string(), "Fatal ingest response: DecoderError");
    }

    #[test]
    fn test_error_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = HwPipeError::from(parse);

        match error {
            HwPipeError::Serialization(_) => (),
            _ => panic!("Expected Serialization error variant"),
        }
        assert_eq!(error.category(), ErrorCategory::System);
    }
}
