//! Feed response classification
//!
//! The device answers a feed with free-form text. All substring matching on
//! that text lives here so sessions only ever see a [`FeedStatus`].

const BUFFER_FULL_MARKER: &str = "BufferFull";
const OK_MARKER: &str = "Ok";

/// Classified reply to a feed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// Data accepted
    Ok,
    /// Ingest buffer full; resubmit the identical payload later
    BufferFull,
    /// Anything else, kept verbatim for logging
    Fatal(String),
}

impl FeedStatus {
    /// Classify a raw response string.
    ///
    /// `BufferFull` is checked before `Ok` so a response mentioning both is
    /// never mistaken for acceptance. Unmatched text is fatal.
    pub fn parse(response: &str) -> Self {
        if response.contains(BUFFER_FULL_MARKER) {
            FeedStatus::BufferFull
        } else if response.contains(OK_MARKER) {
            FeedStatus::Ok
        } else {
            FeedStatus::Fatal(response.to_string())
        }
    }

    /// True for accepted data
    pub fn is_ok(&self) -> bool {
        matches!(self, FeedStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_markers() {
        assert_eq!(FeedStatus::parse("Ok"), FeedStatus::Ok);
        assert_eq!(FeedStatus::parse("BufferFull"), FeedStatus::BufferFull);
    }

    #[test]
    fn test_parse_embedded_markers() {
        assert_eq!(
            FeedStatus::parse(r#"{"returnValue":true,"status":"Ok"}"#),
            FeedStatus::Ok
        );
        assert_eq!(
            FeedStatus::parse(r#"{"returnValue":false,"status":"BufferFull"}"#),
            FeedStatus::BufferFull
        );
    }

    #[test]
    fn test_buffer_full_wins_over_ok() {
        assert_eq!(FeedStatus::parse("Ok;BufferFull"), FeedStatus::BufferFull);
    }

    #[test]
    fn test_unknown_is_fatal_and_verbatim() {
        let status = FeedStatus::parse("NotActivated");
        assert_eq!(status, FeedStatus::Fatal("NotActivated".to_string()));
        assert!(!status.is_ok());
        assert_eq!(FeedStatus::parse(""), FeedStatus::Fatal(String::new()));
    }
}
