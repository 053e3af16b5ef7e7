//! Serialisable session reports

use crate::recording::{RecordedCommand, RecordingPipeline};
use hwpipe_core::{HwPipeResult, IngestStats};
use serde::Serialize;
use uuid::Uuid;

/// Command counts seen by a recording pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandSummary {
    /// Load commands
    pub loads: usize,
    /// Feed commands, resubmissions included
    pub feeds: usize,
    /// Seek commands
    pub seeks: usize,
    /// Flush commands
    pub flushes: usize,
    /// Play commands
    pub plays: usize,
    /// Pause commands
    pub pauses: usize,
    /// Unload commands
    pub unloads: usize,
}

impl CommandSummary {
    /// Count the commands recorded by `pipeline`
    pub fn from_recording(pipeline: &RecordingPipeline) -> Self {
        let mut summary = Self::default();
        for command in pipeline.commands() {
            match command {
                RecordedCommand::Load(_) => summary.loads += 1,
                RecordedCommand::Feed(_) => summary.feeds += 1,
                RecordedCommand::Seek(_) => summary.seeks += 1,
                RecordedCommand::Flush => summary.flushes += 1,
                RecordedCommand::Play => summary.plays += 1,
                RecordedCommand::Pause => summary.pauses += 1,
                RecordedCommand::Unload => summary.unloads += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Snapshot of one session for logs or bug reports
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Session id
    pub session_id: Uuid,
    /// Elementary stream kind
    pub stream: String,
    /// Lifecycle state at capture time
    pub state: String,
    /// Ingest counters
    pub stats: IngestStats,
    /// Device-side command counts, when captured from a recording pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<CommandSummary>,
}

impl SessionReport {
    /// Capture a report
    pub fn new(
        session_id: Uuid,
        stream: &str,
        state: impl ToString,
        stats: &IngestStats,
    ) -> Self {
        Self {
            session_id,
            stream: stream.to_string(),
            state: state.to_string(),
            stats: stats.clone(),
            commands: None,
        }
    }

    /// Attach command counts
    pub fn with_commands(mut self, commands: CommandSummary) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Pretty JSON rendering
    pub fn to_json_pretty(&self) -> HwPipeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwpipe_core::HardwarePipeline;

    #[test]
    fn test_report_json() {
        let pipeline = RecordingPipeline::new();
        pipeline.feed("{}");
        pipeline.feed("{}");
        pipeline.flush();

        let stats = IngestStats {
            packets_fed: 2,
            bytes_fed: 512,
            ..IngestStats::default()
        };
        let report = SessionReport::new(Uuid::nil(), "video", "running", &stats)
            .with_commands(CommandSummary::from_recording(&pipeline));
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["stream"], "video");
        assert_eq!(json["stats"]["bytes_fed"], 512);
        assert_eq!(json["commands"]["feeds"], 2);
        assert_eq!(json["commands"]["flushes"], 1);
    }
}
