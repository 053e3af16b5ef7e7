//! Recording hardware pipeline
//!
//! Stands in for the device in tests and demos: every command is recorded,
//! feed responses come from a script, and callback events can be fired from
//! any thread the way the device's event loop would.

use hwpipe_core::{HardwarePipeline, PipelineCallback, PipelineEvent};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// One command received by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    /// Foreground ownership declared
    NotifyForeground,
    /// Load with its document
    Load(String),
    /// Feed with its document
    Feed(String),
    /// Seek with its position string
    Seek(String),
    /// Play
    Play,
    /// Pause
    Pause,
    /// Unload
    Unload,
    /// Flush
    Flush,
    /// End of stream
    PushEos,
    /// HDR metadata document
    SetHdrInfo(String),
}

/// Scripted, recording implementation of [`HardwarePipeline`]
pub struct RecordingPipeline {
    commands: Mutex<Vec<RecordedCommand>>,
    feed_script: Mutex<VecDeque<String>>,
    default_response: Mutex<String>,
    load_accepts: AtomicBool,
    playtime_ns: AtomicI64,
    callback: Mutex<Option<PipelineCallback>>,
}

impl RecordingPipeline {
    /// Pipeline that accepts loads and answers every feed with `"Ok"`
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            feed_script: Mutex::new(VecDeque::new()),
            default_response: Mutex::new("Ok".to_string()),
            load_accepts: AtomicBool::new(true),
            playtime_ns: AtomicI64::new(0),
            callback: Mutex::new(None),
        })
    }

    /// Pipeline whose `load` always fails
    pub fn rejecting_load() -> Arc<Self> {
        let pipeline = Self::new();
        pipeline.load_accepts.store(false, Ordering::Release);
        pipeline
    }

    /// Queue responses for the next feeds; once used up the default applies
    pub fn script_feed_responses<I, S>(&self, responses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feed_script
            .lock()
            .extend(responses.into_iter().map(Into::into));
    }

    /// Response used when the script is empty
    pub fn set_default_feed_response(&self, response: impl Into<String>) {
        *self.default_response.lock() = response.into();
    }

    /// Set the value returned by `current_playtime`
    pub fn set_playtime(&self, playtime_ns: i64) {
        self.playtime_ns.store(playtime_ns, Ordering::Release);
    }

    /// Whether a load registered a callback
    pub fn has_callback(&self) -> bool {
        self.callback.lock().is_some()
    }

    /// Deliver `event` to the registered callback on the calling thread.
    ///
    /// Returns `false` when nothing is registered.
    pub fn fire(&self, event: PipelineEvent) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every command received so far
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().clone()
    }

    /// Number of recorded commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.commands.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Parsed feed documents, in order
    pub fn feeds(&self) -> Vec<Value> {
        self.documents(|c| match c {
            RecordedCommand::Feed(doc) => Some(doc),
            _ => None,
        })
    }

    /// Parsed load documents, in order
    pub fn loads(&self) -> Vec<Value> {
        self.documents(|c| match c {
            RecordedCommand::Load(doc) => Some(doc),
            _ => None,
        })
    }

    /// Parsed HDR documents, in order
    pub fn hdr_documents(&self) -> Vec<Value> {
        self.documents(|c| match c {
            RecordedCommand::SetHdrInfo(doc) => Some(doc),
            _ => None,
        })
    }

    /// Seek positions, in order
    pub fn seeks(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::Seek(position) => Some(position.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded commands
    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    fn documents(&self, select: impl Fn(&RecordedCommand) -> Option<&String>) -> Vec<Value> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| select(c))
            .filter_map(|doc| serde_json::from_str(doc).ok())
            .collect()
    }

    fn record(&self, command: RecordedCommand) {
        trace!(?command, "pipeline command");
        self.commands.lock().push(command);
    }
}

impl HardwarePipeline for RecordingPipeline {
    fn notify_foreground(&self) {
        self.record(RecordedCommand::NotifyForeground);
    }

    fn load(&self, document: &str, callback: PipelineCallback) -> bool {
        self.record(RecordedCommand::Load(document.to_string()));
        if !self.load_accepts.load(Ordering::Acquire) {
            return false;
        }
        *self.callback.lock() = Some(callback);
        true
    }

    fn feed(&self, document: &str) -> String {
        self.record(RecordedCommand::Feed(document.to_string()));
        let scripted = self.feed_script.lock().pop_front();
        scripted.unwrap_or_else(|| self.default_response.lock().clone())
    }

    fn seek(&self, position_ms: &str) -> bool {
        self.record(RecordedCommand::Seek(position_ms.to_string()));
        true
    }

    fn play(&self) -> bool {
        self.record(RecordedCommand::Play);
        true
    }

    fn pause(&self) -> bool {
        self.record(RecordedCommand::Pause);
        true
    }

    fn unload(&self) -> bool {
        self.record(RecordedCommand::Unload);
        self.callback.lock().take();
        true
    }

    fn flush(&self) -> bool {
        self.record(RecordedCommand::Flush);
        true
    }

    fn push_eos(&self) -> bool {
        self.record(RecordedCommand::PushEos);
        true
    }

    fn current_playtime(&self) -> i64 {
        self.playtime_ns.load(Ordering::Acquire)
    }

    fn set_hdr_info(&self, document: &str) -> bool {
        self.record(RecordedCommand::SetHdrInfo(document.to_string()));
        true
    }
}
