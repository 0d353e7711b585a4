use crate::domain::errors::Result;
use crate::domain::value_objects::{MediaKind, MimeEntry};

use super::ControlSender;

/// Invoked once when a bridge's source reaches end-of-stream
pub type EosCallback = Box<dyn Fn() + Send + Sync>;

/// An unlinked pipeline output carrying a supported encoding
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCandidate {
    element_name: String,
    pad_name: String,
    entry: &'static MimeEntry,
}

impl SourceCandidate {
    pub fn new(element_name: String, pad_name: String, entry: &'static MimeEntry) -> Self {
        Self {
            element_name,
            pad_name,
            entry,
        }
    }

    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn pad_name(&self) -> &str {
        &self.pad_name
    }

    pub fn entry(&self) -> &'static MimeEntry {
        self.entry
    }

    pub fn kind(&self) -> MediaKind {
        self.entry.kind()
    }
}

/// Port for a per-kind bridge between a pipeline sink and a network track
pub trait SourceBridge: Send + Sync {
    type Track;

    fn kind(&self) -> MediaKind;

    fn entry(&self) -> &'static MimeEntry;

    fn track(&self) -> &Self::Track;

    /// Replaces the end-of-stream callback
    fn set_on_eos(&self, callback: EosCallback);

    /// Idempotent; the callback runs only on the first call
    fn handle_eos(&self);

    fn is_ended(&self) -> bool;
}

/// Port for the media pipeline the publisher pulls encoded samples from
pub trait MediaPipeline: Send {
    type Bridge: SourceBridge;

    /// Finds unlinked outputs whose declared format is supported
    fn discover(&self) -> Result<Vec<SourceCandidate>>;

    /// Builds a bridge for the candidate and links it into the graph
    fn attach(&mut self, candidate: &SourceCandidate) -> Result<Self::Bridge>;

    fn start(&mut self) -> Result<()>;

    /// Sets the pipeline inactive; safe to call more than once
    fn shutdown(&mut self);
}

/// Port for assembling a pipeline from its textual description
pub trait PipelineFactory {
    type Pipeline: MediaPipeline;

    /// Bus messages of the built pipeline are delivered to `events`
    fn build(&self, description: &str, events: ControlSender) -> Result<Self::Pipeline>;
}
