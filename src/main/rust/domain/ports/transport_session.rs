use crate::domain::errors::Result;
use crate::domain::value_objects::{MediaKind, TrackSource};

use super::ControlSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    /// The publisher never consumes remote tracks
    pub auto_subscribe: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            auto_subscribe: false,
        }
    }
}

/// A track published to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    sid: String,
    kind: MediaKind,
    source: TrackSource,
}

impl Publication {
    pub fn new(sid: String, kind: MediaKind, source: TrackSource) -> Self {
        Self { sid, kind, source }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }
}

/// Port for connecting to the real-time transport
pub trait SessionConnector {
    type Session: TransportSession;

    /// Unsolicited disconnects are reported on `events`
    fn join(
        &self,
        endpoint: &str,
        credential: &str,
        options: JoinOptions,
        events: ControlSender,
    ) -> Result<Self::Session>;
}

/// Port for a joined transport session
pub trait TransportSession: Send + Sync {
    type Track;

    fn publish_track(
        &self,
        track: &Self::Track,
        kind: MediaKind,
        source: TrackSource,
    ) -> Result<Publication>;

    /// Unknown sids are ignored
    fn unpublish_track(&self, sid: &str) -> Result<()>;

    /// Idempotent
    fn disconnect(&self);
}
