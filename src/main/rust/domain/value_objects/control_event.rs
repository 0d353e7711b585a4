use super::MediaKind;

/// Pipeline bus message, reduced to what the publisher acts on
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    EndOfStream,
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    Warning {
        source: String,
        message: String,
    },
    /// Tag, state-change, latency, async-done, stream-status and element messages
    Informational(&'static str),
    Unrecognized(String),
}

/// Everything that crosses into the publisher from a callback thread
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Bus(BusMessage),
    /// A track's sink reached end-of-stream on its own
    TrackEnded(MediaKind),
    SessionDisconnected(String),
    /// External termination signal, by name
    Signal(String),
}

impl ControlEvent {
    /// Reason recorded for the teardown when this event ends the run
    pub fn stop_reason(&self) -> Option<&'static str> {
        match self {
            Self::Bus(BusMessage::EndOfStream) => Some("pipeline end of stream"),
            Self::Bus(BusMessage::Error { .. }) => Some("pipeline error"),
            Self::Bus(_) | Self::TrackEnded(_) => None,
            Self::SessionDisconnected(_) => Some("session disconnected"),
            Self::Signal(_) => Some("termination signal"),
        }
    }

    pub fn triggers_stop(&self) -> bool {
        self.stop_reason().is_some()
    }
}
