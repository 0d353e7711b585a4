use std::fmt;

/// Publisher lifecycle states, ordered from first to last
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BridgeState {
    /// Nothing built yet
    Idle,
    /// Building the pipeline and attaching sinks
    Initializing,
    /// Connecting to the transport session
    Joining,
    /// Publishing tracks to the session
    Publishing,
    /// Pipeline playing, samples flowing
    Running,
    /// Teardown in progress
    Stopping,
    /// Terminal
    Stopped,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Initializing => write!(f, "INITIALIZING"),
            Self::Joining => write!(f, "JOINING"),
            Self::Publishing => write!(f, "PUBLISHING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopping => write!(f, "STOPPING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl BridgeState {
    /// Convert state to numeric value for metrics
    pub fn as_metric(&self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Initializing => 1.0,
            Self::Joining => 2.0,
            Self::Publishing => 3.0,
            Self::Running => 4.0,
            Self::Stopping => 5.0,
            Self::Stopped => 6.0,
        }
    }

    /// Transitions only move forward; Stopping is reachable from any live state
    pub fn can_transition_to(&self, next: BridgeState) -> bool {
        match (self, next) {
            (Self::Stopped, _) => false,
            (Self::Stopping, Self::Stopped) => true,
            (Self::Stopping, _) => false,
            (_, Self::Stopping) => true,
            (current, next) => next as u8 == *current as u8 + 1,
        }
    }
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::Idle
    }
}
