use thiserror::Error;

use crate::domain::value_objects::{BridgeState, MediaKind};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("Access token cannot be empty")]
    EmptyCredential,

    #[error("Pipeline description cannot be empty")]
    EmptyPipelineDescription,

    #[error("Unsupported mime type: {0}")]
    UnsupportedMime(String),

    #[error("Pipeline build failed: {0}")]
    PipelineBuildFailed(String),

    #[error("Element discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("No supported elements found. Pipeline needs to include encoded audio or video")]
    NoSource,

    #[error("Pipeline has more than one {0} source")]
    DuplicateSource(MediaKind),

    #[error("Failed to link {0} sink: {1}")]
    LinkFailed(MediaKind, String),

    #[error("Track creation failed: {0}")]
    TrackCreationFailed(String),

    #[error("Failed to join session: {0}")]
    SessionJoinFailed(String),

    #[error("Failed to publish {0} track: {1}")]
    PublishFailed(MediaKind, String),

    #[error("Failed to unpublish track {0}: {1}")]
    UnpublishFailed(String, String),

    #[error("Pipeline start failed: {0}")]
    PipelineStartFailed(String),

    #[error("Publisher cannot start from the {0} state")]
    InvalidTransition(BridgeState),

    #[error("Startup interrupted: {0}")]
    StartupInterrupted(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
