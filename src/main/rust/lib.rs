pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-exports for convenience
pub use application::services::{check_candidates, PublisherService};
pub use config::Config;
pub use domain::entities::{BridgeLifecycle, StateTransition};
pub use domain::errors::{DomainError, Result};
pub use domain::ports::{
    control_channel, ControlReceiver, ControlSender, EosCallback, JoinOptions, MediaPipeline,
    MetricsReporter, NoopReporter, PipelineFactory, Publication, SampleWriter, SessionConnector,
    SourceBridge, SourceCandidate, TrackFactory, TransportSession, WriteError,
};
pub use domain::value_objects::{
    BridgeState, BusMessage, ControlEvent, MediaKind, MimeEntry, MimeRegistry, PublisherConfig,
    TrackSource,
};
pub use infrastructure::gstreamer::{
    ElementScanner, GStreamerPipeline, GStreamerPipelineFactory, TrackBridge,
};
pub use infrastructure::metrics::{serve_metrics, PrometheusReporter};
pub use infrastructure::webrtc::{LocalTrack, WebRtcTrackFactory, WhipConnector, WhipSession};
