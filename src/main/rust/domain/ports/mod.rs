mod control_channel;
mod media_pipeline;
mod metrics_reporter;
mod sample_writer;
mod transport_session;

pub use control_channel::{control_channel, ControlReceiver, ControlSender};
pub use media_pipeline::{EosCallback, MediaPipeline, PipelineFactory, SourceBridge, SourceCandidate};
pub use metrics_reporter::{MetricsReporter, NoopReporter};
pub use sample_writer::{SampleWriter, TrackFactory, WriteError};
pub use transport_session::{JoinOptions, Publication, SessionConnector, TransportSession};
