mod bus_watch;
mod element_scanner;
mod gstreamer_pipeline;
mod track_bridge;

pub use bus_watch::{classify, BusWatch};
pub use element_scanner::{CandidateOutput, ElementScanner};
pub use gstreamer_pipeline::{GStreamerPipeline, GStreamerPipelineFactory};
pub use track_bridge::TrackBridge;
