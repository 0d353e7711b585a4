use std::time::Duration;

use thiserror::Error;

use crate::domain::errors::Result;
use crate::domain::value_objects::MimeEntry;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WriteError {
    #[error("track reached end of stream")]
    EndOfStream,

    #[error("sample write failed: {0}")]
    Failed(String),
}

/// Port for the network side of a bridge
pub trait SampleWriter: Send + Sync {
    fn write_sample(&self, data: &[u8], duration: Duration) -> std::result::Result<(), WriteError>;
}

/// Port for allocating network tracks bound to a transport codec
pub trait TrackFactory: Send + Sync {
    type Track: SampleWriter + 'static;

    fn create_track(&self, entry: &'static MimeEntry) -> Result<Self::Track>;
}
