use crate::domain::value_objects::{BridgeState, MediaKind};

/// Port for metrics reporting
pub trait MetricsReporter: Send + Sync {
    fn report_state_change(&self, state: BridgeState);
    fn report_sample_forwarded(&self, kind: MediaKind, bytes: usize);
    fn report_forward_error(&self, kind: MediaKind);
    fn report_track_published(&self, kind: MediaKind, published: bool);
}

/// Reporter used when no metrics endpoint is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl MetricsReporter for NoopReporter {
    fn report_state_change(&self, _state: BridgeState) {}
    fn report_sample_forwarded(&self, _kind: MediaKind, _bytes: usize) {}
    fn report_forward_error(&self, _kind: MediaKind) {}
    fn report_track_published(&self, _kind: MediaKind, _published: bool) {}
}
