use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;
use crate::domain::value_objects::{BridgeState, MediaKind};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Publisher state (0=Idle .. 6=Stopped)
    pub static ref BRIDGE_STATE: Gauge = Gauge::new(
        "publisher_bridge_state",
        "Current publisher state"
    ).expect("metric can be created");

    pub static ref SAMPLES_FORWARDED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "publisher_samples_forwarded_total",
            "Total encoded samples written to network tracks"
        ),
        &["kind"]
    ).expect("metric can be created");

    pub static ref BYTES_FORWARDED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "publisher_bytes_forwarded_total",
            "Total encoded bytes written to network tracks"
        ),
        &["kind"]
    ).expect("metric can be created");

    pub static ref FORWARD_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "publisher_forward_errors_total",
            "Total samples that failed to reach the network track"
        ),
        &["kind"]
    ).expect("metric can be created");

    // Published track state per kind (0=unpublished, 1=published)
    pub static ref PUBLISHED_TRACKS: IntGaugeVec = IntGaugeVec::new(
        Opts::new(
            "publisher_published_tracks",
            "Tracks currently published to the session"
        ),
        &["kind"]
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(BRIDGE_STATE.clone()))?;
        REGISTRY.register(Box::new(SAMPLES_FORWARDED.clone()))?;
        REGISTRY.register(Box::new(BYTES_FORWARDED.clone()))?;
        REGISTRY.register(Box::new(FORWARD_ERRORS.clone()))?;
        REGISTRY.register(Box::new(PUBLISHED_TRACKS.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_state_change(&self, state: BridgeState) {
        BRIDGE_STATE.set(state.as_metric());
    }

    fn report_sample_forwarded(&self, kind: MediaKind, bytes: usize) {
        SAMPLES_FORWARDED.with_label_values(&[kind.as_str()]).inc();
        BYTES_FORWARDED
            .with_label_values(&[kind.as_str()])
            .inc_by(bytes as u64);
    }

    fn report_forward_error(&self, kind: MediaKind) {
        FORWARD_ERRORS.with_label_values(&[kind.as_str()]).inc();
    }

    fn report_track_published(&self, kind: MediaKind, published: bool) {
        PUBLISHED_TRACKS
            .with_label_values(&[kind.as_str()])
            .set(if published { 1 } else { 0 });
    }
}
