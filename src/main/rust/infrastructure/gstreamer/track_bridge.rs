use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    EosCallback, MetricsReporter, SampleWriter, SourceBridge, TrackFactory, WriteError,
};
use crate::domain::value_objects::{MediaKind, MimeEntry, MimeRegistry};

/// State shared between the bridge and its appsink callbacks.
///
/// Kept apart from the sink so the callbacks do not own the sink that owns them.
struct BridgeShared<T> {
    entry: &'static MimeEntry,
    track: T,
    ended: AtomicBool,
    on_eos: Mutex<Option<EosCallback>>,
    metrics: Arc<dyn MetricsReporter>,
}

impl<T: SampleWriter> BridgeShared<T> {
    fn handle_sample(
        &self,
        sink: &gst_app::AppSink,
    ) -> std::result::Result<gstreamer::FlowSuccess, gstreamer::FlowError> {
        self.forward(sink.pull_sample().ok())
    }

    fn forward(
        &self,
        sample: Option<gstreamer::Sample>,
    ) -> std::result::Result<gstreamer::FlowSuccess, gstreamer::FlowError> {
        let Some(sample) = sample else {
            return Err(gstreamer::FlowError::Eos);
        };
        let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
        sample.segment().ok_or(gstreamer::FlowError::Error)?;

        let duration = buffer
            .duration()
            .map(|d| Duration::from_nanos(d.nseconds()))
            .unwrap_or(Duration::ZERO);
        let map = buffer
            .map_readable()
            .map_err(|_| gstreamer::FlowError::Error)?;

        let kind = self.entry.kind();
        match self.track.write_sample(map.as_slice(), duration) {
            Ok(()) => {
                self.metrics.report_sample_forwarded(kind, map.size());
                Ok(gstreamer::FlowSuccess::Ok)
            }
            Err(WriteError::EndOfStream) => Err(gstreamer::FlowError::Eos),
            Err(WriteError::Failed(e)) => {
                tracing::debug!(kind = %kind, "Failed to forward sample: {}", e);
                self.metrics.report_forward_error(kind);
                Err(gstreamer::FlowError::Error)
            }
        }
    }

    fn handle_eos(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(kind = %self.entry.kind(), "End of stream on track sink");
        if let Ok(guard) = self.on_eos.lock() {
            if let Some(callback) = guard.as_ref() {
                callback();
            }
        }
    }
}

/// Pulls encoded samples from an appsink and writes them to a network track
pub struct TrackBridge<T> {
    sink: gst_app::AppSink,
    shared: Arc<BridgeShared<T>>,
}

impl<T: SampleWriter + 'static> TrackBridge<T> {
    pub fn create<F>(
        pipeline_mime: &str,
        tracks: &F,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Result<Self>
    where
        F: TrackFactory<Track = T> + ?Sized,
    {
        let entry = MimeRegistry::resolve(pipeline_mime)?;

        let sink = gstreamer::ElementFactory::make("appsink")
            .name(format!("{}_publisher_sink", entry.kind()))
            .build()
            .map_err(|e| DomainError::LinkFailed(entry.kind(), e.to_string()))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| {
                DomainError::LinkFailed(entry.kind(), "appsink has unexpected type".to_string())
            })?;
        if entry.requires_byte_stream() {
            let caps = gstreamer::Caps::builder(entry.pipeline_mime())
                .field("stream-format", "byte-stream")
                .build();
            sink.set_caps(Some(&caps));
        }

        let track = tracks.create_track(entry)?;
        let shared = Arc::new(BridgeShared {
            entry,
            track,
            ended: AtomicBool::new(false),
            on_eos: Mutex::new(None),
            metrics,
        });

        let on_sample = Arc::clone(&shared);
        let on_eos = Arc::clone(&shared);
        sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| on_sample.handle_sample(sink))
                .eos(move |_| on_eos.handle_eos())
                .build(),
        );

        Ok(Self { sink, shared })
    }

    pub fn sink(&self) -> &gst_app::AppSink {
        &self.sink
    }
}

impl<T: SampleWriter + 'static> SourceBridge for TrackBridge<T> {
    type Track = T;

    fn kind(&self) -> MediaKind {
        self.shared.entry.kind()
    }

    fn entry(&self) -> &'static MimeEntry {
        self.shared.entry
    }

    fn track(&self) -> &T {
        &self.shared.track
    }

    fn set_on_eos(&self, callback: EosCallback) {
        if let Ok(mut guard) = self.shared.on_eos.lock() {
            *guard = Some(callback);
        }
    }

    fn handle_eos(&self) {
        self.shared.handle_eos();
    }

    fn is_ended(&self) -> bool {
        self.shared.ended.load(Ordering::SeqCst)
    }
}
