use std::sync::Arc;

use gstreamer::prelude::*;

use super::{BusWatch, ElementScanner, TrackBridge};
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    ControlSender, MediaPipeline, MetricsReporter, PipelineFactory, SourceCandidate, TrackFactory,
};

/// Builds GStreamer pipelines from `gst-launch` style descriptions
pub struct GStreamerPipelineFactory<F> {
    tracks: Arc<F>,
    metrics: Arc<dyn MetricsReporter>,
}

impl<F: TrackFactory> GStreamerPipelineFactory<F> {
    pub fn new(tracks: F, metrics: Arc<dyn MetricsReporter>) -> Self {
        Self {
            tracks: Arc::new(tracks),
            metrics,
        }
    }
}

impl<F: TrackFactory> PipelineFactory for GStreamerPipelineFactory<F> {
    type Pipeline = GStreamerPipeline<F>;

    fn build(&self, description: &str, events: ControlSender) -> Result<Self::Pipeline> {
        tracing::info!("Creating pipeline: {}", description);

        let element = gstreamer::parse::launch(description)
            .map_err(|e| DomainError::PipelineBuildFailed(e.to_string()))?;

        // A description naming a single element parses to that element alone
        let pipeline = match element.downcast::<gstreamer::Pipeline>() {
            Ok(pipeline) => pipeline,
            Err(element) => {
                let pipeline = gstreamer::Pipeline::new();
                pipeline
                    .add(&element)
                    .map_err(|e| DomainError::PipelineBuildFailed(e.to_string()))?;
                pipeline
            }
        };

        let bus = pipeline.bus().ok_or_else(|| {
            DomainError::PipelineBuildFailed("Failed to get bus".to_string())
        })?;
        let bus_watch = BusWatch::spawn(bus, events)
            .map_err(|e| DomainError::PipelineBuildFailed(e.to_string()))?;

        Ok(GStreamerPipeline {
            pipeline,
            tracks: Arc::clone(&self.tracks),
            metrics: Arc::clone(&self.metrics),
            bus_watch: Some(bus_watch),
        })
    }
}

pub struct GStreamerPipeline<F> {
    pipeline: gstreamer::Pipeline,
    tracks: Arc<F>,
    metrics: Arc<dyn MetricsReporter>,
    bus_watch: Option<BusWatch>,
}

impl<F> GStreamerPipeline<F> {
    pub fn pipeline(&self) -> &gstreamer::Pipeline {
        &self.pipeline
    }
}

impl<F: TrackFactory> MediaPipeline for GStreamerPipeline<F> {
    type Bridge = TrackBridge<F::Track>;

    fn discover(&self) -> Result<Vec<SourceCandidate>> {
        Ok(ElementScanner::discover(&self.pipeline)?
            .iter()
            .map(|output| output.to_source())
            .collect())
    }

    fn attach(&mut self, candidate: &SourceCandidate) -> Result<Self::Bridge> {
        let kind = candidate.kind();
        let link_failed = |msg: String| DomainError::LinkFailed(kind, msg);

        let element = self
            .pipeline
            .by_name(candidate.element_name())
            .ok_or_else(|| link_failed(format!("element {} not found", candidate.element_name())))?;
        let src_pad = element
            .static_pad(candidate.pad_name())
            .ok_or_else(|| link_failed(format!("pad {} not found", candidate.pad_name())))?;

        let bridge = TrackBridge::create(
            candidate.entry().pipeline_mime(),
            self.tracks.as_ref(),
            Arc::clone(&self.metrics),
        )?;

        self.pipeline
            .add(bridge.sink())
            .map_err(|e| link_failed(e.to_string()))?;
        let sink_pad = bridge
            .sink()
            .static_pad("sink")
            .ok_or_else(|| link_failed("appsink has no sink pad".to_string()))?;

        if let Err(e) = src_pad.link(&sink_pad) {
            let _ = self.pipeline.remove(bridge.sink());
            return Err(link_failed(format!("{:?}", e)));
        }

        tracing::debug!(
            kind = %kind,
            element = candidate.element_name(),
            "Linked output to track sink"
        );
        Ok(bridge)
    }

    fn start(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| DomainError::PipelineStartFailed(e.to_string()))?;
        Ok(())
    }

    fn shutdown(&mut self) {
        let Some(mut bus_watch) = self.bus_watch.take() else {
            return;
        };
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            tracing::warn!("Failed to set pipeline to NULL: {}", e);
        }
        bus_watch.stop();
    }
}

impl<F> Drop for GStreamerPipeline<F> {
    fn drop(&mut self) {
        if let Some(mut bus_watch) = self.bus_watch.take() {
            let _ = self.pipeline.set_state(gstreamer::State::Null);
            bus_watch.stop();
        }
    }
}
