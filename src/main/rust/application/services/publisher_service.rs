use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::entities::BridgeLifecycle;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    control_channel, ControlReceiver, ControlSender, JoinOptions, MediaPipeline, MetricsReporter,
    PipelineFactory, Publication, SessionConnector, SourceBridge, SourceCandidate,
    TransportSession,
};
use crate::domain::value_objects::{
    BridgeState, BusMessage, ControlEvent, MediaKind, PublisherConfig,
};

type PipelineOf<F> = <F as PipelineFactory>::Pipeline;
type BridgeOf<F> = <PipelineOf<F> as MediaPipeline>::Bridge;
type TrackOf<F> = <BridgeOf<F> as SourceBridge>::Track;

/// Application service bridging a media pipeline into a transport session.
///
/// Startup runs `Initializing -> Joining -> Publishing -> Running` on the
/// calling thread. Callbacks from the pipeline, the tracks and the session
/// never touch this struct directly: they post a [`ControlEvent`] that the
/// blocking run loop consumes, so every state change happens on one thread.
pub struct PublisherService<F, C>
where
    F: PipelineFactory,
    C: SessionConnector,
{
    config: PublisherConfig,
    pipeline_factory: F,
    connector: C,
    metrics: Arc<dyn MetricsReporter>,
    lifecycle: BridgeLifecycle,
    events: ControlSender,
    pipeline: Option<PipelineOf<F>>,
    session: Option<C::Session>,
    audio: Option<BridgeOf<F>>,
    video: Option<BridgeOf<F>>,
    publications: Vec<Publication>,
    run_loop: Option<ControlReceiver>,
}

impl<F, C> PublisherService<F, C>
where
    F: PipelineFactory,
    C: SessionConnector,
    C::Session: TransportSession<Track = TrackOf<F>>,
{
    pub fn new(
        config: PublisherConfig,
        pipeline_factory: F,
        connector: C,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        let (events, receiver) = control_channel();
        Self {
            config,
            pipeline_factory,
            connector,
            metrics,
            lifecycle: BridgeLifecycle::new(),
            events,
            pipeline: None,
            session: None,
            audio: None,
            video: None,
            publications: Vec::new(),
            run_loop: Some(receiver),
        }
    }

    /// Handle for posting events from other threads, e.g. a signal listener
    pub fn control_sender(&self) -> ControlSender {
        self.events.clone()
    }

    pub fn current_state(&self) -> BridgeState {
        self.lifecycle.current_state()
    }

    pub fn lifecycle(&self) -> &BridgeLifecycle {
        &self.lifecycle
    }

    pub fn publications(&self) -> &[Publication] {
        &self.publications
    }

    pub fn has_bridge(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio.is_some(),
            MediaKind::Video => self.video.is_some(),
        }
    }

    /// Starts publishing and blocks until the run is stopped.
    ///
    /// Startup errors are returned after everything already established has
    /// been torn down. Runtime terminations (end-of-stream, pipeline error,
    /// session disconnect, signal) return `Ok`, also when they arrive while
    /// startup is still in progress. A stopped publisher cannot be run again.
    pub fn run(&mut self) -> Result<()> {
        match self.start_up() {
            Ok(()) => {
                info!("Publisher running");
                self.run_event_loop();
            }
            Err(DomainError::StartupInterrupted(reason)) => {
                info!("Startup interrupted: {}", reason);
            }
            Err(e) => {
                error!("Publisher startup failed: {}", e);
                self.stop(&format!("startup failed: {}", e));
                return Err(e);
            }
        }

        info!(
            reason = self.lifecycle.stop_reason().unwrap_or("unknown"),
            uptime = ?self.lifecycle.uptime(),
            "Publisher stopped"
        );
        Ok(())
    }

    fn start_up(&mut self) -> Result<()> {
        self.apply_pending_events()?;
        self.initialize()?;
        self.apply_pending_events()?;
        self.join()?;
        self.apply_pending_events()?;
        self.publish()?;
        self.apply_pending_events()?;
        self.start_pipeline()
    }

    /// Handles events posted while startup was blocked in a phase; a stop
    /// trigger tears down what exists so far and ends startup
    fn apply_pending_events(&mut self) -> Result<()> {
        while let Some(event) = self.run_loop.as_mut().and_then(ControlReceiver::try_recv) {
            let stop_reason = event.stop_reason();
            self.handle_event(event);
            if let Some(reason) = stop_reason {
                return Err(DomainError::StartupInterrupted(reason.to_string()));
            }
        }
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        self.advance(BridgeLifecycle::transition_to_initializing)?;

        let pipeline = self
            .pipeline_factory
            .build(self.config.pipeline_description(), self.events.clone())?;
        let pipeline = self.pipeline.insert(pipeline);

        let candidates = pipeline.discover()?;
        check_candidates(&candidates)?;

        for candidate in &candidates {
            let bridge = pipeline.attach(candidate)?;
            info!(
                mime = candidate.entry().pipeline_mime(),
                kind = %candidate.kind(),
                element = candidate.element_name(),
                "Found source"
            );
            match candidate.kind() {
                MediaKind::Audio => self.audio = Some(bridge),
                MediaKind::Video => self.video = Some(bridge),
            }
        }

        Ok(())
    }

    fn join(&mut self) -> Result<()> {
        self.advance(BridgeLifecycle::transition_to_joining)?;

        info!("Joining session at {}", self.config.endpoint());
        let session = self.connector.join(
            self.config.endpoint(),
            self.config.credential(),
            JoinOptions::default(),
            self.events.clone(),
        )?;
        self.session = Some(session);
        Ok(())
    }

    fn publish(&mut self) -> Result<()> {
        self.advance(BridgeLifecycle::transition_to_publishing)?;

        let session = self
            .session
            .as_ref()
            .ok_or_else(|| DomainError::SessionJoinFailed("session not joined".to_string()))?;

        for bridge in [self.video.as_ref(), self.audio.as_ref()].into_iter().flatten() {
            let kind = bridge.kind();
            let publication = session.publish_track(bridge.track(), kind, kind.track_source())?;
            info!(
                kind = %kind,
                source = %publication.source(),
                sid = publication.sid(),
                "Track published"
            );
            self.metrics.report_track_published(kind, true);

            let events = self.events.clone();
            bridge.set_on_eos(Box::new(move || events.send(ControlEvent::TrackEnded(kind))));
            self.publications.push(publication);
        }

        Ok(())
    }

    fn start_pipeline(&mut self) -> Result<()> {
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| DomainError::PipelineStartFailed("pipeline not built".to_string()))?;
        pipeline.start()?;
        self.advance(BridgeLifecycle::transition_to_running)
    }

    fn run_event_loop(&mut self) {
        loop {
            let Some(run_loop) = self.run_loop.as_mut() else {
                break;
            };
            match run_loop.recv_blocking() {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    /// Applies one control event to the state machine
    pub fn handle_event(&mut self, event: ControlEvent) {
        match &event {
            ControlEvent::Bus(BusMessage::EndOfStream) => {
                info!("EOS received, stopping pipeline");
            }
            ControlEvent::Bus(BusMessage::Error {
                source,
                message,
                debug: debug_info,
            }) => {
                error!(source = %source, debug = ?debug_info, "Pipeline failure: {}", message);
            }
            ControlEvent::Bus(BusMessage::Warning { source, message }) => {
                warn!(source = %source, "Pipeline warning: {}", message);
            }
            ControlEvent::Bus(BusMessage::Informational(_)) => {}
            ControlEvent::Bus(BusMessage::Unrecognized(kind)) => {
                debug!("Ignoring bus message: {}", kind);
            }
            ControlEvent::TrackEnded(kind) => {
                info!(kind = %kind, "Track source ended");
                self.unpublish(*kind);
            }
            ControlEvent::SessionDisconnected(reason) => {
                warn!("Session disconnected: {}", reason);
            }
            ControlEvent::Signal(name) => {
                info!("Received {}, shutting down", name);
            }
        }

        if let Some(reason) = event.stop_reason() {
            self.stop(reason);
        }
    }

    fn unpublish(&mut self, kind: MediaKind) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(position) = self.publications.iter().position(|p| p.kind() == kind) else {
            return;
        };

        let publication = self.publications.remove(position);
        if let Err(e) = session.unpublish_track(publication.sid()) {
            warn!("{}", e);
        }
        self.metrics.report_track_published(kind, false);
    }

    /// Tears everything down exactly once, from any state.
    ///
    /// Later calls, whatever their trigger, are no-ops.
    pub fn stop(&mut self, reason: &str) {
        if !self.lifecycle.begin_teardown(reason) {
            debug!("Stop already handled, ignoring: {}", reason);
            return;
        }
        self.metrics.report_state_change(self.lifecycle.current_state());
        info!("Stopping publisher ({})", reason);

        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }

        for bridge in [self.video.take(), self.audio.take()].into_iter().flatten() {
            bridge.handle_eos();
        }

        if let Some(session) = self.session.take() {
            for publication in self.publications.drain(..) {
                if let Err(e) = session.unpublish_track(publication.sid()) {
                    warn!("{}", e);
                }
                self.metrics.report_track_published(publication.kind(), false);
            }
            session.disconnect();
        }
        self.publications.clear();

        self.run_loop = None;

        self.lifecycle.finish_teardown();
        self.metrics.report_state_change(self.lifecycle.current_state());
    }

    /// Refuses to move on once a teardown has begun
    fn advance(&mut self, transition: fn(&mut BridgeLifecycle) -> bool) -> Result<()> {
        let from = self.lifecycle.current_state();
        if !transition(&mut self.lifecycle) {
            return Err(DomainError::InvalidTransition(from));
        }
        let state = self.lifecycle.current_state();
        debug!("Publisher state: {}", state);
        self.metrics.report_state_change(state);
        Ok(())
    }
}

/// Rejects an empty discovery result and more than one source per kind
pub fn check_candidates(candidates: &[SourceCandidate]) -> Result<()> {
    if candidates.is_empty() {
        return Err(DomainError::NoSource);
    }

    for kind in [MediaKind::Video, MediaKind::Audio] {
        if candidates.iter().filter(|c| c.kind() == kind).count() > 1 {
            return Err(DomainError::DuplicateSource(kind));
        }
    }

    Ok(())
}
