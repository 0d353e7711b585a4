use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use pipeline_publisher::{
    check_candidates, BridgeState, BusMessage, ControlEvent, ControlSender, DomainError,
    EosCallback, JoinOptions, MediaKind, MediaPipeline, MimeEntry, MimeRegistry, NoopReporter,
    PipelineFactory, Publication, PublisherConfig, PublisherService, Result, SessionConnector,
    SourceBridge, SourceCandidate, TrackSource, TransportSession,
};

/// Records every call the publisher makes into the fakes
#[derive(Default)]
struct CallLog {
    builds: AtomicUsize,
    starts: AtomicUsize,
    shutdowns: AtomicUsize,
    joins: AtomicUsize,
    disconnects: AtomicUsize,
    attached: Mutex<Vec<MediaKind>>,
    published: Mutex<Vec<MediaKind>>,
    unpublished: Mutex<Vec<String>>,
    pipeline_events: Mutex<Option<ControlSender>>,
}

impl CallLog {
    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FakeTrack(MediaKind);

struct FakeBridge {
    entry: &'static MimeEntry,
    track: FakeTrack,
    ended: AtomicBool,
    on_eos: Mutex<Option<EosCallback>>,
}

impl SourceBridge for FakeBridge {
    type Track = FakeTrack;

    fn kind(&self) -> MediaKind {
        self.entry.kind()
    }

    fn entry(&self) -> &'static MimeEntry {
        self.entry
    }

    fn track(&self) -> &FakeTrack {
        &self.track
    }

    fn set_on_eos(&self, callback: EosCallback) {
        *self.on_eos.lock().unwrap() = Some(callback);
    }

    fn handle_eos(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(callback) = self.on_eos.lock().unwrap().as_ref() {
            callback();
        }
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

struct FakePipeline {
    calls: Arc<CallLog>,
    candidates: Vec<SourceCandidate>,
    fail_start: bool,
    events: ControlSender,
    on_start: Vec<ControlEvent>,
}

impl MediaPipeline for FakePipeline {
    type Bridge = FakeBridge;

    fn discover(&self) -> Result<Vec<SourceCandidate>> {
        Ok(self.candidates.clone())
    }

    fn attach(&mut self, candidate: &SourceCandidate) -> Result<FakeBridge> {
        self.calls.attached.lock().unwrap().push(candidate.kind());
        Ok(FakeBridge {
            entry: candidate.entry(),
            track: FakeTrack(candidate.kind()),
            ended: AtomicBool::new(false),
            on_eos: Mutex::new(None),
        })
    }

    fn start(&mut self) -> Result<()> {
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(DomainError::PipelineStartFailed("refused".to_string()));
        }
        for event in self.on_start.drain(..) {
            self.events.send(event);
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.calls.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeFactory {
    calls: Arc<CallLog>,
    mimes: Vec<&'static str>,
    fail_start: bool,
    on_start: Vec<ControlEvent>,
}

impl PipelineFactory for FakeFactory {
    type Pipeline = FakePipeline;

    fn build(&self, description: &str, events: ControlSender) -> Result<FakePipeline> {
        if description.contains("broken") {
            return Err(DomainError::PipelineBuildFailed(description.to_string()));
        }
        self.calls.builds.fetch_add(1, Ordering::SeqCst);
        *self.calls.pipeline_events.lock().unwrap() = Some(events.clone());

        let candidates = self
            .mimes
            .iter()
            .enumerate()
            .map(|(i, mime)| {
                SourceCandidate::new(
                    format!("enc{}", i),
                    "src".to_string(),
                    MimeRegistry::resolve(mime).unwrap(),
                )
            })
            .collect();

        Ok(FakePipeline {
            calls: Arc::clone(&self.calls),
            candidates,
            fail_start: self.fail_start,
            events,
            on_start: self.on_start.clone(),
        })
    }
}

struct FakeSession {
    calls: Arc<CallLog>,
    fail_publish: Option<MediaKind>,
}

impl TransportSession for FakeSession {
    type Track = FakeTrack;

    fn publish_track(
        &self,
        track: &FakeTrack,
        kind: MediaKind,
        source: TrackSource,
    ) -> Result<Publication> {
        assert_eq!(track.0, kind);
        if self.fail_publish == Some(kind) {
            return Err(DomainError::PublishFailed(kind, "rejected".to_string()));
        }
        self.calls.published.lock().unwrap().push(kind);
        Ok(Publication::new(format!("TR_{}", kind), kind, source))
    }

    fn unpublish_track(&self, sid: &str) -> Result<()> {
        self.calls.unpublished.lock().unwrap().push(sid.to_string());
        Ok(())
    }

    fn disconnect(&self) {
        self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeConnector {
    calls: Arc<CallLog>,
    fail_join: bool,
    fail_publish: Option<MediaKind>,
    disconnect_on_join: bool,
}

impl SessionConnector for FakeConnector {
    type Session = FakeSession;

    fn join(
        &self,
        _endpoint: &str,
        credential: &str,
        options: JoinOptions,
        events: ControlSender,
    ) -> Result<FakeSession> {
        self.calls.joins.fetch_add(1, Ordering::SeqCst);
        assert!(!options.auto_subscribe);
        assert_eq!(credential, "token");
        if self.fail_join {
            return Err(DomainError::SessionJoinFailed("unauthorized".to_string()));
        }
        if self.disconnect_on_join {
            events.send(ControlEvent::SessionDisconnected("ice failed".to_string()));
        }
        Ok(FakeSession {
            calls: Arc::clone(&self.calls),
            fail_publish: self.fail_publish,
        })
    }
}

struct Setup {
    mimes: Vec<&'static str>,
    description: &'static str,
    fail_join: bool,
    fail_publish: Option<MediaKind>,
    fail_start: bool,
    disconnect_on_join: bool,
    on_start: Vec<ControlEvent>,
}

impl Setup {
    fn with(mimes: &[&'static str]) -> Self {
        Self {
            mimes: mimes.to_vec(),
            description: "videotestsrc ! vp8enc",
            fail_join: false,
            fail_publish: None,
            fail_start: false,
            disconnect_on_join: false,
            on_start: Vec::new(),
        }
    }

    /// Events the pipeline posts once it is playing
    fn on_start(mut self, events: Vec<ControlEvent>) -> Self {
        self.on_start = events;
        self
    }

    fn build(self) -> (PublisherService<FakeFactory, FakeConnector>, Arc<CallLog>) {
        let calls = Arc::new(CallLog::default());
        let config = PublisherConfig::new(
            self.description.to_string(),
            "http://localhost:8080/whip".to_string(),
            "token".to_string(),
        )
        .unwrap();
        let factory = FakeFactory {
            calls: Arc::clone(&calls),
            mimes: self.mimes,
            fail_start: self.fail_start,
            on_start: self.on_start,
        };
        let connector = FakeConnector {
            calls: Arc::clone(&calls),
            fail_join: self.fail_join,
            fail_publish: self.fail_publish,
            disconnect_on_join: self.disconnect_on_join,
        };
        let service = PublisherService::new(config, factory, connector, Arc::new(NoopReporter));
        (service, calls)
    }
}

const AV: &[&str] = &["video/x-h264", "audio/x-opus"];

/// Spins until the fake pipeline has been started
fn wait_for_start(calls: &CallLog) {
    while CallLog::count(&calls.starts) == 0 {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_gstreamer_init() {
    assert!(gstreamer::init().is_ok());
}

#[test]
fn test_mime_registry_membership() {
    for mime in ["audio/x-opus", "video/x-h264", "video/x-vp8", "video/x-vp9", "video/x-av1"] {
        assert!(MimeRegistry::lookup(mime).is_some(), "{} should be supported", mime);
    }
    assert!(MimeRegistry::lookup("video/x-raw").is_none());
    assert!(MimeRegistry::lookup("audio/mpeg").is_none());
}

#[test]
fn test_check_candidates_reports_duplicate_kind() {
    let candidates: Vec<_> = ["audio/x-opus", "audio/x-opus"]
        .iter()
        .map(|mime| {
            SourceCandidate::new(
                "opusenc".to_string(),
                "src".to_string(),
                MimeRegistry::resolve(mime).unwrap(),
            )
        })
        .collect();
    assert!(matches!(
        check_candidates(&candidates),
        Err(DomainError::DuplicateSource(MediaKind::Audio))
    ));
}

#[test]
fn test_duplicate_video_sources_fail_before_any_bridge() {
    let (mut service, calls) = Setup::with(&["video/x-vp8", "video/x-h264", "audio/x-opus"]).build();

    let result = service.run();

    assert!(matches!(result, Err(DomainError::DuplicateSource(MediaKind::Video))));
    assert!(calls.attached.lock().unwrap().is_empty());
    assert!(!service.has_bridge(MediaKind::Video));
    assert!(!service.has_bridge(MediaKind::Audio));
    assert_eq!(CallLog::count(&calls.joins), 0);
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
    assert_eq!(service.current_state(), BridgeState::Stopped);
}

#[test]
fn test_no_supported_source_never_joins() {
    let (mut service, calls) = Setup::with(&[]).build();

    let result = service.run();

    assert!(matches!(result, Err(DomainError::NoSource)));
    assert_eq!(CallLog::count(&calls.joins), 0);
    assert_eq!(CallLog::count(&calls.disconnects), 0);
    assert_eq!(service.current_state(), BridgeState::Stopped);
}

#[test]
fn test_build_failure_is_reported() {
    let mut setup = Setup::with(AV);
    setup.description = "broken ! pipeline";
    let (mut service, calls) = setup.build();

    let result = service.run();

    assert!(matches!(result, Err(DomainError::PipelineBuildFailed(_))));
    assert_eq!(CallLog::count(&calls.builds), 0);
    assert_eq!(CallLog::count(&calls.shutdowns), 0);
    assert_eq!(service.current_state(), BridgeState::Stopped);
}

#[test]
fn test_join_failure_releases_pipeline() {
    let mut setup = Setup::with(AV);
    setup.fail_join = true;
    let (mut service, calls) = setup.build();

    let result = service.run();

    assert!(matches!(result, Err(DomainError::SessionJoinFailed(_))));
    assert!(calls.published.lock().unwrap().is_empty());
    assert_eq!(CallLog::count(&calls.starts), 0);
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
    assert_eq!(CallLog::count(&calls.disconnects), 0);
}

#[test]
fn test_video_publish_failure_disconnects_without_starting() {
    let mut setup = Setup::with(AV);
    setup.fail_publish = Some(MediaKind::Video);
    let (mut service, calls) = setup.build();

    let result = service.run();

    assert!(matches!(result, Err(DomainError::PublishFailed(MediaKind::Video, _))));
    assert!(calls.published.lock().unwrap().is_empty());
    assert_eq!(CallLog::count(&calls.starts), 0);
    assert_eq!(CallLog::count(&calls.disconnects), 1);
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
    assert_eq!(service.current_state(), BridgeState::Stopped);
}

#[test]
fn test_audio_publish_failure_unpublishes_video() {
    let mut setup = Setup::with(AV);
    setup.fail_publish = Some(MediaKind::Audio);
    let (mut service, calls) = setup.build();

    let result = service.run();

    assert!(matches!(result, Err(DomainError::PublishFailed(MediaKind::Audio, _))));
    assert_eq!(*calls.published.lock().unwrap(), vec![MediaKind::Video]);
    assert_eq!(*calls.unpublished.lock().unwrap(), vec!["TR_video".to_string()]);
    assert_eq!(CallLog::count(&calls.disconnects), 1);
}

#[test]
fn test_start_failure_tears_down_everything() {
    let mut setup = Setup::with(AV);
    setup.fail_start = true;
    let (mut service, calls) = setup.build();

    let result = service.run();

    assert!(matches!(result, Err(DomainError::PipelineStartFailed(_))));
    assert_eq!(calls.unpublished.lock().unwrap().len(), 2);
    assert_eq!(CallLog::count(&calls.disconnects), 1);
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
    assert!(service.publications().is_empty());
}

#[test]
fn test_end_of_stream_stops_run() {
    let (mut service, calls) = Setup::with(AV).build();
    let events = service.control_sender();

    let started = Arc::clone(&calls);
    let sender = thread::spawn(move || {
        wait_for_start(&started);
        events.send(ControlEvent::Bus(BusMessage::EndOfStream));
    });
    let result = service.run();
    sender.join().unwrap();

    assert!(result.is_ok());
    assert_eq!(*calls.attached.lock().unwrap(), vec![MediaKind::Video, MediaKind::Audio]);
    assert_eq!(*calls.published.lock().unwrap(), vec![MediaKind::Video, MediaKind::Audio]);
    let mut unpublished = calls.unpublished.lock().unwrap().clone();
    unpublished.sort();
    assert_eq!(unpublished, vec!["TR_audio".to_string(), "TR_video".to_string()]);
    assert_eq!(CallLog::count(&calls.starts), 1);
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
    assert_eq!(CallLog::count(&calls.disconnects), 1);
    assert_eq!(service.current_state(), BridgeState::Stopped);
    assert_eq!(service.lifecycle().stop_reason(), Some("pipeline end of stream"));
}

#[test]
fn test_lifecycle_passes_through_every_state() {
    let (mut service, _calls) = Setup::with(&["video/x-av1"])
        .on_start(vec![ControlEvent::Bus(BusMessage::EndOfStream)])
        .build();

    service.run().unwrap();

    let states: Vec<_> = service.lifecycle().history().iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            BridgeState::Initializing,
            BridgeState::Joining,
            BridgeState::Publishing,
            BridgeState::Running,
            BridgeState::Stopping,
            BridgeState::Stopped,
        ]
    );
}

#[test]
fn test_bus_messages_reach_the_run_loop() {
    let (mut service, calls) = Setup::with(&["video/x-vp9"]).build();

    let sender = thread::spawn(move || {
        // The pipeline sender is only handed out once the pipeline is built
        let pipeline_events = loop {
            if let Some(tx) = calls.pipeline_events.lock().unwrap().clone() {
                break tx;
            }
            thread::sleep(Duration::from_millis(5));
        };
        wait_for_start(&calls);
        pipeline_events.send(ControlEvent::Bus(BusMessage::Error {
            source: "/pipeline0/vp9enc0".to_string(),
            message: "encoder failed".to_string(),
            debug: None,
        }));
        calls
    });
    let result = service.run();
    let calls = sender.join().unwrap();

    assert!(result.is_ok());
    assert_eq!(service.lifecycle().stop_reason(), Some("pipeline error"));
    assert_eq!(CallLog::count(&calls.disconnects), 1);
}

#[test]
fn test_non_fatal_events_keep_running() {
    let (mut service, calls) = Setup::with(AV)
        .on_start(vec![ControlEvent::Signal("SIGTERM".to_string())])
        .build();
    let events = service.control_sender();
    events.send(ControlEvent::Bus(BusMessage::Warning {
        source: "/pipeline0/x264enc0".to_string(),
        message: "late".to_string(),
    }));
    events.send(ControlEvent::Bus(BusMessage::Informational("latency")));
    events.send(ControlEvent::Bus(BusMessage::Unrecognized("Qos".to_string())));

    service.run().unwrap();

    assert_eq!(*calls.published.lock().unwrap(), vec![MediaKind::Video, MediaKind::Audio]);
    assert_eq!(CallLog::count(&calls.starts), 1);
    assert_eq!(service.lifecycle().stop_reason(), Some("termination signal"));
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
}

#[test]
fn test_track_end_unpublishes_only_that_kind() {
    let (mut service, calls) = Setup::with(AV)
        .on_start(vec![
            ControlEvent::TrackEnded(MediaKind::Audio),
            ControlEvent::Bus(BusMessage::EndOfStream),
        ])
        .build();

    service.run().unwrap();

    assert_eq!(
        *calls.unpublished.lock().unwrap(),
        vec!["TR_audio".to_string(), "TR_video".to_string()]
    );
}

#[test]
fn test_concurrent_stop_triggers_tear_down_once() {
    let (mut service, calls) = Setup::with(AV).build();
    let barrier = Arc::new(Barrier::new(2));

    let senders: Vec<_> = [
        ControlEvent::Bus(BusMessage::EndOfStream),
        ControlEvent::SessionDisconnected("peer connection failed".to_string()),
    ]
    .into_iter()
    .map(|event| {
        let events = service.control_sender();
        let barrier = Arc::clone(&barrier);
        let started = Arc::clone(&calls);
        thread::spawn(move || {
            wait_for_start(&started);
            barrier.wait();
            events.send(event);
        })
    })
    .collect();

    let result = service.run();
    for sender in senders {
        sender.join().unwrap();
    }

    assert!(result.is_ok());
    assert_eq!(service.lifecycle().teardown_count(), 1);
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
    assert_eq!(CallLog::count(&calls.disconnects), 1);
    assert_eq!(calls.unpublished.lock().unwrap().len(), 2);
}

#[test]
fn test_stop_is_idempotent() {
    let (mut service, calls) = Setup::with(AV)
        .on_start(vec![ControlEvent::Signal("SIGINT".to_string())])
        .build();
    service.run().unwrap();

    service.stop("second request");
    service.handle_event(ControlEvent::SessionDisconnected("late".to_string()));

    assert_eq!(service.lifecycle().teardown_count(), 1);
    assert_eq!(service.lifecycle().stop_reason(), Some("termination signal"));
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
    assert_eq!(CallLog::count(&calls.disconnects), 1);
}

#[test]
fn test_stop_before_start() {
    let (mut service, calls) = Setup::with(AV).build();

    service.stop("never started");

    assert_eq!(service.current_state(), BridgeState::Stopped);
    assert_eq!(CallLog::count(&calls.builds), 0);
    assert_eq!(CallLog::count(&calls.disconnects), 0);
}

#[test]
fn test_run_after_stop_builds_nothing() {
    let (mut service, calls) = Setup::with(AV).build();
    service.stop("early");

    let result = service.run();

    assert!(matches!(
        result,
        Err(DomainError::InvalidTransition(BridgeState::Stopped))
    ));
    assert_eq!(CallLog::count(&calls.builds), 0);
    assert_eq!(CallLog::count(&calls.joins), 0);
    assert!(calls.published.lock().unwrap().is_empty());
    assert_eq!(CallLog::count(&calls.starts), 0);
    assert_eq!(service.lifecycle().teardown_count(), 1);
    assert_eq!(service.current_state(), BridgeState::Stopped);
}

#[test]
fn test_signal_before_run_skips_startup() {
    let (mut service, calls) = Setup::with(AV).build();
    service
        .control_sender()
        .send(ControlEvent::Signal("SIGINT".to_string()));

    let result = service.run();

    assert!(result.is_ok());
    assert_eq!(CallLog::count(&calls.builds), 0);
    assert_eq!(CallLog::count(&calls.joins), 0);
    assert_eq!(service.lifecycle().stop_reason(), Some("termination signal"));
    assert_eq!(service.current_state(), BridgeState::Stopped);
}

#[test]
fn test_disconnect_while_joining_skips_publish() {
    let mut setup = Setup::with(AV);
    setup.disconnect_on_join = true;
    let (mut service, calls) = setup.build();

    let result = service.run();

    assert!(result.is_ok());
    assert_eq!(CallLog::count(&calls.joins), 1);
    assert!(calls.published.lock().unwrap().is_empty());
    assert_eq!(CallLog::count(&calls.starts), 0);
    assert_eq!(CallLog::count(&calls.shutdowns), 1);
    assert_eq!(CallLog::count(&calls.disconnects), 1);
    assert_eq!(service.lifecycle().stop_reason(), Some("session disconnected"));
}

#[test]
fn test_pipeline_error_from_another_thread_aborts_startup() {
    let (mut service, calls) = Setup::with(AV).build();
    let events = service.control_sender();

    thread::spawn(move || {
        events.send(ControlEvent::Bus(BusMessage::Error {
            source: "/pipeline0/x264enc0".to_string(),
            message: "not negotiated".to_string(),
            debug: None,
        }))
    })
    .join()
    .unwrap();

    assert!(service.run().is_ok());
    assert_eq!(CallLog::count(&calls.joins), 0);
    assert_eq!(service.lifecycle().stop_reason(), Some("pipeline error"));
}
