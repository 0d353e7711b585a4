use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{StatusCode, Url};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

use super::LocalTrack;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    ControlSender, JoinOptions, Publication, SessionConnector, TransportSession,
};
use crate::domain::value_objects::{ControlEvent, MediaKind, PublisherConfig, TrackSource};

const HTTP_TIMEOUT_SECS: u64 = 10;
const ICE_GATHERING_TIMEOUT_SECS: u64 = 10;
const RTCP_BUFFER_SIZE: usize = 1500;

pub const DEFAULT_ICE_SERVER: &str = "stun:stun.l.google.com:19302";

fn create_webrtc_api() -> std::result::Result<Arc<API>, webrtc::Error> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    Ok(Arc::new(api))
}

/// Joins WHIP endpoints; one peer connection is negotiated per published track
pub struct WhipConnector {
    runtime: Handle,
    client: reqwest::Client,
    ice_servers: Vec<String>,
}

impl WhipConnector {
    pub fn new(runtime: Handle, ice_servers: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                DomainError::SessionJoinFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            runtime,
            client,
            ice_servers,
        })
    }
}

impl SessionConnector for WhipConnector {
    type Session = WhipSession;

    fn join(
        &self,
        endpoint: &str,
        credential: &str,
        options: JoinOptions,
        events: ControlSender,
    ) -> Result<WhipSession> {
        PublisherConfig::validate_endpoint(endpoint)?;
        if options.auto_subscribe {
            return Err(DomainError::SessionJoinFailed(
                "subscribing to remote tracks is not supported".to_string(),
            ));
        }
        let endpoint = Url::parse(endpoint)
            .map_err(|e| DomainError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        let api = create_webrtc_api().map_err(|e| DomainError::SessionJoinFailed(e.to_string()))?;

        let session = SessionInner {
            runtime: self.runtime.clone(),
            client: self.client.clone(),
            endpoint,
            credential: credential.to_string(),
            api,
            ice_servers: self.ice_servers.clone(),
            events,
            published: Mutex::new(HashMap::new()),
            disconnected: AtomicBool::new(false),
        };
        self.runtime.block_on(session.probe())?;

        tracing::info!("Joined session at {}", session.endpoint);
        Ok(WhipSession {
            inner: Arc::new(session),
        })
    }
}

struct PublishedTrack {
    kind: MediaKind,
    peer: Arc<RTCPeerConnection>,
    track: LocalTrack,
    closing: Arc<AtomicBool>,
}

struct SessionInner {
    runtime: Handle,
    client: reqwest::Client,
    endpoint: Url,
    credential: String,
    api: Arc<API>,
    ice_servers: Vec<String>,
    events: ControlSender,
    published: Mutex<HashMap<String, PublishedTrack>>,
    disconnected: AtomicBool,
}

impl SessionInner {
    /// Checks that the endpoint is reachable and accepts the credential
    async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .request(reqwest::Method::OPTIONS, self.endpoint.clone())
            .bearer_auth(&self.credential)
            .send()
            .await
            .map_err(|e| DomainError::SessionJoinFailed(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Err(
                DomainError::SessionJoinFailed(format!("endpoint rejected credential: {}", status)),
            ),
            s if s.is_server_error() => Err(DomainError::SessionJoinFailed(format!(
                "endpoint unavailable: {}",
                status
            ))),
            _ => Ok(()),
        }
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = if self.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };
        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }

    async fn publish(&self, track: &LocalTrack, kind: MediaKind) -> Result<(String, PublishedTrack)> {
        let failed = |e: String| DomainError::PublishFailed(kind, e);

        let peer = Arc::new(
            self.api
                .new_peer_connection(self.rtc_configuration())
                .await
                .map_err(|e| failed(e.to_string()))?,
        );

        let closing = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closing);
        let events = self.events.clone();
        peer.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            tracing::debug!(kind = %kind, "Peer connection state changed: {}", state);
            let lost = matches!(
                state,
                RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
            );
            if lost && !flag.load(Ordering::SeqCst) {
                events.send(ControlEvent::SessionDisconnected(format!(
                    "{} peer connection {}",
                    kind, state
                )));
            }
            Box::pin(async {})
        }));

        match self.negotiate(&peer, track).await {
            Ok(resource) => Ok((
                resource.to_string(),
                PublishedTrack {
                    kind,
                    peer,
                    track: track.clone(),
                    closing,
                },
            )),
            Err(e) => {
                closing.store(true, Ordering::SeqCst);
                let _ = peer.close().await;
                Err(failed(e))
            }
        }
    }

    /// Offers the track to the endpoint and applies its answer
    async fn negotiate(
        &self,
        peer: &Arc<RTCPeerConnection>,
        track: &LocalTrack,
    ) -> std::result::Result<Url, String> {
        let sender = peer
            .add_track(track.inner() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| e.to_string())?;

        let feedback = track.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; RTCP_BUFFER_SIZE];
            while let Ok((packets, _)) = sender.read(&mut rtcp_buf).await {
                feedback.handle_feedback(&packets);
            }
        });

        let offer = peer.create_offer(None).await.map_err(|e| e.to_string())?;
        let mut gathering_complete = peer.gathering_complete_promise().await;
        peer.set_local_description(offer)
            .await
            .map_err(|e| e.to_string())?;
        wait_for_gathering(
            &mut gathering_complete,
            Duration::from_secs(ICE_GATHERING_TIMEOUT_SECS),
        )
        .await?;

        let local = peer
            .local_description()
            .await
            .ok_or_else(|| "no local description after ICE gathering".to_string())?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.credential)
            .header(CONTENT_TYPE, "application/sdp")
            .body(local.sdp)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status() != StatusCode::CREATED {
            return Err(format!("unexpected status {}", response.status()));
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| "answer has no Location header".to_string())?;
        let resource = response
            .url()
            .join(location)
            .map_err(|e| format!("invalid Location {}: {}", location, e))?;

        let sdp = response.text().await.map_err(|e| e.to_string())?;
        let answer = RTCSessionDescription::answer(sdp).map_err(|e| e.to_string())?;
        peer.set_remote_description(answer)
            .await
            .map_err(|e| e.to_string())?;

        Ok(resource)
    }

    async fn unpublish(&self, sid: &str) -> Result<()> {
        let Some(published) = self
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(sid)
        else {
            return Ok(());
        };

        published.closing.store(true, Ordering::SeqCst);
        published.track.close();

        let deleted = match Url::parse(sid) {
            Ok(resource) => self
                .client
                .delete(resource)
                .bearer_auth(&self.credential)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        if let Err(e) = published.peer.close().await {
            tracing::debug!(kind = %published.kind, "Peer connection close failed: {}", e);
        }

        deleted.map_err(|e| DomainError::UnpublishFailed(sid.to_string(), e))
    }

    fn published_sids(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// Waits until the gathering promise resolves, which drops its sender
async fn wait_for_gathering(
    done: &mut mpsc::Receiver<()>,
    limit: Duration,
) -> std::result::Result<(), String> {
    tokio::time::timeout(limit, done.recv())
        .await
        .map(|_| ())
        .map_err(|_| format!("ICE gathering did not complete within {:?}", limit))
}

/// WHIP publishing session; every method blocks on the shared runtime
pub struct WhipSession {
    inner: Arc<SessionInner>,
}

impl TransportSession for WhipSession {
    type Track = LocalTrack;

    fn publish_track(
        &self,
        track: &LocalTrack,
        kind: MediaKind,
        source: TrackSource,
    ) -> Result<Publication> {
        if self.inner.disconnected.load(Ordering::SeqCst) {
            return Err(DomainError::PublishFailed(
                kind,
                "session is disconnected".to_string(),
            ));
        }

        let (sid, published) = self.inner.runtime.block_on(self.inner.publish(track, kind))?;
        self.inner
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sid.clone(), published);

        Ok(Publication::new(sid, kind, source))
    }

    fn unpublish_track(&self, sid: &str) -> Result<()> {
        self.inner.runtime.block_on(self.inner.unpublish(sid))
    }

    fn disconnect(&self) {
        if self.inner.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }

        for sid in self.inner.published_sids() {
            if let Err(e) = self.inner.runtime.block_on(self.inner.unpublish(&sid)) {
                tracing::warn!("{}", e);
            }
        }
        tracing::info!("Disconnected from {}", self.inner.endpoint);
    }
}
