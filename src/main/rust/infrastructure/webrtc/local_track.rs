use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use webrtc::media::Sample;
use webrtc::rtcp::packet::Packet;
use webrtc::rtcp::payload_feedbacks::full_intra_request::FullIntraRequest;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::domain::errors::Result;
use crate::domain::ports::{SampleWriter, TrackFactory, WriteError};
use crate::domain::value_objects::{MediaKind, MimeEntry};

const STREAM_ID: &str = "pipeline-publisher";

/// Network track fed by a bridge, published over its own peer connection
#[derive(Clone)]
pub struct LocalTrack {
    inner: Arc<TrackLocalStaticSample>,
    kind: MediaKind,
    closed: Arc<AtomicBool>,
    runtime: Handle,
}

impl LocalTrack {
    pub fn new(entry: &'static MimeEntry, runtime: Handle) -> Self {
        let capability = RTCRtpCodecCapability {
            mime_type: entry.transport_mime().to_string(),
            clock_rate: entry.clock_rate(),
            channels: entry.channels(),
            sdp_fmtp_line: fmtp_line(entry.transport_mime()).to_string(),
            rtcp_feedback: vec![],
        };
        let inner = TrackLocalStaticSample::new(
            capability,
            entry.kind().as_str().to_string(),
            STREAM_ID.to_string(),
        );

        Self {
            inner: Arc::new(inner),
            kind: entry.kind(),
            closed: Arc::new(AtomicBool::new(false)),
            runtime,
        }
    }

    pub fn inner(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.inner)
    }

    /// Later writes report end-of-stream
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Receives RTCP read back from the sender of this track
    pub fn handle_feedback(&self, packets: &[Box<dyn Packet + Send + Sync>]) {
        for packet in packets {
            if let Some(request) = keyframe_request(packet.as_ref()) {
                tracing::debug!(kind = %self.kind, "Received {} from subscriber", request);
            }
        }
    }
}

impl SampleWriter for LocalTrack {
    fn write_sample(&self, data: &[u8], duration: Duration) -> std::result::Result<(), WriteError> {
        if self.is_closed() {
            return Err(WriteError::EndOfStream);
        }

        let sample = Sample {
            data: Bytes::copy_from_slice(data),
            duration,
            ..Default::default()
        };
        match self.runtime.block_on(self.inner.write_sample(&sample)) {
            Ok(()) => Ok(()),
            Err(webrtc::Error::ErrConnectionClosed) => Err(WriteError::EndOfStream),
            Err(e) => Err(WriteError::Failed(e.to_string())),
        }
    }
}

/// Names picture-loss and full-intra requests; other packets yield `None`
pub fn keyframe_request(packet: &(dyn Packet + Send + Sync)) -> Option<&'static str> {
    let any = packet.as_any();
    if any.downcast_ref::<PictureLossIndication>().is_some() {
        Some("PLI")
    } else if any.downcast_ref::<FullIntraRequest>().is_some() {
        Some("FIR")
    } else {
        None
    }
}

fn fmtp_line(transport_mime: &str) -> &'static str {
    match transport_mime {
        "video/H264" => "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f",
        "audio/opus" => "minptime=10;useinbandfec=1",
        _ => "",
    }
}

/// Allocates [`LocalTrack`]s bound to the shared runtime
pub struct WebRtcTrackFactory {
    runtime: Handle,
}

impl WebRtcTrackFactory {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl TrackFactory for WebRtcTrackFactory {
    type Track = LocalTrack;

    fn create_track(&self, entry: &'static MimeEntry) -> Result<LocalTrack> {
        tracing::debug!(
            kind = %entry.kind(),
            codec = entry.transport_mime(),
            "Creating local track"
        );
        Ok(LocalTrack::new(entry, self.runtime.clone()))
    }
}
