use crate::domain::errors::{DomainError, Result};

use super::MediaKind;

/// Mapping between a GStreamer caps name and the WebRTC codec mime type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimeEntry {
    pipeline_mime: &'static str,
    transport_mime: &'static str,
    kind: MediaKind,
    byte_stream: bool,
}

impl MimeEntry {
    const fn new(
        pipeline_mime: &'static str,
        transport_mime: &'static str,
        kind: MediaKind,
        byte_stream: bool,
    ) -> Self {
        Self {
            pipeline_mime,
            transport_mime,
            kind,
            byte_stream,
        }
    }

    pub fn pipeline_mime(&self) -> &'static str {
        self.pipeline_mime
    }

    pub fn transport_mime(&self) -> &'static str {
        self.transport_mime
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Whether the sink must request Annex B byte-stream framing
    pub fn requires_byte_stream(&self) -> bool {
        self.byte_stream
    }

    /// RTP clock rate for the transport codec
    pub fn clock_rate(&self) -> u32 {
        match self.kind {
            MediaKind::Audio => 48_000,
            MediaKind::Video => 90_000,
        }
    }

    pub fn channels(&self) -> u16 {
        match self.kind {
            MediaKind::Audio => 2,
            MediaKind::Video => 0,
        }
    }
}

const AUDIO_ENTRIES: &[MimeEntry] = &[MimeEntry::new(
    "audio/x-opus",
    "audio/opus",
    MediaKind::Audio,
    false,
)];

const VIDEO_ENTRIES: &[MimeEntry] = &[
    MimeEntry::new("video/x-h264", "video/H264", MediaKind::Video, true),
    MimeEntry::new("video/x-vp8", "video/VP8", MediaKind::Video, false),
    MimeEntry::new("video/x-vp9", "video/VP9", MediaKind::Video, false),
    MimeEntry::new("video/x-av1", "video/AV1", MediaKind::Video, false),
];

/// Read-only registry of the encodings the publisher can forward
pub struct MimeRegistry;

impl MimeRegistry {
    pub fn audio() -> &'static [MimeEntry] {
        AUDIO_ENTRIES
    }

    pub fn video() -> &'static [MimeEntry] {
        VIDEO_ENTRIES
    }

    /// Audio entries are checked before video entries
    pub fn lookup(pipeline_mime: &str) -> Option<&'static MimeEntry> {
        AUDIO_ENTRIES
            .iter()
            .chain(VIDEO_ENTRIES.iter())
            .find(|entry| entry.pipeline_mime == pipeline_mime)
    }

    pub fn resolve(pipeline_mime: &str) -> Result<&'static MimeEntry> {
        Self::lookup(pipeline_mime)
            .ok_or_else(|| DomainError::UnsupportedMime(pipeline_mime.to_string()))
    }
}
