mod local_track;
mod whip_session;

pub use local_track::{keyframe_request, LocalTrack, WebRtcTrackFactory};
pub use whip_session::{WhipConnector, WhipSession, DEFAULT_ICE_SERVER};
