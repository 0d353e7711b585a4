mod bridge_state;
mod control_event;
mod media_kind;
mod mime_registry;
mod publisher_config;

pub use bridge_state::BridgeState;
pub use control_event::{BusMessage, ControlEvent};
pub use media_kind::{MediaKind, TrackSource};
pub use mime_registry::{MimeEntry, MimeRegistry};
pub use publisher_config::PublisherConfig;
