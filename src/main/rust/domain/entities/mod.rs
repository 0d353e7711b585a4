mod bridge_lifecycle;

pub use bridge_lifecycle::{BridgeLifecycle, StateTransition};
