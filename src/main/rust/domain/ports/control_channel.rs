use tokio::sync::mpsc;

use crate::domain::value_objects::ControlEvent;

/// Creates the channel that carries callback events into the publisher
pub fn control_channel() -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlSender { tx }, ControlReceiver { rx })
}

/// Cloneable handle given to pipeline, track and session callbacks
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<ControlEvent>,
}

impl ControlSender {
    /// Events sent after the receiver is gone are dropped
    pub fn send(&self, event: ControlEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Control channel closed, dropping event");
        }
    }
}

#[derive(Debug)]
pub struct ControlReceiver {
    rx: mpsc::UnboundedReceiver<ControlEvent>,
}

impl ControlReceiver {
    /// Blocks the calling thread; must not be called from inside a tokio runtime
    pub fn recv_blocking(&mut self) -> Option<ControlEvent> {
        self.rx.blocking_recv()
    }

    pub fn try_recv(&mut self) -> Option<ControlEvent> {
        self.rx.try_recv().ok()
    }
}
