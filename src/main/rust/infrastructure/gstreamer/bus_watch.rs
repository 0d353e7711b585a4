use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use gstreamer::prelude::*;

use crate::domain::ports::ControlSender;
use crate::domain::value_objects::{BusMessage, ControlEvent};

/// Timeout for bus polling (100ms allows responsive shutdown)
const BUS_POLL_TIMEOUT_MS: u64 = 100;

/// Forwards pipeline bus messages to the publisher on a dedicated thread
pub struct BusWatch {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BusWatch {
    pub fn spawn(bus: gstreamer::Bus, events: ControlSender) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("bus-watch".to_string())
            .spawn(move || {
                let timeout = gstreamer::ClockTime::from_mseconds(BUS_POLL_TIMEOUT_MS);
                while flag.load(Ordering::SeqCst) {
                    if let Some(msg) = bus.timed_pop(timeout) {
                        events.send(ControlEvent::Bus(classify(&msg)));
                    }
                }
                tracing::debug!("Bus watch stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stops polling and waits for the thread; safe to call more than once
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Bus watch thread panicked");
            }
        }
    }
}

impl Drop for BusWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reduces a bus message to the publisher's view of it
pub fn classify(msg: &gstreamer::Message) -> BusMessage {
    use gstreamer::MessageView;

    let source = || {
        msg.src()
            .map(|s| s.path_string().to_string())
            .unwrap_or_default()
    };

    match msg.view() {
        MessageView::Eos(_) => BusMessage::EndOfStream,
        MessageView::Error(err) => BusMessage::Error {
            source: source(),
            message: err.error().to_string(),
            debug: err.debug().map(|d| d.to_string()),
        },
        MessageView::Warning(warn) => BusMessage::Warning {
            source: source(),
            message: warn.error().to_string(),
        },
        MessageView::Tag(_) => BusMessage::Informational("tag"),
        MessageView::StateChanged(_) => BusMessage::Informational("state-changed"),
        MessageView::Latency(_) => BusMessage::Informational("latency"),
        MessageView::AsyncDone(_) => BusMessage::Informational("async-done"),
        MessageView::StreamStatus(_) => BusMessage::Informational("stream-status"),
        MessageView::Element(_) => BusMessage::Informational("element"),
        _ => BusMessage::Unrecognized(format!("{:?}", msg.type_())),
    }
}
