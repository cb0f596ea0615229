use tokio::sync::mpsc::UnboundedSender;

use super::events::SessionEvent;

/// Receiver side of the view layer
///
/// The session pushes every event through a sink; the view renders from it.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent) -> Result<(), String>;
}

/// Sink for headless sessions that nobody is watching
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: SessionEvent) -> Result<(), String> {
        Ok(())
    }
}

impl EventSink for UnboundedSender<SessionEvent> {
    fn emit(&self, event: SessionEvent) -> Result<(), String> {
        self.send(event).map_err(|e| e.to_string())
    }
}

/// Emit a session event, logging instead of failing when the view is gone
pub fn emit_event(sink: &dyn EventSink, event: SessionEvent) {
    let name = match &event {
        SessionEvent::StateChanged(_) => "session://state-changed",
        SessionEvent::ConnectionAlert { .. } => "connection://alert",
    };

    if let Err(e) = sink.emit(event) {
        tracing::warn!(target: "snap_translate::emit", event = name, error = %e, "failed to emit event");
    }
}
