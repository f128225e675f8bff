//! Progress-sink abstraction for pipeline milestone events.
//!
//! The pipeline surfaces intermediate milestones during long blocking
//! operations through a [`ProgressSink`] passed into
//! [`crate::convert::convert_batch`].
//!
//! # Why a sink trait instead of channels?
//!
//! The sink is the least-invasive integration point: callers can forward
//! events to a session broadcaster, a WebSocket, a log file, or a terminal
//! without the pipeline knowing anything about how the host application
//! communicates. [`crate::session::SessionSink`] is the in-crate adapter
//! that forwards into a [`crate::session::SessionRegistry`]. The trait is
//! `Send + Sync` because chunk-level progress is reported from
//! concurrently running conversion futures.

use crate::output::BatchSummary;
use serde::{Deserialize, Serialize};

/// One event in a conversion session's ordered log.
///
/// Serialises to the wire shapes `{"type":"log","message":…}`,
/// `{"type":"result","data":…}` and `{"type":"error","message":…}`.
/// Events are append-only per session; their total order is the order of
/// publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Human-readable milestone line.
    Log { message: String },
    /// Terminal event of a successful batch: all per-file results + totals.
    Result { data: BatchSummary },
    /// Terminal event of a failed batch.
    Error { message: String },
}

impl ProgressEvent {
    /// Convenience constructor for log lines.
    pub fn log(message: impl Into<String>) -> Self {
        ProgressEvent::Log {
            message: message.into(),
        }
    }
}

/// Receives pipeline events as they are produced.
///
/// Implementations must be `Send + Sync`; `publish` may be called from
/// concurrently running futures and must not block for long (it runs on
/// the conversion path).
pub trait ProgressSink: Send + Sync {
    /// Deliver one event. Delivery failures are the sink's problem;
    /// the pipeline never aborts because an observer went away.
    fn publish(&self, event: ProgressEvent);
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn publish(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CollectingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for CollectingSink {
        fn publish(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn log_event_wire_shape() {
        let json = serde_json::to_value(ProgressEvent::log("converting a.pdf")).unwrap();
        assert_eq!(json["type"], "log");
        assert_eq!(json["message"], "converting a.pdf");
    }

    #[test]
    fn error_event_wire_shape() {
        let json = serde_json::to_value(ProgressEvent::Error {
            message: "conversion failed".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
    }

    #[test]
    fn sink_receives_in_publish_order() {
        let sink = CollectingSink {
            events: Mutex::new(Vec::new()),
        };
        sink.publish(ProgressEvent::log("one"));
        sink.publish(ProgressEvent::log("two"));
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ProgressEvent::Log { message } => assert_eq!(message, "one"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
