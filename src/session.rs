//! Session progress broadcaster: ordered, replayable event logs fanned out
//! to any number of concurrently attached observers.
//!
//! ## State machine
//!
//! ```text
//! open ──(publish*)──▶ done ──(grace period)──▶ purged
//! ```
//!
//! Every session holds an append-only event log plus the set of live
//! observer channels. `publish` appends and fans out under one lock
//! acquisition, so observers attaching at any time see exactly the same
//! sequence: the full historical log first, then live events in strict
//! publish order. A session already marked done replays history and
//! closes the channel: nothing more will be published, so there is no
//! live attachment to keep.
//!
//! ## Why an explicit registry?
//!
//! The requirement is fast lookup plus automatic expiry without a
//! persistent store. The registry owns the only concurrently mutated
//! table in the crate and pairs it with an explicit eviction rule (purge
//! a fixed grace period after `mark_done`), rather than letting a bare
//! process-wide map grow without lifecycle rules. Nothing survives a
//! process restart by design.

use crate::progress::{ProgressEvent, ProgressSink};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

/// Opaque, unguessable session identifier.
pub type SessionId = Uuid;

/// Errors surfaced to callers holding a stale or invented session id.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session was purged, or never existed. Reported as a not-found
    /// condition; there is no internal retry.
    #[error("unknown session: {0}")]
    NotFound(SessionId),
}

struct Session {
    log: Vec<ProgressEvent>,
    observers: Vec<mpsc::UnboundedSender<ProgressEvent>>,
    done: bool,
    created_at: Instant,
}

/// Concurrency-safe registry of conversion sessions.
///
/// Cheap to clone; all clones share one table. Sessions are purged a
/// fixed grace period after [`mark_done`](Self::mark_done), bounding
/// memory regardless of whether clients ever reconnect.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<SessionId, Session>>>,
    grace: Duration,
}

impl SessionRegistry {
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            grace,
        }
    }

    // A poisoned lock only means a publisher panicked mid-append; the
    // table itself is still structurally valid.
    fn table(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new session and return its identifier.
    pub fn create_session(&self) -> SessionId {
        let id = Uuid::new_v4();
        self.table().insert(
            id,
            Session {
                log: Vec::new(),
                observers: Vec::new(),
                done: false,
                created_at: Instant::now(),
            },
        );
        debug!("session {id} created");
        id
    }

    /// Append `event` to the session log and fan it out to every live
    /// observer. Observers whose receiver has gone away are detached
    /// without affecting the log or the remaining observers.
    pub fn publish(&self, id: SessionId, event: ProgressEvent) -> Result<(), SessionError> {
        let mut table = self.table();
        let session = table.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.log.push(event.clone());
        session
            .observers
            .retain(|tx| tx.send(event.clone()).is_ok());
        Ok(())
    }

    /// Attach an observer: replays all past events, then delivers live
    /// events in publish order. For a session already marked done the
    /// returned stream yields the full history and then ends.
    pub fn subscribe(
        &self,
        id: SessionId,
    ) -> Result<UnboundedReceiverStream<ProgressEvent>, SessionError> {
        let mut table = self.table();
        let session = table.get_mut(&id).ok_or(SessionError::NotFound(id))?;

        let (tx, rx) = mpsc::unbounded_channel();
        for event in &session.log {
            // The receiver cannot be dropped yet; ignore is for symmetry.
            let _ = tx.send(event.clone());
        }
        if !session.done {
            session.observers.push(tx);
        }
        Ok(UnboundedReceiverStream::new(rx))
    }

    /// Mark the session complete: closes every live observer stream and
    /// schedules the session for purge after the grace period.
    ///
    /// Must be called from within a tokio runtime (the purge timer is a
    /// spawned task).
    pub fn mark_done(&self, id: SessionId) -> Result<(), SessionError> {
        {
            let mut table = self.table();
            let session = table.get_mut(&id).ok_or(SessionError::NotFound(id))?;
            session.done = true;
            session.observers.clear();
            debug!(
                "session {id} done after {:?}, purge in {:?}",
                session.created_at.elapsed(),
                self.grace
            );
        }

        let registry = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(registry.grace).await;
            registry.table().remove(&id);
            debug!("session {id} purged");
        });
        Ok(())
    }

    /// Whether the session still exists (open, or done within its grace
    /// period).
    pub fn contains(&self, id: SessionId) -> bool {
        self.table().contains_key(&id)
    }
}

/// Adapter delivering pipeline events into one session of a registry.
///
/// This is what decouples the pipeline from the transport: the pipeline
/// only sees a [`ProgressSink`], and subscribers only see the registry.
pub struct SessionSink {
    registry: SessionRegistry,
    id: SessionId,
}

impl SessionSink {
    pub fn new(registry: &SessionRegistry, id: SessionId) -> Self {
        Self {
            registry: registry.clone(),
            id,
        }
    }
}

impl ProgressSink for SessionSink {
    fn publish(&self, event: ProgressEvent) {
        if let Err(e) = self.registry.publish(self.id, event) {
            // The session was purged under the publisher; the event is
            // dropped, the conversion itself is unaffected.
            warn!("dropping progress event: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Duration::from_secs(60))
    }

    fn log_messages(events: &[ProgressEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                ProgressEvent::Log { message } => message.clone(),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn live_subscriber_sees_publish_order() {
        let reg = registry();
        let id = reg.create_session();
        let stream = reg.subscribe(id).unwrap();

        for i in 0..5 {
            reg.publish(id, ProgressEvent::log(format!("line {i}"))).unwrap();
        }
        reg.mark_done(id).unwrap();

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            log_messages(&events),
            vec!["line 0", "line 1", "line 2", "line 3", "line 4"]
        );
    }

    #[tokio::test]
    async fn late_subscriber_replay_equals_live_sequence() {
        let reg = registry();
        let id = reg.create_session();
        let live = reg.subscribe(id).unwrap();

        reg.publish(id, ProgressEvent::log("a")).unwrap();
        reg.publish(id, ProgressEvent::log("b")).unwrap();

        // attaches mid-stream: history first, then live events
        let mid = reg.subscribe(id).unwrap();
        reg.publish(id, ProgressEvent::log("c")).unwrap();
        reg.mark_done(id).unwrap();

        // attaches after completion: replay then close
        let late = reg.subscribe(id).unwrap();

        let live: Vec<_> = live.collect().await;
        let mid: Vec<_> = mid.collect().await;
        let late: Vec<_> = late.collect().await;
        assert_eq!(log_messages(&live), log_messages(&late));
        assert_eq!(log_messages(&mid), log_messages(&late));
        assert_eq!(log_messages(&late), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn dropped_observer_does_not_disturb_others() {
        let reg = registry();
        let id = reg.create_session();
        let kept = reg.subscribe(id).unwrap();
        let dropped = reg.subscribe(id).unwrap();
        drop(dropped);

        reg.publish(id, ProgressEvent::log("still here")).unwrap();
        reg.mark_done(id).unwrap();

        let events: Vec<_> = kept.collect().await;
        assert_eq!(log_messages(&events), vec!["still here"]);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let reg = registry();
        let ghost = Uuid::new_v4();
        assert!(matches!(
            reg.publish(ghost, ProgressEvent::log("x")),
            Err(SessionError::NotFound(_))
        ));
        assert!(reg.subscribe(ghost).is_err());
        assert!(reg.mark_done(ghost).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn done_session_is_purged_after_grace() {
        let reg = SessionRegistry::new(Duration::from_secs(30));
        let id = reg.create_session();
        reg.publish(id, ProgressEvent::log("x")).unwrap();
        reg.mark_done(id).unwrap();

        // still subscribable inside the grace window
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(reg.contains(id));
        let replay: Vec<_> = reg.subscribe(id).unwrap().collect().await;
        assert_eq!(replay.len(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!reg.contains(id));
        assert!(reg.subscribe(id).is_err());
    }

    #[tokio::test]
    async fn session_sink_publishes_into_registry() {
        let reg = registry();
        let id = reg.create_session();
        let sink = SessionSink::new(&reg, id);

        sink.publish(ProgressEvent::log("via sink"));
        reg.mark_done(id).unwrap();

        let events: Vec<_> = reg.subscribe(id).unwrap().collect().await;
        assert_eq!(log_messages(&events), vec!["via sink"]);
    }

    #[tokio::test]
    async fn sink_swallows_publishes_to_purged_sessions() {
        let reg = registry();
        let id = reg.create_session();
        let sink = SessionSink::new(&reg, id);
        reg.table().remove(&id);
        // must not panic or error; the event is simply dropped
        sink.publish(ProgressEvent::log("into the void"));
    }
}
