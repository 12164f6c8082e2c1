// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live session table: one bounded outbound queue per transport connection.
//!
//! Delivery never waits on a recipient. A full queue drops the event for that
//! session only, so one stalled client cannot hold up anyone else.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use lifeline_core::ServerEvent;

struct SessionEntry {
    user_id: String,
    tx: mpsc::Sender<ServerEvent>,
}

/// Maps session ids to their owning user and outbound event queue.
pub struct SessionHub {
    sessions: DashMap<String, SessionEntry>,
    buffer: usize,
}

impl SessionHub {
    /// Create a hub whose per-session queues hold `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a session for `user_id` and return the receiving end of its
    /// queue.
    ///
    /// Re-opening an existing id replaces (and thereby closes) the old queue.
    pub fn open_session(&self, session_id: &str, user_id: &str) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.sessions.insert(
            session_id.to_string(),
            SessionEntry {
                user_id: user_id.to_string(),
                tx,
            },
        );
        debug!(session_id, user_id, "session opened");
        rx
    }

    /// Drop a session's queue. Returns whether it was open.
    pub fn close_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id, "session closed");
        }
        removed
    }

    pub fn is_live(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|entry| !entry.tx.is_closed())
    }

    /// The user a session was opened for.
    pub fn owner(&self, session_id: &str) -> Option<String> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.user_id.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Push one event to one session without waiting. Returns whether the
    /// event was queued.
    pub fn deliver(&self, session_id: &str, event: ServerEvent) -> bool {
        let outcome = match self.sessions.get(session_id) {
            Some(entry) => entry.tx.try_send(event),
            None => {
                debug!(session_id, "delivery to unknown session skipped");
                return false;
            }
        };
        match outcome {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(session_id, event = event.name(), "session queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.sessions.remove(session_id);
                debug!(session_id, "session receiver gone, removed");
                false
            }
        }
    }

    /// Push an event to every open session. Returns how many accepted it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let targets: Vec<String> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        targets
            .iter()
            .filter(|id| self.deliver(id, event.clone()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(id: &str) -> ServerEvent {
        ServerEvent::RequestResolved {
            request_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn deliver_reaches_open_session() {
        let hub = SessionHub::new(4);
        let mut rx = hub.open_session("s1", "v1");
        assert!(hub.deliver("s1", resolved("r1")));
        assert_eq!(rx.recv().await.unwrap(), resolved("r1"));
        assert!(!hub.deliver("nope", resolved("r1")));
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking_others() {
        let hub = SessionHub::new(1);
        let _slow = hub.open_session("slow", "v1");
        let mut fast = hub.open_session("fast", "v2");

        assert_eq!(hub.broadcast(&resolved("r1")), 2);
        assert_eq!(fast.recv().await.unwrap(), resolved("r1"));
        // "slow" never drains; its second event is dropped.
        assert_eq!(hub.broadcast(&resolved("r2")), 1);
        assert_eq!(fast.recv().await.unwrap(), resolved("r2"));
    }

    #[tokio::test]
    async fn closed_receiver_is_pruned() {
        let hub = SessionHub::new(4);
        let rx = hub.open_session("s1", "v1");
        drop(rx);
        assert!(!hub.is_live("s1"));
        assert!(!hub.deliver("s1", resolved("r1")));
        assert_eq!(hub.session_count(), 0);
    }

    #[tokio::test]
    async fn sessions_remember_their_owner() {
        let hub = SessionHub::new(4);
        let _a = hub.open_session("a", "vol1");
        let _b = hub.open_session("b", "vol1");
        assert_eq!(hub.owner("a").as_deref(), Some("vol1"));
        assert_eq!(hub.owner("b").as_deref(), Some("vol1"));
        assert!(hub.owner("c").is_none());

        assert!(hub.close_session("a"));
        assert!(!hub.close_session("a"));
        assert!(hub.owner("a").is_none());
    }
}
