// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock client session for deterministic testing.
//!
//! `MockSession` stands where a WebSocket would: it owns a hub session, sends
//! [`ClientEvent`]s through the same dispatch path the gateway uses, and
//! captures every [`ServerEvent`] pushed to it for assertion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use lifeline_core::{ClientEvent, Identity, LifelineError, ServerEvent};
use lifeline_hub::{Connection, Hub};

/// How long `expect` waits for an event before giving up.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(2);

pub struct MockSession {
    hub: Arc<Hub>,
    identity: Identity,
    session_id: String,
    events: mpsc::Receiver<ServerEvent>,
    captured: Vec<ServerEvent>,
}

impl MockSession {
    /// Connect `identity` to the hub.
    pub async fn connect(hub: Arc<Hub>, identity: Identity) -> Result<Self, LifelineError> {
        let Connection { session_id, events } = hub.connect(&identity).await?;
        Ok(Self {
            hub,
            identity,
            session_id,
            events,
            captured: Vec::new(),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Dispatch a client frame as if it arrived on this session.
    pub async fn send(&self, event: ClientEvent) -> Result<(), LifelineError> {
        self.hub
            .handle_client_event(&self.identity, &self.session_id, event)
            .await
    }

    pub async fn join(&self, target_user_id: &str) -> Result<(), LifelineError> {
        self.send(ClientEvent::JoinChatRoom {
            target_user_id: target_user_id.to_string(),
        })
        .await
    }

    pub async fn say(&self, room_id: &str, message: &str) -> Result<(), LifelineError> {
        self.send(ClientEvent::SendMessage {
            room_id: room_id.to_string(),
            message: message.to_string(),
        })
        .await
    }

    pub async fn typing(&self, room_id: &str, is_typing: bool) -> Result<(), LifelineError> {
        self.send(ClientEvent::Typing {
            room_id: room_id.to_string(),
            is_typing,
        })
        .await
    }

    /// Move every queued event into the capture buffer and return the new ones.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut fresh = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            fresh.push(event);
        }
        self.captured.extend(fresh.iter().cloned());
        fresh
    }

    /// Wait for the next event named `name` (e.g. `"new_message"`), skipping
    /// others. Returns `None` on timeout or when the session is closed.
    pub async fn expect(&mut self, name: &str) -> Option<ServerEvent> {
        let deadline = tokio::time::Instant::now() + DEFAULT_WAIT;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .ok()??;
            self.captured.push(event.clone());
            if event.name() == name {
                return Some(event);
            }
        }
    }

    /// Every event received so far, in arrival order.
    pub fn captured(&self) -> &[ServerEvent] {
        &self.captured
    }

    /// Captured events named `name`.
    pub fn captured_named(&self, name: &str) -> Vec<&ServerEvent> {
        self.captured.iter().filter(|e| e.name() == name).collect()
    }

    pub fn clear_captured(&mut self) {
        self.captured.clear();
    }

    /// Close the session. Returns whether the user went offline.
    pub async fn disconnect(self) -> Result<bool, LifelineError> {
        self.hub.disconnect(&self.identity, &self.session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestHarness;

    #[tokio::test]
    async fn captures_presence_of_others() {
        let harness = TestHarness::builder()
            .with_standard_users()
            .build()
            .await
            .unwrap();
        let mut victim = harness.session("v1").await.unwrap();
        let _vol = harness.session("vol1").await.unwrap();

        victim.drain();
        let online = victim.captured_named("presence_changed");
        assert_eq!(online.len(), 2);
        match online[1] {
            ServerEvent::PresenceChanged { user_id, online, .. } => {
                assert_eq!(user_id, "vol1");
                assert!(*online);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn expect_times_out_without_event() {
        let harness = TestHarness::builder()
            .with_standard_users()
            .build()
            .await
            .unwrap();
        let mut victim = harness.session("v1").await.unwrap();
        victim.drain();
        assert!(victim.expect("new_message").await.is_none());
    }

    #[tokio::test]
    async fn disconnect_marks_offline() {
        let harness = TestHarness::builder()
            .with_standard_users()
            .build()
            .await
            .unwrap();
        let vol = harness.session("vol1").await.unwrap();
        assert!(harness.hub.presence().is_online("vol1").await);
        assert!(vol.disconnect().await.unwrap());
        assert!(!harness.hub.presence().is_online("vol1").await);
    }
}
