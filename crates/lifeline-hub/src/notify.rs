// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort fan-out of lifecycle and presence events.
//!
//! Notifications go to a user's live session or nowhere: there is no queue
//! for offline users and no replay. Chat content has its own stronger
//! delivery path in the message bus.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::debug;

use lifeline_core::{Identity, ServerEvent, StorageAdapter};

use crate::presence::{PresenceObserver, PresenceRegistry};
use crate::transport::SessionHub;

pub struct NotificationDispatcher {
    transport: Arc<SessionHub>,
    presence: Arc<PresenceRegistry>,
}

impl NotificationDispatcher {
    /// Build the dispatcher together with the presence registry it reads.
    ///
    /// The registry reports its transitions back through
    /// [`broadcast_presence_change`](Self::broadcast_presence_change) via a
    /// weak handle, so the pair does not keep itself alive.
    pub fn with_presence(storage: Arc<dyn StorageAdapter>, transport: Arc<SessionHub>) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let observer: Arc<dyn PresenceObserver> = Arc::new(me.clone());
            Self {
                transport,
                presence: Arc::new(PresenceRegistry::new(storage, observer)),
            }
        })
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    /// Deliver `event` to the user's live session. Returns whether it was
    /// queued; an offline user simply misses it.
    pub async fn notify(&self, user_id: &str, event: ServerEvent) -> bool {
        match self.presence.lookup_session(user_id).await {
            Some(session_id) => self.transport.deliver(&session_id, event),
            None => {
                debug!(user_id, event = event.name(), "user offline, notification dropped");
                false
            }
        }
    }

    /// Notify several users with the same event. Returns how many received it.
    pub async fn notify_all<'a, I>(&self, user_ids: I, event: &ServerEvent) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut reached = 0;
        for user_id in user_ids {
            if self.notify(user_id, event.clone()).await {
                reached += 1;
            }
        }
        reached
    }

    /// Tell every connected session that `user` came online or went offline.
    pub fn broadcast_presence_change(&self, user: &Identity, online: bool) -> usize {
        let event = ServerEvent::PresenceChanged {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            role: user.role,
            online,
        };
        let reached = self.transport.broadcast(&event);
        debug!(user_id = %user.user_id, online, reached, "presence announced");
        reached
    }
}

#[async_trait]
impl PresenceObserver for Weak<NotificationDispatcher> {
    async fn presence_changed(&self, user: &Identity, online: bool) {
        if let Some(dispatcher) = self.upgrade() {
            dispatcher.broadcast_presence_change(user, online);
        }
    }
}
