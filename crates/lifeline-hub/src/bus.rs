// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message bus: persist, then deliver to a room.
//!
//! Delivery is two-tier. Every session attached to the room gets the message,
//! then every online participant whose session was not among those gets it
//! directly. Room membership can lag presence (a reconnect opens a new session
//! that no room knows about yet); the second tier covers that gap.
//!
//! Sends to one room are serialized so that persisted order, timestamp order,
//! and delivery order agree. Different rooms proceed independently.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error};

use lifeline_core::types::{new_id, now_timestamp};
use lifeline_core::{Identity, LifelineError, Message, ServerEvent, StorageAdapter};

use crate::presence::PresenceRegistry;
use crate::rooms::{extract_participants, RoomRouter};
use crate::transport::SessionHub;

/// Last timestamp issued in a room. `None` until read back from storage.
type RoomClock = Arc<Mutex<Option<String>>>;

pub struct MessageBus {
    storage: Arc<dyn StorageAdapter>,
    router: Arc<RoomRouter>,
    presence: Arc<PresenceRegistry>,
    transport: Arc<SessionHub>,
    clocks: DashMap<String, RoomClock>,
}

/// A timestamp strictly after `last`, as close to now as possible.
fn next_timestamp(last: Option<&str>) -> String {
    let now = now_timestamp();
    let Some(last) = last else {
        return now;
    };
    if now.as_str() > last {
        return now;
    }
    match DateTime::parse_from_rfc3339(last) {
        Ok(parsed) => (parsed.with_timezone(&Utc) + Duration::microseconds(1))
            .to_rfc3339_opts(SecondsFormat::Micros, true),
        Err(_) => now,
    }
}

impl MessageBus {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        router: Arc<RoomRouter>,
        presence: Arc<PresenceRegistry>,
        transport: Arc<SessionHub>,
    ) -> Self {
        Self {
            storage,
            router,
            presence,
            transport,
            clocks: DashMap::new(),
        }
    }

    fn clock(&self, room_id: &str) -> RoomClock {
        self.clocks
            .entry(room_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Drop the clocks of rooms nobody is sending to. A dropped clock is
    /// re-read from storage on the next send, so ordering survives.
    pub fn forget_rooms(&self, room_ids: &[String]) {
        for room_id in room_ids {
            if self
                .clocks
                .remove_if(room_id, |_, clock| Arc::strong_count(clock) == 1)
                .is_some()
            {
                debug!(room_id = %room_id, "room clock dropped");
            }
        }
    }

    #[cfg(test)]
    fn clock_count(&self) -> usize {
        self.clocks.len()
    }

    /// Persist a message and deliver it to every online participant.
    ///
    /// Nothing is delivered unless the append succeeded.
    pub async fn send(
        &self,
        room_id: &str,
        sender: &Identity,
        body: &str,
    ) -> Result<Message, LifelineError> {
        if room_id.trim().is_empty() {
            return Err(LifelineError::InvalidInput("room_id is required".into()));
        }
        if body.trim().is_empty() {
            return Err(LifelineError::InvalidInput("message is required".into()));
        }
        let participants = extract_participants(room_id)?;

        let clock = self.clock(room_id);
        let mut last = clock.lock().await;
        if last.is_none() {
            *last = self.storage.last_message_timestamp(room_id).await?;
        }

        let message = Message {
            id: new_id(),
            room_id: room_id.to_string(),
            sender_id: sender.user_id.clone(),
            sender_name: sender.username.clone(),
            sender_role: sender.role,
            body: body.to_string(),
            timestamp: next_timestamp(last.as_deref()),
        };
        if let Err(e) = self.storage.append_message(&message).await {
            error!(room_id, error = %e, "message append failed, nothing delivered");
            return Err(e);
        }
        *last = Some(message.timestamp.clone());

        let event = ServerEvent::NewMessage(message.clone());
        let (via_room, direct) = self.deliver(room_id, &participants, &event, None).await;
        debug!(room_id, message_id = %message.id, via_room, direct, "message delivered");

        drop(last);
        drop(clock);
        if self.router.sessions_in(room_id).is_empty() {
            self.forget_rooms(&[room_id.to_string()]);
        }
        Ok(message)
    }

    /// Relay a typing indicator to the room, excluding every session of the
    /// typist (a superseded tab may still be attached).
    pub async fn typing(
        &self,
        room_id: &str,
        user: &Identity,
        session_id: &str,
        is_typing: bool,
    ) -> Result<(), LifelineError> {
        let participants = extract_participants(room_id)?;
        let event = ServerEvent::UserTyping {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            room_id: room_id.to_string(),
            is_typing,
        };
        let (via_room, direct) = self
            .deliver(room_id, &participants, &event, Some(user.user_id.as_str()))
            .await;
        debug!(room_id, session_id, via_room, direct, "typing relayed");
        Ok(())
    }

    /// Room tier then direct tier. Returns how many sessions each reached.
    /// Sessions belonging to `exclude_user` are skipped in both tiers.
    async fn deliver(
        &self,
        room_id: &str,
        participants: &[String],
        event: &ServerEvent,
        exclude_user: Option<&str>,
    ) -> (usize, usize) {
        let mut covered: HashSet<String> = HashSet::new();
        let mut via_room = 0;
        for session_id in self.router.sessions_in(room_id) {
            if exclude_user.is_some()
                && self.transport.owner(&session_id).as_deref() == exclude_user
            {
                continue;
            }
            if self.transport.deliver(&session_id, event.clone()) {
                via_room += 1;
            }
            covered.insert(session_id);
        }

        let mut direct = 0;
        for user_id in participants {
            if exclude_user == Some(user_id.as_str()) {
                continue;
            }
            let Some(session_id) = self.presence.lookup_session(user_id).await else {
                continue;
            };
            if covered.contains(&session_id) {
                continue;
            }
            if self.transport.deliver(&session_id, event.clone()) {
                direct += 1;
            }
        }
        (via_room, direct)
    }

    /// Every message in the room, oldest first.
    pub async fn history(&self, room_id: &str) -> Result<Vec<Message>, LifelineError> {
        extract_participants(room_id)?;
        self.storage.messages_for_room(room_id).await
    }
}
