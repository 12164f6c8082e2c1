// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room identifiers and room membership.
//!
//! A room id is `tag + "_" + sorted(participants).join("_")`. Participant ids
//! may not contain `_`, so the first segment is always the tag and the rest
//! are exactly the participants; derivation and extraction are inverses.
//!
//! ```text
//! derive({"u2", "u1"}, private)  ->  "private_u1_u2"
//! extract("conflict_admin1_vol1") ->  ["admin1", "vol1"]
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use lifeline_core::{Identity, LifelineError, StorageAdapter, User};

use crate::presence::PresenceRegistry;
use crate::transport::SessionHub;

/// Separator between the tag and each participant id.
pub const SEPARATOR: char = '_';

/// Purpose of a room. Each tag owns a distinct id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomTag {
    /// One-to-one conversation (victim and volunteer, or any two users).
    Private,
    /// Escalation room between a volunteer and an admin.
    Conflict,
}

impl RoomTag {
    pub const ALL: [RoomTag; 2] = [RoomTag::Private, RoomTag::Conflict];

    pub fn as_str(self) -> &'static str {
        match self {
            RoomTag::Private => "private",
            RoomTag::Conflict => "conflict",
        }
    }

    /// Number of distinct participants a room with this tag holds.
    pub fn arity(self) -> usize {
        match self {
            RoomTag::Private | RoomTag::Conflict => 2,
        }
    }
}

impl fmt::Display for RoomTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomTag {
    type Err = LifelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoomTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| LifelineError::InvalidInput(format!("unknown room tag `{s}`")))
    }
}

fn check_participant(id: &str) -> Result<(), LifelineError> {
    if id.is_empty() {
        return Err(LifelineError::InvalidInput(
            "participant id must not be empty".into(),
        ));
    }
    if id.contains(SEPARATOR) {
        return Err(LifelineError::InvalidInput(format!(
            "participant id `{id}` must not contain `{SEPARATOR}`"
        )));
    }
    Ok(())
}

/// Build the room id for a participant set. Order of `participants` does not
/// matter and duplicates collapse.
pub fn derive_room_id(participants: &[&str], tag: RoomTag) -> Result<String, LifelineError> {
    let mut ids: Vec<&str> = participants.to_vec();
    ids.sort_unstable();
    ids.dedup();
    for id in &ids {
        check_participant(id)?;
    }
    if ids.len() != tag.arity() {
        return Err(LifelineError::InvalidInput(format!(
            "a {tag} room needs {} distinct participants, got {}",
            tag.arity(),
            ids.len()
        )));
    }

    let mut room_id = String::from(tag.as_str());
    for id in ids {
        room_id.push(SEPARATOR);
        room_id.push_str(id);
    }
    Ok(room_id)
}

/// Split a room id into its tag and sorted participant ids.
pub fn parse_room_id(room_id: &str) -> Result<(RoomTag, Vec<String>), LifelineError> {
    let mut segments = room_id.split(SEPARATOR);
    let tag: RoomTag = segments.next().unwrap_or_default().parse()?;
    let participants: Vec<String> = segments.map(str::to_string).collect();

    let well_formed = participants.len() == tag.arity()
        && participants.iter().all(|p| !p.is_empty())
        && participants.windows(2).all(|w| w[0] < w[1]);
    if !well_formed {
        return Err(LifelineError::InvalidInput(format!(
            "malformed room id `{room_id}`"
        )));
    }
    Ok((tag, participants))
}

/// Participant ids encoded in a room id.
pub fn extract_participants(room_id: &str) -> Result<Vec<String>, LifelineError> {
    parse_room_id(room_id).map(|(_, participants)| participants)
}

/// Tracks which live sessions are attached to which rooms.
pub struct RoomRouter {
    storage: Arc<dyn StorageAdapter>,
    presence: Arc<PresenceRegistry>,
    transport: Arc<SessionHub>,
    members: DashMap<String, HashSet<String>>,
    rooms_by_session: DashMap<String, HashSet<String>>,
}

impl RoomRouter {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        presence: Arc<PresenceRegistry>,
        transport: Arc<SessionHub>,
    ) -> Self {
        Self {
            storage,
            presence,
            transport,
            members: DashMap::new(),
            rooms_by_session: DashMap::new(),
        }
    }

    /// Attach a live session to a room so it receives the room's broadcasts.
    /// Idempotent. A session that is already closed is not attached and
    /// `false` is returned.
    pub fn attach_session(&self, room_id: &str, session_id: &str) -> bool {
        if !self.transport.is_live(session_id) {
            debug!(room_id, session_id, "closed session not attached");
            return false;
        }
        let added = self
            .members
            .entry(room_id.to_string())
            .or_default()
            .insert(session_id.to_string());
        self.rooms_by_session
            .entry(session_id.to_string())
            .or_default()
            .insert(room_id.to_string());

        // Disconnect closes the session before detaching it, so a close that
        // raced the insert above is visible here.
        if !self.transport.is_live(session_id) {
            self.detach_session(session_id);
            return false;
        }
        if added {
            debug!(room_id, session_id, "session attached");
        }
        true
    }

    /// Remove a session from every room it was attached to. Returns the rooms
    /// left with no sessions at all.
    pub fn detach_session(&self, session_id: &str) -> Vec<String> {
        let Some((_, rooms)) = self.rooms_by_session.remove(session_id) else {
            return Vec::new();
        };
        let mut emptied = Vec::new();
        for room_id in rooms {
            if let Some(mut sessions) = self.members.get_mut(&room_id) {
                sessions.remove(session_id);
            }
            if self
                .members
                .remove_if(&room_id, |_, sessions| sessions.is_empty())
                .is_some()
            {
                emptied.push(room_id);
            }
        }
        debug!(session_id, emptied = emptied.len(), "session detached from all rooms");
        emptied
    }

    /// Number of rooms with at least one attached session.
    pub fn room_count(&self) -> usize {
        self.members.len()
    }

    /// Sessions currently attached to a room.
    pub fn sessions_in(&self, room_id: &str) -> Vec<String> {
        self.members
            .get(room_id)
            .map(|sessions| sessions.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Derive a room for `participants` and attach every one of them that is
    /// online right now.
    pub async fn open_room(
        &self,
        participants: &[&str],
        tag: RoomTag,
    ) -> Result<String, LifelineError> {
        let room_id = derive_room_id(participants, tag)?;
        for user_id in participants {
            if let Some(session_id) = self.presence.lookup_session(user_id).await {
                self.attach_session(&room_id, &session_id);
            }
        }
        Ok(room_id)
    }

    /// Open the private room between `requester` and `target_id`.
    ///
    /// The requester's own session is attached, and the target's live session
    /// too when they are online, so they receive messages without joining.
    pub async fn join_requested(
        &self,
        requester: &Identity,
        requester_session: &str,
        target_id: &str,
    ) -> Result<(String, User), LifelineError> {
        if requester.user_id == target_id {
            return Err(LifelineError::InvalidInput(
                "cannot open a conversation with yourself".into(),
            ));
        }
        let target = self
            .storage
            .get_user(target_id)
            .await?
            .ok_or_else(|| LifelineError::not_found("user", target_id))?;

        let room_id = derive_room_id(
            &[requester.user_id.as_str(), target.id.as_str()],
            RoomTag::Private,
        )?;
        self.attach_session(&room_id, requester_session);
        if let Some(target_session) = self.presence.lookup_session(&target.id).await {
            self.attach_session(&room_id, &target_session);
        }
        Ok((room_id, target))
    }
}
