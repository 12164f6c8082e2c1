// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence registry: which users are online and through which session.
//!
//! Each user has a single active session (last writer wins). Register and
//! unregister for the same user are serialized by a per-user async lock, and
//! a disconnect from a session that is no longer the active one is ignored.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use lifeline_core::types::now_timestamp;
use lifeline_core::{Identity, LifelineError, PresenceRecord, StorageAdapter};

/// Receives presence transitions after they are persisted.
#[async_trait]
pub trait PresenceObserver: Send + Sync {
    async fn presence_changed(&self, user: &Identity, online: bool);
}

type Slot = Arc<Mutex<Option<PresenceRecord>>>;

pub struct PresenceRegistry {
    storage: Arc<dyn StorageAdapter>,
    observer: Arc<dyn PresenceObserver>,
    records: DashMap<String, Slot>,
}

impl PresenceRegistry {
    pub fn new(storage: Arc<dyn StorageAdapter>, observer: Arc<dyn PresenceObserver>) -> Self {
        Self {
            storage,
            observer,
            records: DashMap::new(),
        }
    }

    fn slot(&self, user_id: &str) -> Slot {
        self.records
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Mark the user online through `session_id`, replacing any prior session.
    pub async fn register(&self, user: &Identity, session_id: &str) -> Result<(), LifelineError> {
        let slot = self.slot(&user.user_id);
        let mut current = slot.lock().await;

        let record = PresenceRecord {
            user_id: user.user_id.clone(),
            online: true,
            last_seen: now_timestamp(),
            active_session_id: Some(session_id.to_string()),
        };
        self.storage.save_presence(&record).await?;
        if let Some(previous) = current.as_ref().and_then(|r| r.active_session_id.as_deref()) {
            debug!(user_id = %user.user_id, previous, session_id, "session superseded");
        }
        *current = Some(record);

        info!(user_id = %user.user_id, session_id, "user online");
        self.observer.presence_changed(user, true).await;
        Ok(())
    }

    /// Mark the user offline, but only if `session_id` is still the active one.
    /// Returns whether the user went offline.
    pub async fn unregister(&self, user: &Identity, session_id: &str) -> Result<bool, LifelineError> {
        let slot = self.slot(&user.user_id);
        let mut current = slot.lock().await;

        let is_active = current
            .as_ref()
            .and_then(|r| r.active_session_id.as_deref())
            == Some(session_id);
        if !is_active {
            debug!(user_id = %user.user_id, session_id, "stale session disconnect ignored");
            return Ok(false);
        }

        let record = PresenceRecord {
            user_id: user.user_id.clone(),
            online: false,
            last_seen: now_timestamp(),
            active_session_id: None,
        };
        self.storage.save_presence(&record).await?;
        *current = Some(record);

        info!(user_id = %user.user_id, session_id, "user offline");
        self.observer.presence_changed(user, false).await;
        Ok(true)
    }

    /// The user's live session id, if online.
    pub async fn lookup_session(&self, user_id: &str) -> Option<String> {
        let slot = self.records.get(user_id).map(|s| s.value().clone())?;
        let current = slot.lock().await;
        current
            .as_ref()
            .filter(|r| r.online)
            .and_then(|r| r.active_session_id.clone())
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.lookup_session(user_id).await.is_some()
    }

    /// Ids of every user currently online, sorted.
    pub async fn online_users(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut online = Vec::new();
        for (user_id, slot) in slots {
            if slot.lock().await.as_ref().is_some_and(|r| r.online) {
                online.push(user_id);
            }
        }
        online.sort();
        online
    }
}
