// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Lifeline hub: presence, rooms, chat delivery, and the help-request
//! lifecycle.
//!
//! [`Hub`] wires the components together and is the only type the gateway
//! talks to. Every component is constructed here and passed its
//! collaborators explicitly; nothing lives in process-global state.

pub mod bus;
pub mod notify;
pub mod presence;
pub mod requests;
pub mod rooms;
pub mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use lifeline_config::{ConflictAdminPolicy, LifelineConfig};
use lifeline_core::types::new_id;
use lifeline_core::{
    ClientEvent, HelpRequest, Identity, LifelineError, Message, RequestFilter, RequestStatus,
    Role, ServerEvent, StorageAdapter, User,
};

pub use bus::MessageBus;
pub use notify::NotificationDispatcher;
pub use presence::{PresenceObserver, PresenceRegistry};
pub use requests::HelpRequestMachine;
pub use rooms::{derive_room_id, extract_participants, parse_room_id, RoomRouter, RoomTag};
pub use transport::SessionHub;

/// Tunables the hub takes from configuration.
#[derive(Debug, Clone)]
pub struct HubOptions {
    pub session_buffer: usize,
    pub conflict_admin: ConflictAdminPolicy,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            session_buffer: 64,
            conflict_admin: ConflictAdminPolicy::default(),
        }
    }
}

impl From<&LifelineConfig> for HubOptions {
    fn from(config: &LifelineConfig) -> Self {
        Self {
            session_buffer: config.delivery.session_buffer,
            conflict_admin: config.routing.conflict_admin,
        }
    }
}

/// A registered live session and its outbound event stream.
#[derive(Debug)]
pub struct Connection {
    pub session_id: String,
    pub events: mpsc::Receiver<ServerEvent>,
}

pub struct Hub {
    storage: Arc<dyn StorageAdapter>,
    transport: Arc<SessionHub>,
    presence: Arc<PresenceRegistry>,
    router: Arc<RoomRouter>,
    bus: Arc<MessageBus>,
    requests: Arc<HelpRequestMachine>,
    notifier: Arc<NotificationDispatcher>,
}

impl Hub {
    pub fn new(storage: Arc<dyn StorageAdapter>, options: HubOptions) -> Self {
        let transport = Arc::new(SessionHub::new(options.session_buffer));
        let notifier = NotificationDispatcher::with_presence(storage.clone(), transport.clone());
        let presence = notifier.presence().clone();
        let router = Arc::new(RoomRouter::new(
            storage.clone(),
            presence.clone(),
            transport.clone(),
        ));
        let bus = Arc::new(MessageBus::new(
            storage.clone(),
            router.clone(),
            presence.clone(),
            transport.clone(),
        ));
        let requests = Arc::new(HelpRequestMachine::new(
            storage.clone(),
            router.clone(),
            presence.clone(),
            notifier.clone(),
            options.conflict_admin,
        ));
        Self {
            storage,
            transport,
            presence,
            router,
            bus,
            requests,
            notifier,
        }
    }

    /// Resolve an authenticated user id to its full identity.
    pub async fn identify(&self, user_id: &str) -> Result<Identity, LifelineError> {
        if user_id.trim().is_empty() {
            return Err(LifelineError::Unauthenticated("missing user id".into()));
        }
        self.storage
            .get_user(user_id)
            .await?
            .map(Identity::from)
            .ok_or_else(|| LifelineError::Unauthenticated(format!("unknown user {user_id}")))
    }

    /// Open a session for `identity` and mark the user online.
    pub async fn connect(&self, identity: &Identity) -> Result<Connection, LifelineError> {
        let session_id = new_id();
        let events = self.transport.open_session(&session_id, &identity.user_id);
        if let Err(e) = self.presence.register(identity, &session_id).await {
            self.transport.close_session(&session_id);
            return Err(e);
        }
        info!(user_id = %identity.user_id, session_id = %session_id, "session connected");
        Ok(Connection { session_id, events })
    }

    /// Tear down a session. Returns whether the user went offline.
    pub async fn disconnect(
        &self,
        identity: &Identity,
        session_id: &str,
    ) -> Result<bool, LifelineError> {
        self.transport.close_session(session_id);
        let emptied = self.router.detach_session(session_id);
        self.bus.forget_rooms(&emptied);
        let went_offline = self.presence.unregister(identity, session_id).await?;
        info!(user_id = %identity.user_id, session_id, went_offline, "session disconnected");
        Ok(went_offline)
    }

    /// Dispatch one client frame received on `session_id`.
    pub async fn handle_client_event(
        &self,
        identity: &Identity,
        session_id: &str,
        event: ClientEvent,
    ) -> Result<(), LifelineError> {
        event.validate()?;
        match event {
            ClientEvent::JoinChatRoom { target_user_id } => {
                let (room_id, target) = self
                    .router
                    .join_requested(identity, session_id, &target_user_id)
                    .await?;
                debug!(user_id = %identity.user_id, room_id = %room_id, "room joined");
                self.transport.deliver(
                    session_id,
                    ServerEvent::RoomJoined {
                        room_id,
                        target_user_id: target.id,
                        target_user_name: target.display_name,
                    },
                );
                Ok(())
            }
            ClientEvent::SendMessage { room_id, message } => {
                ensure_participant(identity, &room_id)?;
                self.bus.send(&room_id, identity, &message).await?;
                Ok(())
            }
            ClientEvent::Typing { room_id, is_typing } => {
                ensure_participant(identity, &room_id)?;
                self.bus
                    .typing(&room_id, identity, session_id, is_typing)
                    .await
            }
        }
    }

    pub async fn create_request(
        &self,
        identity: &Identity,
        description: &str,
    ) -> Result<HelpRequest, LifelineError> {
        self.requests.create(identity, description).await
    }

    pub async fn list_requests(
        &self,
        identity: &Identity,
    ) -> Result<Vec<HelpRequest>, LifelineError> {
        self.requests.list(identity).await
    }

    pub async fn accept_request(
        &self,
        identity: &Identity,
        request_id: &str,
    ) -> Result<String, LifelineError> {
        self.requests.accept(identity, request_id).await
    }

    pub async fn resolve_request(
        &self,
        identity: &Identity,
        request_id: &str,
    ) -> Result<(), LifelineError> {
        self.requests.resolve(identity, request_id).await
    }

    pub async fn raise_conflict(
        &self,
        identity: &Identity,
        request_id: &str,
    ) -> Result<String, LifelineError> {
        self.requests.raise_conflict(identity, request_id).await
    }

    /// Message history for a room. Participants and admins only.
    pub async fn room_history(
        &self,
        identity: &Identity,
        room_id: &str,
    ) -> Result<Vec<Message>, LifelineError> {
        if identity.role != Role::Admin {
            ensure_participant(identity, room_id)?;
        }
        self.bus.history(room_id).await
    }

    /// Online users the caller may start a conversation with, sorted by id.
    ///
    /// Admins see everyone else who is online. Volunteers see online admins
    /// and the victims of requests they hold. Victims see online admins and
    /// the volunteer bound to their open request.
    pub async fn chat_partners(&self, identity: &Identity) -> Result<Vec<User>, LifelineError> {
        let mut partners = BTreeMap::new();

        if identity.role == Role::Admin {
            for user_id in self.presence.online_users().await {
                if user_id == identity.user_id {
                    continue;
                }
                if let Some(user) = self.storage.get_user(&user_id).await? {
                    partners.insert(user.id.clone(), user);
                }
            }
            return Ok(partners.into_values().collect());
        }

        for admin in self.storage.list_users(Some(Role::Admin)).await? {
            if self.presence.is_online(&admin.id).await {
                partners.insert(admin.id.clone(), admin);
            }
        }

        let held = self
            .storage
            .list_requests(&RequestFilter::for_identity(identity))
            .await?
            .into_iter()
            .filter(|r| matches!(r.status, RequestStatus::Assigned | RequestStatus::Conflict));
        for request in held {
            let counterpart = match identity.role {
                Role::Volunteer
                    if request.assigned_volunteer_id.as_deref()
                        == Some(identity.user_id.as_str()) =>
                {
                    Some(request.victim_id)
                }
                Role::Victim => request.assigned_volunteer_id,
                _ => None,
            };
            let Some(user_id) = counterpart else { continue };
            if partners.contains_key(&user_id) || !self.presence.is_online(&user_id).await {
                continue;
            }
            if let Some(user) = self.storage.get_user(&user_id).await? {
                partners.insert(user.id.clone(), user);
            }
        }
        Ok(partners.into_values().collect())
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn transport(&self) -> &Arc<SessionHub> {
        &self.transport
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    pub fn router(&self) -> &Arc<RoomRouter> {
        &self.router
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn requests(&self) -> &Arc<HelpRequestMachine> {
        &self.requests
    }

    pub fn notifier(&self) -> &Arc<NotificationDispatcher> {
        &self.notifier
    }
}

fn ensure_participant(identity: &Identity, room_id: &str) -> Result<(), LifelineError> {
    let participants = extract_participants(room_id)?;
    if participants.iter().any(|p| *p == identity.user_id) {
        Ok(())
    } else {
        Err(LifelineError::Forbidden(format!(
            "{} is not a participant of {room_id}",
            identity.user_id
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use lifeline_config::model::StorageConfig;
    use lifeline_core::{
        AdapterType, HealthStatus, HelpRequest, Identity, LifelineError, Message, PluginAdapter,
        PresenceRecord, RequestFilter, RequestStatus, Role, StorageAdapter, User,
    };
    use lifeline_storage::SqliteStorage;

    use crate::presence::PresenceObserver;

    fn display_name(id: &str) -> String {
        let mut chars = id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn identity(id: &str, role: Role) -> Identity {
        Identity {
            user_id: id.to_string(),
            username: display_name(id),
            role,
        }
    }

    pub async fn open_storage() -> (Arc<dyn StorageAdapter>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("hub.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let storage = SqliteStorage::new(config);
        storage.initialize().await.unwrap();
        (Arc::new(storage), dir)
    }

    pub async fn seed_user(storage: &Arc<dyn StorageAdapter>, id: &str, role: Role) {
        storage
            .upsert_user(&User {
                id: id.to_string(),
                display_name: display_name(id),
                role,
            })
            .await
            .unwrap();
    }

    /// SQLite storage whose message and presence writes can be made to fail.
    pub struct FlakyStorage {
        inner: Arc<dyn StorageAdapter>,
        fail_appends: AtomicBool,
        fail_presence: AtomicBool,
    }

    impl FlakyStorage {
        pub fn new(inner: Arc<dyn StorageAdapter>) -> Self {
            Self {
                inner,
                fail_appends: AtomicBool::new(false),
                fail_presence: AtomicBool::new(false),
            }
        }

        pub fn fail_appends(&self, fail: bool) {
            self.fail_appends.store(fail, Ordering::SeqCst);
        }

        pub fn fail_presence(&self, fail: bool) {
            self.fail_presence.store(fail, Ordering::SeqCst);
        }

        fn injected(flag: &AtomicBool) -> Result<(), LifelineError> {
            if flag.load(Ordering::SeqCst) {
                return Err(LifelineError::Storage {
                    source: "disk full".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PluginAdapter for FlakyStorage {
        fn name(&self) -> &str {
            "flaky"
        }

        fn version(&self) -> semver::Version {
            self.inner.version()
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Storage
        }

        async fn health_check(&self) -> Result<HealthStatus, LifelineError> {
            self.inner.health_check().await
        }

        async fn shutdown(&self) -> Result<(), LifelineError> {
            self.inner.shutdown().await
        }
    }

    #[async_trait]
    impl StorageAdapter for FlakyStorage {
        async fn initialize(&self) -> Result<(), LifelineError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), LifelineError> {
            self.inner.close().await
        }

        async fn upsert_user(&self, user: &User) -> Result<(), LifelineError> {
            self.inner.upsert_user(user).await
        }

        async fn get_user(&self, id: &str) -> Result<Option<User>, LifelineError> {
            self.inner.get_user(id).await
        }

        async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, LifelineError> {
            self.inner.list_users(role).await
        }

        async fn save_presence(&self, record: &PresenceRecord) -> Result<(), LifelineError> {
            Self::injected(&self.fail_presence)?;
            self.inner.save_presence(record).await
        }

        async fn get_presence(
            &self,
            user_id: &str,
        ) -> Result<Option<PresenceRecord>, LifelineError> {
            self.inner.get_presence(user_id).await
        }

        async fn reset_presence(&self) -> Result<usize, LifelineError> {
            self.inner.reset_presence().await
        }

        async fn append_message(&self, message: &Message) -> Result<(), LifelineError> {
            Self::injected(&self.fail_appends)?;
            self.inner.append_message(message).await
        }

        async fn messages_for_room(&self, room_id: &str) -> Result<Vec<Message>, LifelineError> {
            self.inner.messages_for_room(room_id).await
        }

        async fn last_message_timestamp(
            &self,
            room_id: &str,
        ) -> Result<Option<String>, LifelineError> {
            self.inner.last_message_timestamp(room_id).await
        }

        async fn insert_request(&self, request: &HelpRequest) -> Result<(), LifelineError> {
            self.inner.insert_request(request).await
        }

        async fn get_request(&self, id: &str) -> Result<Option<HelpRequest>, LifelineError> {
            self.inner.get_request(id).await
        }

        async fn list_requests(
            &self,
            filter: &RequestFilter,
        ) -> Result<Vec<HelpRequest>, LifelineError> {
            self.inner.list_requests(filter).await
        }

        async fn compare_and_swap_request(
            &self,
            expected: RequestStatus,
            updated: &HelpRequest,
        ) -> Result<bool, LifelineError> {
            self.inner.compare_and_swap_request(expected, updated).await
        }
    }

    /// Observer that records every transition it sees.
    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<(String, bool)>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<(String, bool)> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PresenceObserver for RecordingObserver {
        async fn presence_changed(&self, user: &Identity, online: bool) {
            self.events
                .lock()
                .unwrap()
                .push((user.user_id.clone(), online));
        }
    }
}
