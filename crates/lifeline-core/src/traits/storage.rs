// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait: the persistence interface the hub is written against.

use async_trait::async_trait;

use crate::error::LifelineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    HelpRequest, Message, PresenceRecord, RequestFilter, RequestStatus, Role, User,
};

/// Adapter for durable storage of users, presence, messages, and requests.
///
/// Implementations must make [`compare_and_swap_request`] a single atomic
/// conditional write: under concurrent callers holding the same
/// `expected` status, at most one observes `true`.
///
/// [`compare_and_swap_request`]: StorageAdapter::compare_and_swap_request
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), LifelineError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LifelineError>;

    // --- Users ---

    /// Insert a user or replace the display name and role of an existing one.
    async fn upsert_user(&self, user: &User) -> Result<(), LifelineError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, LifelineError>;

    /// Users ordered by id ascending, optionally restricted to one role.
    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, LifelineError>;

    // --- Presence ---

    async fn save_presence(&self, record: &PresenceRecord) -> Result<(), LifelineError>;

    async fn get_presence(&self, user_id: &str)
    -> Result<Option<PresenceRecord>, LifelineError>;

    /// Marks every presence record offline. Returns the number of records changed.
    async fn reset_presence(&self) -> Result<usize, LifelineError>;

    // --- Messages ---

    async fn append_message(&self, message: &Message) -> Result<(), LifelineError>;

    /// Messages in a room, oldest first.
    async fn messages_for_room(&self, room_id: &str) -> Result<Vec<Message>, LifelineError>;

    /// Timestamp of the newest message in a room, if it has any.
    async fn last_message_timestamp(&self, room_id: &str)
    -> Result<Option<String>, LifelineError>;

    // --- Help requests ---

    async fn insert_request(&self, request: &HelpRequest) -> Result<(), LifelineError>;

    async fn get_request(&self, id: &str) -> Result<Option<HelpRequest>, LifelineError>;

    /// Requests matching the filter, newest first.
    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<HelpRequest>, LifelineError>;

    /// Replace the stored request with `updated` only if its current status is
    /// `expected`. Returns whether the write happened.
    async fn compare_and_swap_request(
        &self,
        expected: RequestStatus,
        updated: &HelpRequest,
    ) -> Result<bool, LifelineError>;
}
