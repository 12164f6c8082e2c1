// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use lifeline_config::model::StorageConfig;
use lifeline_core::types::{
    now_timestamp, HelpRequest, Message, PresenceRecord, RequestFilter, RequestStatus, Role,
    User,
};
use lifeline_core::{AdapterType, HealthStatus, LifelineError, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, LifelineError> {
        self.db.get().ok_or_else(|| LifelineError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LifelineError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LifelineError> {
        // Shutdown delegates to close if the DB was initialized.
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), LifelineError> {
        let path = self.config.database_path.clone();
        let db = Database::open_with(&path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| LifelineError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LifelineError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Users ---

    async fn upsert_user(&self, user: &User) -> Result<(), LifelineError> {
        queries::users::upsert_user(self.db()?, user).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, LifelineError> {
        queries::users::get_user(self.db()?, id).await
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, LifelineError> {
        queries::users::list_users(self.db()?, role).await
    }

    // --- Presence ---

    async fn save_presence(&self, record: &PresenceRecord) -> Result<(), LifelineError> {
        queries::presence::save_presence(self.db()?, record).await
    }

    async fn get_presence(
        &self,
        user_id: &str,
    ) -> Result<Option<PresenceRecord>, LifelineError> {
        queries::presence::get_presence(self.db()?, user_id).await
    }

    async fn reset_presence(&self) -> Result<usize, LifelineError> {
        queries::presence::reset_presence(self.db()?, &now_timestamp()).await
    }

    // --- Messages ---

    async fn append_message(&self, message: &Message) -> Result<(), LifelineError> {
        queries::messages::append_message(self.db()?, message).await
    }

    async fn messages_for_room(&self, room_id: &str) -> Result<Vec<Message>, LifelineError> {
        queries::messages::messages_for_room(self.db()?, room_id).await
    }

    async fn last_message_timestamp(
        &self,
        room_id: &str,
    ) -> Result<Option<String>, LifelineError> {
        queries::messages::last_timestamp(self.db()?, room_id).await
    }

    // --- Help requests ---

    async fn insert_request(&self, request: &HelpRequest) -> Result<(), LifelineError> {
        queries::requests::insert_request(self.db()?, request).await
    }

    async fn get_request(&self, id: &str) -> Result<Option<HelpRequest>, LifelineError> {
        queries::requests::get_request(self.db()?, id).await
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<HelpRequest>, LifelineError> {
        queries::requests::list_requests(self.db()?, filter).await
    }

    async fn compare_and_swap_request(
        &self,
        expected: RequestStatus,
        updated: &HelpRequest,
    ) -> Result<bool, LifelineError> {
        queries::requests::compare_and_swap_request(self.db()?, expected, updated).await
    }
}
