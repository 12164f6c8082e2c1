// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete hub over a temp SQLite database with
//! seeded users. Sessions are opened with [`TestHarness::session`], which
//! returns a [`MockSession`] driving the same dispatch path as the gateway.

use std::sync::Arc;

use lifeline_config::model::StorageConfig;
use lifeline_config::{ConflictAdminPolicy, LifelineConfig};
use lifeline_core::{Identity, LifelineError, Role, StorageAdapter, User};
use lifeline_hub::{Hub, HubOptions};
use lifeline_storage::SqliteStorage;

use crate::mock_session::MockSession;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    users: Vec<User>,
    conflict_admin: ConflictAdminPolicy,
    session_buffer: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            users: Vec::new(),
            conflict_admin: ConflictAdminPolicy::default(),
            session_buffer: 64,
        }
    }

    /// Seed a user.
    pub fn with_user(mut self, id: &str, display_name: &str, role: Role) -> Self {
        self.users.push(User {
            id: id.to_string(),
            display_name: display_name.to_string(),
            role,
        });
        self
    }

    /// Seed `v1`, `v2` (victims), `vol1`, `vol2` (volunteers) and `admin1`.
    pub fn with_standard_users(self) -> Self {
        self.with_user("v1", "Victor", Role::Victim)
            .with_user("v2", "Vanessa", Role::Victim)
            .with_user("vol1", "Olivia", Role::Volunteer)
            .with_user("vol2", "Oscar", Role::Volunteer)
            .with_user("admin1", "Ada", Role::Admin)
    }

    /// Set the conflict escalation policy.
    pub fn with_conflict_policy(mut self, policy: ConflictAdminPolicy) -> Self {
        self.conflict_admin = policy;
        self
    }

    /// Set the per-session outbound queue depth.
    pub fn with_session_buffer(mut self, buffer: usize) -> Self {
        self.session_buffer = buffer;
        self
    }

    /// Build the test harness, creating storage and the hub.
    pub async fn build(self) -> Result<TestHarness, LifelineError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| LifelineError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = LifelineConfig::default();
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        config.delivery.session_buffer = self.session_buffer;
        config.routing.conflict_admin = self.conflict_admin;

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        for user in &self.users {
            storage.upsert_user(user).await?;
        }
        tracing::debug!(users = self.users.len(), "test harness seeded");

        let hub = Arc::new(Hub::new(storage.clone(), HubOptions::from(&config)));

        Ok(TestHarness {
            hub,
            storage,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment over temp storage.
pub struct TestHarness {
    /// The wired hub.
    pub hub: Arc<Hub>,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    /// Configuration the hub was built from.
    pub config: LifelineConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Resolve a seeded user to its identity.
    pub async fn identity(&self, user_id: &str) -> Result<Identity, LifelineError> {
        self.hub.identify(user_id).await
    }

    /// Connect a seeded user and return its session.
    pub async fn session(&self, user_id: &str) -> Result<MockSession, LifelineError> {
        let identity = self.identity(user_id).await?;
        MockSession::connect(self.hub.clone(), identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.storage.list_users(None).await.unwrap().is_empty());
        assert_eq!(harness.config.delivery.session_buffer, 64);
    }

    #[tokio::test]
    async fn seeded_users_are_identifiable() {
        let harness = TestHarness::builder()
            .with_standard_users()
            .build()
            .await
            .unwrap();
        let admin = harness.identity("admin1").await.unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.username, "Ada");
        assert!(matches!(
            harness.identity("nobody").await,
            Err(LifelineError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn options_reach_the_config() {
        let harness = TestHarness::builder()
            .with_conflict_policy(ConflictAdminPolicy::First)
            .with_session_buffer(4)
            .build()
            .await
            .unwrap();
        assert_eq!(harness.config.routing.conflict_admin, ConflictAdminPolicy::First);
        assert_eq!(harness.config.delivery.session_buffer, 4);
    }
}
