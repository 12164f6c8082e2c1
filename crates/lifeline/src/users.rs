// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifeline user` commands: seed and inspect the users table.

use lifeline_config::LifelineConfig;
use lifeline_core::{LifelineError, Role, StorageAdapter, User};
use lifeline_hub::rooms::SEPARATOR;
use lifeline_storage::SqliteStorage;

async fn open_storage(config: &LifelineConfig) -> Result<SqliteStorage, LifelineError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(storage)
}

/// Build a user record, rejecting ids that cannot appear in a room id.
pub fn new_user(id: &str, name: &str, role: Role) -> Result<User, LifelineError> {
    let id = id.trim();
    if id.is_empty() || id.contains(SEPARATOR) {
        return Err(LifelineError::InvalidInput(format!(
            "user id must be non-empty and must not contain '{SEPARATOR}'"
        )));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(LifelineError::InvalidInput("display name is required".into()));
    }
    Ok(User {
        id: id.to_string(),
        display_name: name.to_string(),
        role,
    })
}

/// Runs `lifeline user add`.
pub async fn run_user_add(
    config: &LifelineConfig,
    id: &str,
    name: &str,
    role: Role,
) -> Result<(), LifelineError> {
    let user = new_user(id, name, role)?;
    let storage = open_storage(config).await?;
    storage.upsert_user(&user).await?;
    storage.close().await?;
    println!("saved {} ({}, {})", user.id, user.display_name, user.role);
    Ok(())
}

/// Format users as aligned rows.
pub fn format_users(users: &[User]) -> String {
    let width = users.iter().map(|u| u.id.len()).max().unwrap_or(2).max(2);
    let mut out = format!("{:<width$}  {:<9}  NAME\n", "ID", "ROLE");
    for user in users {
        out.push_str(&format!(
            "{:<width$}  {:<9}  {}\n",
            user.id,
            user.role.to_string(),
            user.display_name
        ));
    }
    out
}

/// Runs `lifeline user list`.
pub async fn run_user_list(config: &LifelineConfig, role: Option<Role>) -> Result<(), LifelineError> {
    let storage = open_storage(config).await?;
    let users = storage.list_users(role).await?;
    storage.close().await?;
    if users.is_empty() {
        println!("no users");
    } else {
        print!("{}", format_users(&users));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeline_config::model::StorageConfig;

    fn config_in(dir: &tempfile::TempDir) -> LifelineConfig {
        LifelineConfig {
            storage: StorageConfig {
                database_path: dir.path().join("users.db").to_string_lossy().into_owned(),
                wal_mode: true,
            },
            ..LifelineConfig::default()
        }
    }

    #[test]
    fn ids_with_separator_are_rejected() {
        assert!(new_user("bad_id", "Bad", Role::Victim).is_err());
        assert!(new_user("  ", "Blank", Role::Victim).is_err());
        assert!(new_user("ok", " ", Role::Victim).is_err());
        assert_eq!(new_user(" ok ", "Ok", Role::Admin).unwrap().id, "ok");
    }

    #[tokio::test]
    async fn add_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        run_user_add(&config, "admin1", "Ada", Role::Admin).await.unwrap();
        run_user_add(&config, "vol1", "Olivia", Role::Volunteer).await.unwrap();

        let storage = open_storage(&config).await.unwrap();
        let admins = storage.list_users(Some(Role::Admin)).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].display_name, "Ada");
        assert_eq!(storage.list_users(None).await.unwrap().len(), 2);
    }

    #[test]
    fn format_aligns_columns() {
        let out = format_users(&[
            new_user("admin1", "Ada", Role::Admin).unwrap(),
            new_user("v1", "Victor", Role::Victim).unwrap(),
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID    "));
        assert!(lines[2].starts_with("v1      victim"));
    }
}
