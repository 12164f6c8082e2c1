// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User CRUD operations.

use lifeline_core::LifelineError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{parse_column, Role, User};

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        role: parse_column(2, row.get(2)?)?,
    })
}

/// Insert a user, or replace the display name and role of an existing one.
pub async fn upsert_user(db: &Database, user: &User) -> Result<(), LifelineError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, role) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     display_name = excluded.display_name,
                     role = excluded.role",
                params![user.id, user.display_name, user.role.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a user by ID.
pub async fn get_user(db: &Database, id: &str) -> Result<Option<User>, LifelineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, display_name, role FROM users WHERE id = ?1")?;
            match stmt.query_row(params![id], row_to_user) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List users ordered by id, optionally restricted to one role.
pub async fn list_users(db: &Database, role: Option<Role>) -> Result<Vec<User>, LifelineError> {
    let role = role.map(|r| r.to_string());
    db.connection()
        .call(move |conn| {
            let mut users = Vec::new();
            match &role {
                Some(role) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, display_name, role FROM users WHERE role = ?1 ORDER BY id ASC",
                    )?;
                    for user in stmt.query_map(params![role], row_to_user)? {
                        users.push(user?);
                    }
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT id, display_name, role FROM users ORDER BY id ASC")?;
                    for user in stmt.query_map([], row_to_user)? {
                        users.push(user?);
                    }
                }
            }
            Ok(users)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
