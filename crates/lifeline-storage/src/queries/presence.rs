// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence record persistence.

use lifeline_core::LifelineError;
use rusqlite::params;

use crate::database::Database;
use crate::models::PresenceRecord;

/// Insert or overwrite the presence record for a user.
pub async fn save_presence(db: &Database, record: &PresenceRecord) -> Result<(), LifelineError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO presence (user_id, online, last_seen, active_session_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     online = excluded.online,
                     last_seen = excluded.last_seen,
                     active_session_id = excluded.active_session_id",
                params![
                    record.user_id,
                    record.online,
                    record.last_seen,
                    record.active_session_id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get the presence record for a user.
pub async fn get_presence(
    db: &Database,
    user_id: &str,
) -> Result<Option<PresenceRecord>, LifelineError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT user_id, online, last_seen, active_session_id
                 FROM presence WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(PresenceRecord {
                        user_id: row.get(0)?,
                        online: row.get(1)?,
                        last_seen: row.get(2)?,
                        active_session_id: row.get(3)?,
                    })
                },
            );
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark every online record offline. Sessions never survive a restart, so
/// this runs once at startup.
pub async fn reset_presence(db: &Database, now: &str) -> Result<usize, LifelineError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE presence SET online = 0, active_session_id = NULL, last_seen = ?1
                 WHERE online = 1 OR active_session_id IS NOT NULL",
                params![now],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
