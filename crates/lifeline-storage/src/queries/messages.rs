// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append and history queries.

use lifeline_core::LifelineError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{parse_column, Message};

/// Append a message to the log.
pub async fn append_message(db: &Database, msg: &Message) -> Result<(), LifelineError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, room_id, sender_id, sender_name, sender_role, body, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    msg.id,
                    msg.room_id,
                    msg.sender_id,
                    msg.sender_name,
                    msg.sender_role.to_string(),
                    msg.body,
                    msg.timestamp,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages for a room in chronological order, insertion order breaking ties.
pub async fn messages_for_room(db: &Database, room_id: &str) -> Result<Vec<Message>, LifelineError> {
    let room_id = room_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_id, sender_id, sender_name, sender_role, body, timestamp
                 FROM messages WHERE room_id = ?1
                 ORDER BY timestamp ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![room_id], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    room_id: row.get(1)?,
                    sender_id: row.get(2)?,
                    sender_name: row.get(3)?,
                    sender_role: parse_column(4, row.get(4)?)?,
                    body: row.get(5)?,
                    timestamp: row.get(6)?,
                })
            })?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Newest timestamp in a room, `None` for an empty room.
pub async fn last_timestamp(db: &Database, room_id: &str) -> Result<Option<String>, LifelineError> {
    let room_id = room_id.to_string();
    db.connection()
        .call(move |conn| {
            let last: Option<String> = conn.query_row(
                "SELECT MAX(timestamp) FROM messages WHERE room_id = ?1",
                params![room_id],
                |row| row.get(0),
            )?;
            Ok(last)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::queries::test_support::open_temp_db;

    fn make_msg(id: &str, room: &str, body: &str, timestamp: &str) -> Message {
        Message {
            id: id.to_string(),
            room_id: room.to_string(),
            sender_id: "v1".to_string(),
            sender_name: "Vera".to_string(),
            sender_role: Role::Victim,
            body: body.to_string(),
            timestamp: timestamp.to_string(),
        }
    }

    #[tokio::test]
    async fn append_and_read_in_timestamp_order() {
        let (db, _dir) = open_temp_db().await;

        let m2 = make_msg("m2", "private_v1_vol1", "second", "2026-01-01T00:00:02.000000Z");
        let m1 = make_msg("m1", "private_v1_vol1", "first", "2026-01-01T00:00:01.000000Z");
        let m3 = make_msg("m3", "private_v1_vol1", "third", "2026-01-01T00:00:03.000000Z");
        append_message(&db, &m2).await.unwrap();
        append_message(&db, &m1).await.unwrap();
        append_message(&db, &m3).await.unwrap();

        let messages = messages_for_room(&db, "private_v1_vol1").await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert_eq!(messages[0].sender_role, Role::Victim);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn equal_timestamps_keep_insertion_order() {
        let (db, _dir) = open_temp_db().await;
        let ts = "2026-01-01T00:00:01.000000Z";
        append_message(&db, &make_msg("b", "private_a_b", "x", ts)).await.unwrap();
        append_message(&db, &make_msg("a", "private_a_b", "y", ts)).await.unwrap();

        let messages = messages_for_room(&db, "private_a_b").await.unwrap();
        assert_eq!(messages[0].id, "b");
        assert_eq!(messages[1].id, "a");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn last_timestamp_is_the_maximum() {
        let (db, _dir) = open_temp_db().await;
        assert_eq!(last_timestamp(&db, "private_a_b").await.unwrap(), None);

        append_message(&db, &make_msg("m2", "private_a_b", "x", "2026-01-01T00:00:02.000000Z"))
            .await
            .unwrap();
        append_message(&db, &make_msg("m1", "private_a_b", "y", "2026-01-01T00:00:01.000000Z"))
            .await
            .unwrap();
        assert_eq!(
            last_timestamp(&db, "private_a_b").await.unwrap().as_deref(),
            Some("2026-01-01T00:00:02.000000Z")
        );
        assert_eq!(last_timestamp(&db, "conflict_a_b").await.unwrap(), None);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let (db, _dir) = open_temp_db().await;
        append_message(&db, &make_msg("m1", "private_a_b", "x", "2026-01-01T00:00:01.000000Z"))
            .await
            .unwrap();

        assert!(messages_for_room(&db, "conflict_a_b").await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let (db, _dir) = open_temp_db().await;
        let msg = make_msg("m1", "private_a_b", "x", "2026-01-01T00:00:01.000000Z");
        append_message(&db, &msg).await.unwrap();
        let err = append_message(&db, &msg).await.unwrap_err();
        assert!(matches!(err, LifelineError::Storage { .. }));
        db.close().await.unwrap();
    }
}
