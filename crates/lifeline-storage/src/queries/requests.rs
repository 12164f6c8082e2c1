// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Help-request persistence, including the conditional status swap every
//! state-machine transition is built on.

use lifeline_core::types::RequestFilter;
use lifeline_core::LifelineError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{parse_column, HelpRequest, RequestStatus};

const COLUMNS: &str = "id, victim_id, victim_name, description, status, \
     assigned_volunteer_id, assigned_volunteer_name, created_at, accepted_at, \
     resolved_at, conflict_room_id";

fn row_to_request(row: &rusqlite::Row<'_>) -> Result<HelpRequest, rusqlite::Error> {
    Ok(HelpRequest {
        id: row.get(0)?,
        victim_id: row.get(1)?,
        victim_name: row.get(2)?,
        description: row.get(3)?,
        status: parse_column(4, row.get(4)?)?,
        assigned_volunteer_id: row.get(5)?,
        assigned_volunteer_name: row.get(6)?,
        created_at: row.get(7)?,
        accepted_at: row.get(8)?,
        resolved_at: row.get(9)?,
        conflict_room_id: row.get(10)?,
    })
}

/// Insert a new request.
pub async fn insert_request(db: &Database, req: &HelpRequest) -> Result<(), LifelineError> {
    let req = req.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO help_requests ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    req.id,
                    req.victim_id,
                    req.victim_name,
                    req.description,
                    req.status.to_string(),
                    req.assigned_volunteer_id,
                    req.assigned_volunteer_name,
                    req.created_at,
                    req.accepted_at,
                    req.resolved_at,
                    req.conflict_room_id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a request by ID.
pub async fn get_request(db: &Database, id: &str) -> Result<Option<HelpRequest>, LifelineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {COLUMNS} FROM help_requests WHERE id = ?1"),
                params![id],
                row_to_request,
            );
            match result {
                Ok(req) => Ok(Some(req)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List requests visible under `filter`, newest first.
pub async fn list_requests(
    db: &Database,
    filter: &RequestFilter,
) -> Result<Vec<HelpRequest>, LifelineError> {
    let filter = filter.clone();
    db.connection()
        .call(move |conn| {
            let order = "ORDER BY created_at DESC, rowid DESC";
            let mut requests = Vec::new();
            match &filter {
                RequestFilter::All => {
                    let mut stmt =
                        conn.prepare(&format!("SELECT {COLUMNS} FROM help_requests {order}"))?;
                    for req in stmt.query_map([], row_to_request)? {
                        requests.push(req?);
                    }
                }
                RequestFilter::Victim(victim_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM help_requests WHERE victim_id = ?1 {order}"
                    ))?;
                    for req in stmt.query_map(params![victim_id], row_to_request)? {
                        requests.push(req?);
                    }
                }
                RequestFilter::Volunteer(volunteer_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM help_requests
                         WHERE status = 'pending'
                            OR (assigned_volunteer_id = ?1 AND status IN ('assigned', 'conflict'))
                         {order}"
                    ))?;
                    for req in stmt.query_map(params![volunteer_id], row_to_request)? {
                        requests.push(req?);
                    }
                }
            }
            Ok(requests)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite the mutable fields of `updated` only if the stored status is
/// still `expected`. Returns whether a row was written.
///
/// The check and the write are one statement on the writer thread, so two
/// callers racing from the same `expected` status cannot both succeed.
pub async fn compare_and_swap_request(
    db: &Database,
    expected: RequestStatus,
    updated: &HelpRequest,
) -> Result<bool, LifelineError> {
    let req = updated.clone();
    let expected = expected.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE help_requests SET
                     status = ?3,
                     assigned_volunteer_id = ?4,
                     assigned_volunteer_name = ?5,
                     accepted_at = ?6,
                     resolved_at = ?7,
                     conflict_room_id = ?8
                 WHERE id = ?1 AND status = ?2",
                params![
                    req.id,
                    expected,
                    req.status.to_string(),
                    req.assigned_volunteer_id,
                    req.assigned_volunteer_name,
                    req.accepted_at,
                    req.resolved_at,
                    req.conflict_room_id,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
