// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod messages;
pub mod presence;
pub mod requests;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support {
    use tempfile::{tempdir, TempDir};

    use crate::database::Database;

    pub async fn open_temp_db() -> (Database, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }
}
