// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `lifeline-core::types` for use across
//! adapter trait boundaries. This module re-exports them for convenience
//! within the storage crate, and holds the column conversions they need.

use std::str::FromStr;

pub use lifeline_core::types::{HelpRequest, Message, PresenceRecord, RequestStatus, Role, User};

/// Parse a TEXT column holding a strum-serialized enum.
pub(crate) fn parse_column<T>(idx: usize, raw: String) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
