// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lifeline service.

use thiserror::Error;

/// The primary error type used across the hub, storage adapters, and gateway.
///
/// The first six variants are the caller-facing taxonomy; the rest are
/// infrastructure failures that surface to callers as a generic failure.
#[derive(Debug, Error)]
pub enum LifelineError {
    /// No verified identity is attached to the operation.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Identity present but the role or ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Referenced request, room, or user does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Missing or malformed required field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A state-transition precondition was violated (including lost accept races).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No counterpart is available to route to (e.g. no admin for a conflict).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport errors (bind failure, socket closed).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LifelineError {
    /// Shorthand for [`LifelineError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether this error belongs to the caller-facing taxonomy rather than
    /// an infrastructure failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated(_)
                | Self::Forbidden(_)
                | Self::NotFound { .. }
                | Self::InvalidInput(_)
                | Self::Conflict(_)
                | Self::Unavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_renders_entity_and_id() {
        let err = LifelineError::not_found("request", "r-1");
        assert_eq!(err.to_string(), "request not found: r-1");
    }

    #[test]
    fn storage_errors_are_not_client_errors() {
        let err = LifelineError::Storage {
            source: Box::new(std::io::Error::other("disk full")),
        };
        assert!(!err.is_client_error());
        assert!(LifelineError::Conflict("taken".into()).is_client_error());
        assert!(LifelineError::Unavailable("no admin".into()).is_client_error());
    }
}
