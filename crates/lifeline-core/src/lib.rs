// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lifeline help-matching service.
//!
//! This crate provides the error taxonomy, domain types, typed real-time
//! events, and the adapter traits the hub is written against.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LifelineError;
pub use events::{ClientEvent, ServerEvent};
pub use traits::{PluginAdapter, StorageAdapter};
pub use types::{
    AdapterType, HealthStatus, HelpRequest, Identity, Message, PresenceRecord, RequestFilter,
    RequestStatus, Role, User,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_taxonomy_variants_construct() {
        let _ = LifelineError::Unauthenticated("no identity".into());
        let _ = LifelineError::Forbidden("not assigned".into());
        let _ = LifelineError::not_found("user", "u1");
        let _ = LifelineError::InvalidInput("empty".into());
        let _ = LifelineError::Conflict("already assigned".into());
        let _ = LifelineError::Unavailable("no admin".into());
        let _ = LifelineError::Channel {
            message: "closed".into(),
            source: None,
        };
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [AdapterType::Storage, AdapterType::Channel] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn storage_trait_is_object_safe() {
        fn _assert_storage(_: &dyn StorageAdapter) {}
        fn _assert_plugin<T: PluginAdapter>() {}
    }
}
