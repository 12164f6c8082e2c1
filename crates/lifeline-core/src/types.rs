// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the hub, storage adapters, and gateway.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Channel,
}

/// Role of a user within the service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A person requesting help.
    Victim,
    /// A responder who accepts requests.
    Volunteer,
    /// A coordinator who receives conflict escalations.
    Admin,
}

/// A registered user. Created by the external registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

/// The trusted `(user_id, username, role)` triple attached to a connection
/// by the authentication boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.display_name,
            role: user.role,
        }
    }
}

/// Online state of a single user.
///
/// `online` is true exactly when `active_session_id` names a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    pub online: bool,
    pub last_seen: String,
    pub active_session_id: Option<String>,
}

impl PresenceRecord {
    /// A record for a user that has never connected.
    pub fn offline(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            online: false,
            last_seen: now_timestamp(),
            active_session_id: None,
        }
    }
}

/// A persisted chat message. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: Role,
    #[serde(rename = "message")]
    pub body: String,
    pub timestamp: String,
}

/// Lifecycle state of a help request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Assigned,
    Conflict,
    Resolved,
}

impl RequestStatus {
    /// `resolved` is the only terminal state.
    pub fn is_terminal(self) -> bool {
        self == Self::Resolved
    }
}

/// A help request raised by a victim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpRequest {
    pub id: String,
    pub victim_id: String,
    pub victim_name: String,
    pub description: String,
    pub status: RequestStatus,
    pub assigned_volunteer_id: Option<String>,
    pub assigned_volunteer_name: Option<String>,
    pub created_at: String,
    pub accepted_at: Option<String>,
    pub resolved_at: Option<String>,
    pub conflict_room_id: Option<String>,
}

/// Row filter for listing help requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFilter {
    /// Every request.
    All,
    /// Requests raised by one victim.
    Victim(String),
    /// Pending requests plus the volunteer's own assigned/conflict requests.
    Volunteer(String),
}

impl RequestFilter {
    /// The filter a caller with this identity is entitled to.
    pub fn for_identity(identity: &Identity) -> Self {
        match identity.role {
            Role::Victim => Self::Victim(identity.user_id.clone()),
            Role::Volunteer => Self::Volunteer(identity.user_id.clone()),
            Role::Admin => Self::All,
        }
    }
}

/// Current UTC time as RFC 3339 with microsecond precision.
///
/// The fixed-width `Z` form sorts lexicographically in time order, which the
/// storage layer relies on for ordering.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fresh random identifier for messages, requests, and sessions.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_lowercase_strings() {
        for role in [Role::Victim, Role::Volunteer, Role::Admin] {
            let s = role.to_string();
            assert_eq!(s, s.to_lowercase());
            assert_eq!(Role::from_str(&s).unwrap(), role);
        }
        assert!(Role::from_str("superuser").is_err());
    }

    #[test]
    fn request_status_serializes_lowercase() {
        let json = serde_json::to_string(&RequestStatus::Conflict).unwrap();
        assert_eq!(json, "\"conflict\"");
        assert!(RequestStatus::Resolved.is_terminal());
        assert!(!RequestStatus::Conflict.is_terminal());
    }

    #[test]
    fn message_body_uses_message_key_on_the_wire() {
        let msg = Message {
            id: "m1".into(),
            room_id: "private_a_b".into(),
            sender_id: "a".into(),
            sender_name: "Alice".into(),
            sender_role: Role::Victim,
            body: "help".into(),
            timestamp: "2026-01-01T00:00:00.000000Z".into(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["message"], "help");
        assert_eq!(value["sender_role"], "victim");
    }

    #[test]
    fn filter_follows_role() {
        let victim = Identity {
            user_id: "v1".into(),
            username: "Vic".into(),
            role: Role::Victim,
        };
        assert_eq!(
            RequestFilter::for_identity(&victim),
            RequestFilter::Victim("v1".into())
        );
        let admin = Identity {
            role: Role::Admin,
            ..victim
        };
        assert_eq!(RequestFilter::for_identity(&admin), RequestFilter::All);
    }

    #[test]
    fn timestamps_sort_in_time_order() {
        let a = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_timestamp();
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }
}
