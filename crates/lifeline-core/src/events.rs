// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed real-time events exchanged with connected sessions.
//!
//! Every frame is a JSON object tagged by `type`:
//!
//! ```json
//! {"type": "send_message", "room_id": "private_u1_u2", "message": "on my way"}
//! {"type": "new_message", "id": "...", "room_id": "private_u1_u2", "message": "on my way", ...}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LifelineError;
use crate::types::{Message, Role};

/// Frames a client may send over its session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Open (or re-open) the private conversation with another user.
    JoinChatRoom { target_user_id: String },
    /// Post a message into a room.
    SendMessage { room_id: String, message: String },
    /// Typing indicator for a room.
    Typing {
        room_id: String,
        #[serde(default)]
        is_typing: bool,
    },
}

impl ClientEvent {
    /// Boundary validation: required string fields must be non-blank.
    pub fn validate(&self) -> Result<(), LifelineError> {
        let (field, value) = match self {
            Self::JoinChatRoom { target_user_id } => ("target_user_id", target_user_id),
            Self::SendMessage { room_id, message } => {
                if message.trim().is_empty() {
                    return Err(LifelineError::InvalidInput("message is required".into()));
                }
                ("room_id", room_id)
            }
            Self::Typing { room_id, .. } => ("room_id", room_id),
        };
        if value.trim().is_empty() {
            return Err(LifelineError::InvalidInput(format!("{field} is required")));
        }
        Ok(())
    }
}

/// Frames the server pushes to sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A user came online or went offline.
    PresenceChanged {
        user_id: String,
        username: String,
        role: Role,
        online: bool,
    },
    /// Reply to `join_chat_room`.
    RoomJoined {
        room_id: String,
        target_user_id: String,
        target_user_name: String,
    },
    /// A chat message, delivered through the room or directly.
    NewMessage(Message),
    /// Another room member started or stopped typing.
    UserTyping {
        user_id: String,
        username: String,
        room_id: String,
        is_typing: bool,
    },
    /// A victim raised a new request.
    NewHelpRequest {
        id: String,
        victim_name: String,
        description: String,
    },
    /// A volunteer accepted a request; the private room is ready.
    RequestAssignedChatReady {
        request_id: String,
        room_id: String,
        victim_id: String,
        victim_name: String,
        volunteer_id: String,
        volunteer_name: String,
    },
    /// A request was escalated; the conflict room is ready.
    ConflictChatReady {
        request_id: String,
        room_id: String,
        volunteer_id: String,
        volunteer_name: String,
        admin_id: String,
    },
    /// A request reached its terminal state.
    RequestResolved { request_id: String },
    /// A client frame was rejected.
    Error { message: String },
}

impl ServerEvent {
    /// The wire name of this event (the `type` tag).
    pub fn name(&self) -> &'static str {
        match self {
            Self::PresenceChanged { .. } => "presence_changed",
            Self::RoomJoined { .. } => "room_joined",
            Self::NewMessage(_) => "new_message",
            Self::UserTyping { .. } => "user_typing",
            Self::NewHelpRequest { .. } => "new_help_request",
            Self::RequestAssignedChatReady { .. } => "request_assigned_chat_ready",
            Self::ConflictChatReady { .. } => "conflict_chat_ready",
            Self::RequestResolved { .. } => "request_resolved",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_parses_tagged_frames() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"type":"join_chat_room","target_user_id":"u2"}"#).unwrap();
        assert_eq!(
            join,
            ClientEvent::JoinChatRoom {
                target_user_id: "u2".into()
            }
        );

        let typing: ClientEvent =
            serde_json::from_str(r#"{"type":"typing","room_id":"private_a_b"}"#).unwrap();
        assert_eq!(
            typing,
            ClientEvent::Typing {
                room_id: "private_a_b".into(),
                is_typing: false
            }
        );
    }

    #[test]
    fn unknown_client_event_is_rejected() {
        let parsed = serde_json::from_str::<ClientEvent>(r#"{"type":"shout","text":"hi"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn blank_fields_fail_validation() {
        let send = ClientEvent::SendMessage {
            room_id: "private_a_b".into(),
            message: "   ".into(),
        };
        assert!(matches!(
            send.validate(),
            Err(LifelineError::InvalidInput(_))
        ));

        let join = ClientEvent::JoinChatRoom {
            target_user_id: String::new(),
        };
        assert!(join.validate().is_err());
    }

    #[test]
    fn server_event_tag_matches_name() {
        let events = [
            ServerEvent::RequestResolved {
                request_id: "r1".into(),
            },
            ServerEvent::PresenceChanged {
                user_id: "u1".into(),
                username: "Una".into(),
                role: Role::Volunteer,
                online: true,
            },
            ServerEvent::NewMessage(Message {
                id: "m1".into(),
                room_id: "private_a_b".into(),
                sender_id: "a".into(),
                sender_name: "A".into(),
                sender_role: Role::Victim,
                body: "hello".into(),
                timestamp: "2026-01-01T00:00:00.000000Z".into(),
            }),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.name());
        }
    }

    #[test]
    fn new_message_flattens_message_fields() {
        let event = ServerEvent::NewMessage(Message {
            id: "m1".into(),
            room_id: "private_a_b".into(),
            sender_id: "a".into(),
            sender_name: "A".into(),
            sender_role: Role::Victim,
            body: "hello".into(),
            timestamp: "2026-01-01T00:00:00.000000Z".into(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["message"], "hello");
        assert_eq!(value["room_id"], "private_a_b");
    }
}
