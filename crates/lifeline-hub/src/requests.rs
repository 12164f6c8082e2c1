// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Help-request state machine.
//!
//! ```text
//! pending --accept--> assigned --resolve--> resolved
//!                        |                     ^
//!                        +--raise_conflict--> conflict --resolve--+
//! pending --resolve (admin)--> resolved
//! ```
//!
//! Each transition is computed as a pure function of the stored request and
//! committed with a status compare-and-swap. When two callers race from the
//! same status, exactly one swap lands and the other caller gets `Conflict`.

use std::sync::Arc;

use tracing::{info, warn};

use lifeline_config::ConflictAdminPolicy;
use lifeline_core::types::{new_id, now_timestamp};
use lifeline_core::{
    HelpRequest, Identity, LifelineError, RequestFilter, RequestStatus, Role, ServerEvent,
    StorageAdapter, User,
};

use crate::notify::NotificationDispatcher;
use crate::presence::PresenceRegistry;
use crate::rooms::{derive_room_id, RoomRouter, RoomTag};

fn require_role(actor: &Identity, role: Role, action: &str) -> Result<(), LifelineError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(LifelineError::Forbidden(format!(
            "only a {role} may {action}, caller is a {}",
            actor.role
        )))
    }
}

/// `pending -> assigned`, binding the volunteer.
fn assign(request: &HelpRequest, volunteer: &Identity) -> Result<HelpRequest, LifelineError> {
    if request.status != RequestStatus::Pending {
        return Err(LifelineError::Conflict(format!(
            "request {} is {}, not pending",
            request.id, request.status
        )));
    }
    Ok(HelpRequest {
        status: RequestStatus::Assigned,
        assigned_volunteer_id: Some(volunteer.user_id.clone()),
        assigned_volunteer_name: Some(volunteer.username.clone()),
        accepted_at: Some(now_timestamp()),
        ..request.clone()
    })
}

/// `any non-terminal -> resolved`, after the actor's permission check.
fn close(request: &HelpRequest, actor: &Identity) -> Result<HelpRequest, LifelineError> {
    let permitted = match actor.role {
        Role::Admin => true,
        Role::Volunteer => request.assigned_volunteer_id.as_deref() == Some(actor.user_id.as_str()),
        Role::Victim => false,
    };
    if !permitted {
        return Err(LifelineError::Forbidden(format!(
            "{} may not resolve request {}",
            actor.user_id, request.id
        )));
    }
    if request.status.is_terminal() {
        return Err(LifelineError::Conflict(format!(
            "request {} is already resolved",
            request.id
        )));
    }
    Ok(HelpRequest {
        status: RequestStatus::Resolved,
        resolved_at: Some(now_timestamp()),
        ..request.clone()
    })
}

/// `assigned -> conflict`, recording the escalation room.
fn escalate(
    request: &HelpRequest,
    volunteer: &Identity,
    room_id: String,
) -> Result<HelpRequest, LifelineError> {
    if request.status != RequestStatus::Assigned {
        return Err(LifelineError::Conflict(format!(
            "request {} is {}, not assigned",
            request.id, request.status
        )));
    }
    if request.assigned_volunteer_id.as_deref() != Some(volunteer.user_id.as_str()) {
        return Err(LifelineError::Forbidden(format!(
            "request {} is not assigned to {}",
            request.id, volunteer.user_id
        )));
    }
    Ok(HelpRequest {
        status: RequestStatus::Conflict,
        conflict_room_id: Some(room_id),
        ..request.clone()
    })
}

pub struct HelpRequestMachine {
    storage: Arc<dyn StorageAdapter>,
    router: Arc<RoomRouter>,
    presence: Arc<PresenceRegistry>,
    notifier: Arc<NotificationDispatcher>,
    policy: ConflictAdminPolicy,
}

impl HelpRequestMachine {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        router: Arc<RoomRouter>,
        presence: Arc<PresenceRegistry>,
        notifier: Arc<NotificationDispatcher>,
        policy: ConflictAdminPolicy,
    ) -> Self {
        Self {
            storage,
            router,
            presence,
            notifier,
            policy,
        }
    }

    async fn load(&self, request_id: &str) -> Result<HelpRequest, LifelineError> {
        self.storage
            .get_request(request_id)
            .await?
            .ok_or_else(|| LifelineError::not_found("request", request_id))
    }

    /// Commit `updated` if the stored status is still `from`.
    async fn commit(&self, from: RequestStatus, updated: &HelpRequest) -> Result<(), LifelineError> {
        if self.storage.compare_and_swap_request(from, updated).await? {
            Ok(())
        } else {
            warn!(request_id = %updated.id, from = %from, "transition lost a race");
            Err(LifelineError::Conflict(format!(
                "request {} changed concurrently",
                updated.id
            )))
        }
    }

    pub async fn create(
        &self,
        victim: &Identity,
        description: &str,
    ) -> Result<HelpRequest, LifelineError> {
        require_role(victim, Role::Victim, "create a help request")?;
        let description = description.trim();
        if description.is_empty() {
            return Err(LifelineError::InvalidInput("description is required".into()));
        }

        let request = HelpRequest {
            id: new_id(),
            victim_id: victim.user_id.clone(),
            victim_name: victim.username.clone(),
            description: description.to_string(),
            status: RequestStatus::Pending,
            assigned_volunteer_id: None,
            assigned_volunteer_name: None,
            created_at: now_timestamp(),
            accepted_at: None,
            resolved_at: None,
            conflict_room_id: None,
        };
        self.storage.insert_request(&request).await?;
        info!(request_id = %request.id, victim_id = %victim.user_id, "help request created");

        let event = ServerEvent::NewHelpRequest {
            id: request.id.clone(),
            victim_name: request.victim_name.clone(),
            description: request.description.clone(),
        };
        let mut responders = self.storage.list_users(Some(Role::Admin)).await?;
        responders.extend(self.storage.list_users(Some(Role::Volunteer)).await?);
        let responder_ids: Vec<&str> = responders.iter().map(|u| u.id.as_str()).collect();
        self.notifier.notify_all(responder_ids, &event).await;
        Ok(request)
    }

    /// Bind a volunteer to a pending request. Returns the private room id.
    pub async fn accept(
        &self,
        volunteer: &Identity,
        request_id: &str,
    ) -> Result<String, LifelineError> {
        require_role(volunteer, Role::Volunteer, "accept a request")?;
        let current = self.load(request_id).await?;
        let room_id = derive_room_id(
            &[current.victim_id.as_str(), volunteer.user_id.as_str()],
            RoomTag::Private,
        )?;
        let updated = assign(&current, volunteer)?;
        self.commit(RequestStatus::Pending, &updated).await?;
        info!(request_id, volunteer_id = %volunteer.user_id, room_id = %room_id, "request assigned");

        self.router
            .open_room(
                &[updated.victim_id.as_str(), volunteer.user_id.as_str()],
                RoomTag::Private,
            )
            .await?;
        let event = ServerEvent::RequestAssignedChatReady {
            request_id: updated.id.clone(),
            room_id: room_id.clone(),
            victim_id: updated.victim_id.clone(),
            victim_name: updated.victim_name.clone(),
            volunteer_id: volunteer.user_id.clone(),
            volunteer_name: volunteer.username.clone(),
        };
        self.notifier
            .notify_all([updated.victim_id.as_str(), volunteer.user_id.as_str()], &event)
            .await;
        Ok(room_id)
    }

    /// Move a request to its terminal state.
    pub async fn resolve(&self, actor: &Identity, request_id: &str) -> Result<(), LifelineError> {
        let current = self.load(request_id).await?;
        let updated = close(&current, actor)?;
        self.commit(current.status, &updated).await?;
        info!(request_id, actor_id = %actor.user_id, from = %current.status, "request resolved");

        let event = ServerEvent::RequestResolved {
            request_id: updated.id.clone(),
        };
        let mut parties = vec![updated.victim_id.as_str()];
        parties.extend(updated.assigned_volunteer_id.as_deref());
        self.notifier.notify_all(parties, &event).await;
        Ok(())
    }

    /// Escalate an assigned request to an admin. Returns the conflict room id.
    pub async fn raise_conflict(
        &self,
        volunteer: &Identity,
        request_id: &str,
    ) -> Result<String, LifelineError> {
        require_role(volunteer, Role::Volunteer, "raise a conflict")?;
        let current = self.load(request_id).await?;
        // Validate before picking an admin so a pending request reports
        // Conflict even when no admin exists.
        escalate(&current, volunteer, String::new())?;

        let admin = self.select_admin().await?;
        let room_id = derive_room_id(
            &[volunteer.user_id.as_str(), admin.id.as_str()],
            RoomTag::Conflict,
        )?;
        let updated = escalate(&current, volunteer, room_id.clone())?;
        self.commit(RequestStatus::Assigned, &updated).await?;
        info!(request_id, admin_id = %admin.id, room_id = %room_id, "request escalated");

        self.router
            .open_room(
                &[volunteer.user_id.as_str(), admin.id.as_str()],
                RoomTag::Conflict,
            )
            .await?;
        let event = ServerEvent::ConflictChatReady {
            request_id: updated.id.clone(),
            room_id: room_id.clone(),
            volunteer_id: volunteer.user_id.clone(),
            volunteer_name: volunteer.username.clone(),
            admin_id: admin.id.clone(),
        };
        self.notifier
            .notify_all([volunteer.user_id.as_str(), admin.id.as_str()], &event)
            .await;
        Ok(room_id)
    }

    /// Pick the escalation admin per the configured policy.
    pub async fn select_admin(&self) -> Result<User, LifelineError> {
        let admins = self.storage.list_users(Some(Role::Admin)).await?;
        if self.policy == ConflictAdminPolicy::FirstOnline {
            for admin in &admins {
                if self.presence.is_online(&admin.id).await {
                    return Ok(admin.clone());
                }
            }
        }
        admins
            .into_iter()
            .next()
            .ok_or_else(|| LifelineError::Unavailable("no admin available".into()))
    }

    pub async fn get(&self, request_id: &str) -> Result<HelpRequest, LifelineError> {
        self.load(request_id).await
    }

    /// Requests the caller may see, newest first.
    pub async fn list(&self, caller: &Identity) -> Result<Vec<HelpRequest>, LifelineError> {
        self.storage
            .list_requests(&RequestFilter::for_identity(caller))
            .await
    }
}
