// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use lifeline_core::{
    AdapterType, HealthStatus, HelpRequest, Identity, Message, PluginAdapter, RequestStatus, User,
};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Request body for `POST /v1/requests`.
#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    /// What the victim needs help with. Blank is rejected by the hub.
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub room_id: String,
}

#[derive(Debug, Serialize)]
pub struct ResolvedResponse {
    pub id: String,
    pub status: RequestStatus,
}

#[derive(Debug, Serialize)]
pub struct RequestListResponse {
    pub requests: Vec<HelpRequest>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub room_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct PartnerListResponse {
    pub partners: Vec<User>,
}

/// One backend's entry in `GET /health`.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub kind: AdapterType,
    pub version: String,
    /// `healthy`, `degraded`, or `unhealthy`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, `degraded`, or `unavailable`.
    pub status: &'static str,
    pub name: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Live WebSocket sessions.
    pub sessions: usize,
    pub components: Vec<ComponentHealth>,
}

async fn component_health<A: PluginAdapter + ?Sized>(adapter: &A) -> ComponentHealth {
    let (status, detail) = match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => ("healthy", None),
        Ok(HealthStatus::Degraded(why)) => ("degraded", Some(why)),
        Ok(HealthStatus::Unhealthy(why)) => ("unhealthy", Some(why)),
        Err(e) => {
            tracing::warn!(adapter = adapter.name(), error = %e, "health check failed");
            ("unhealthy", Some("health check failed".to_string()))
        }
    };
    ComponentHealth {
        name: adapter.name().to_string(),
        kind: adapter.adapter_type(),
        version: adapter.version().to_string(),
        status,
        detail,
    }
}

/// GET /health
///
/// Answers 503 when any backend is unhealthy.
pub async fn get_public_health(
    State(state): State<GatewayState>,
) -> (StatusCode, Json<HealthResponse>) {
    let components = vec![component_health(state.hub.storage().as_ref()).await];

    let (code, status) = if components.iter().any(|c| c.status == "unhealthy") {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else if components.iter().any(|c| c.status == "degraded") {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    let body = HealthResponse {
        status,
        name: state.health.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        sessions: state.hub.transport().session_count(),
        components,
    };
    (code, Json(body))
}

/// POST /v1/requests
pub async fn post_request(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let request = state
        .hub
        .create_request(&identity, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: request.id })))
}

/// GET /v1/requests
pub async fn get_requests(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let requests = state.hub.list_requests(&identity).await?;
    Ok(Json(RequestListResponse { requests }))
}

/// POST /v1/requests/{id}/accept
pub async fn post_accept(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room_id = state.hub.accept_request(&identity, &id).await?;
    Ok(Json(RoomResponse { room_id }))
}

/// POST /v1/requests/{id}/resolve
pub async fn post_resolve(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ResolvedResponse>, ApiError> {
    state.hub.resolve_request(&identity, &id).await?;
    Ok(Json(ResolvedResponse {
        id,
        status: RequestStatus::Resolved,
    }))
}

/// POST /v1/requests/{id}/conflict
pub async fn post_conflict(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room_id = state.hub.raise_conflict(&identity, &id).await?;
    Ok(Json(RoomResponse { room_id }))
}

/// GET /v1/rooms/{room_id}/messages
pub async fn get_room_messages(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(room_id): Path<String>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let messages = state.hub.room_history(&identity, &room_id).await?;
    Ok(Json(MessageListResponse { room_id, messages }))
}

/// GET /v1/partners
pub async fn get_partners(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<PartnerListResponse>, ApiError> {
    let partners = state.hub.chat_partners(&identity).await?;
    Ok(Json(PartnerListResponse { partners }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use crate::test_support::{gateway_state, TOKEN};
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use lifeline_core::StorageAdapter;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TOKEN}"));
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn missing_or_wrong_token_is_401() {
        let (state, _dir) = gateway_state(Some(TOKEN)).await;
        let app = build_router(state);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/requests")
                    .header("x-user-id", "v1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, "GET", "/v1/requests", Some("ghost"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "GET", "/v1/requests", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unconfigured_gateway_rejects_everything() {
        let (state, _dir) = gateway_state(None).await;
        let app = build_router(state);
        let (status, _) = call(&app, "GET", "/v1/requests", Some("v1"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn request_lifecycle_over_http() {
        let (state, _dir) = gateway_state(Some(TOKEN)).await;
        let app = build_router(state);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/requests",
            Some("v1"),
            Some(json!({"description": "Flooding in basement"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            "POST",
            "/v1/requests",
            Some("vol1"),
            Some(json!({"description": "not a victim"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/v1/requests/{id}/accept"),
            Some("vol1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["room_id"], "private_v1_vol1");

        let (status, _) = call(
            &app,
            "POST",
            &format!("/v1/requests/{id}/accept"),
            Some("vol2"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/v1/requests/{id}/conflict"),
            Some("vol1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["room_id"], "conflict_admin1_vol1");

        let (status, body) = call(
            &app,
            "POST",
            &format!("/v1/requests/{id}/resolve"),
            Some("admin1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "resolved");

        let (status, body) = call(&app, "GET", "/v1/requests", Some("v1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requests"][0]["status"], "resolved");
        assert!(body["requests"][0]["resolved_at"].is_string());
    }

    #[tokio::test]
    async fn blank_description_is_400_and_missing_request_is_404() {
        let (state, _dir) = gateway_state(Some(TOKEN)).await;
        let app = build_router(state);

        let (status, body) = call(&app, "POST", "/v1/requests", Some("v1"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("description"));

        let (status, _) = call(
            &app,
            "POST",
            "/v1/requests/nope/accept",
            Some("vol1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn conflict_without_admin_is_503() {
        let (state, _dir) = gateway_state(Some(TOKEN)).await;
        state
            .hub
            .storage()
            .upsert_user(&User {
                id: "admin1".into(),
                display_name: "Admin1".into(),
                role: lifeline_core::Role::Volunteer,
            })
            .await
            .unwrap();
        let app = build_router(state);

        let (_, body) = call(
            &app,
            "POST",
            "/v1/requests",
            Some("v1"),
            Some(json!({"description": "help"})),
        )
        .await;
        let id = body["id"].as_str().unwrap().to_string();
        call(&app, "POST", &format!("/v1/requests/{id}/accept"), Some("vol1"), None).await;

        let (status, _) = call(
            &app,
            "POST",
            &format!("/v1/requests/{id}/conflict"),
            Some("vol1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn room_history_is_restricted_to_participants() {
        let (state, _dir) = gateway_state(Some(TOKEN)).await;
        let app = build_router(state);

        let (status, body) = call(
            &app,
            "GET",
            "/v1/rooms/private_v1_vol1/messages",
            Some("vol1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"], json!([]));

        let (status, _) = call(
            &app,
            "GET",
            "/v1/rooms/private_v1_vol1/messages",
            Some("vol2"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            "GET",
            "/v1/rooms/lobby_v1_vol1/messages",
            Some("admin1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn partners_endpoint_lists_online_admins() {
        let (state, _dir) = gateway_state(Some(TOKEN)).await;
        let admin = state.hub.identify("admin1").await.unwrap();
        let _conn = state.hub.connect(&admin).await.unwrap();
        let app = build_router(state);

        let (status, body) = call(&app, "GET", "/v1/partners", Some("v1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["partners"][0]["id"], "admin1");
        assert_eq!(body["partners"][0]["role"], "admin");
    }
}
