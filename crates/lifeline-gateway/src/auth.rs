// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication boundary for the gateway.
//!
//! Credentials are verified upstream by the trusted authentication front.
//! That front proves itself with a shared bearer token
//! (`Authorization: Bearer <token>`) and names the user with `X-User-Id`.
//! The user's display name and role come from the users table, never from the
//! request.
//!
//! When no token is configured, all requests are rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use lifeline_core::LifelineError;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Header naming the authenticated user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects everything.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// Whether `presented` matches the configured token.
    pub fn verify(&self, presented: Option<&str>) -> Result<(), LifelineError> {
        let Some(expected) = self.bearer_token.as_deref() else {
            tracing::error!("gateway has no bearer token configured -- rejecting request");
            return Err(LifelineError::Unauthenticated(
                "gateway authentication is not configured".into(),
            ));
        };
        match presented {
            Some(token) if token == expected => Ok(()),
            Some(_) => Err(LifelineError::Unauthenticated("invalid token".into())),
            None => Err(LifelineError::Unauthenticated("missing token".into())),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware that verifies the bearer token, resolves `X-User-Id` to an
/// [`Identity`](lifeline_core::Identity), and stores it in the request
/// extensions for handlers.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.auth.verify(bearer_token(request.headers()))?;

    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let identity = state.hub.identify(&user_id).await?;
    tracing::debug!(user_id = %identity.user_id, role = %identity.role, "request authenticated");

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
