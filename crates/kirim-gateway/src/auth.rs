// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the gateway.
//!
//! Two schemes for two audiences: management routes (session CRUD, listings)
//! take `Authorization: Bearer <token>`; the public send routes take an
//! `x-api-key` header. When the relevant credential is not configured, all
//! requests on those routes are rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token for management routes.
    pub bearer_token: Option<String>,
    /// Expected API key for send routes.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Middleware validating `Authorization: Bearer <token>` on management routes.
pub async fn bearer_auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(ref expected) = auth.bearer_token else {
        tracing::error!("gateway has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if token == expected => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Middleware validating the `x-api-key` header on send routes.
pub async fn api_key_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(ref expected) = auth.api_key else {
        tracing::error!("gateway has no api key configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match key {
        Some(key) if key == expected => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
