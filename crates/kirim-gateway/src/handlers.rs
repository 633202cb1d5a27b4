// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Request field names mirror the public API contract (`whatsappPhoneId`,
//! `targetPhoneNumber`, ...). Handlers translate between HTTP and
//! [`kirim_service::GatewayService`]; they contain no domain logic.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use kirim_core::types::{DeliveryStatus, Environment, OutboundFilter, OutboundItem, OutboundKind};
use kirim_core::KirimError;
use kirim_service::SendInput;

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a service error onto an HTTP status.
fn error_response(err: KirimError) -> Response {
    let status = match &err {
        KirimError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        KirimError::NotFound { .. } => StatusCode::NOT_FOUND,
        KirimError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        KirimError::PairingFailed { .. } => StatusCode::BAD_GATEWAY,
        KirimError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// The tenant a management request acts for.
fn user_id(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "missing x-user-id header".to_string(),
                }),
            )
                .into_response()
        })
}

// --- Sessions ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub phone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub phone: String,
    pub is_ready: bool,
    pub qr: Option<String>,
}

/// POST /v1/sessions
pub async fn post_session(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionRequest>,
) -> Response {
    let user_id = match user_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match state.service.create_session(&user_id, &body.phone).await {
        Ok(created) => (
            StatusCode::CREATED,
            Json(CreateSessionResponse {
                session_id: created.session.id,
                phone: created.session.phone,
                is_ready: created.session.is_ready,
                qr: created.qr,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /v1/sessions
pub async fn get_sessions(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Response {
    let user_id = match user_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match state.service.list_sessions(&user_id).await {
        Ok(sessions) => Json(sessions).into_response(),
        Err(err) => error_response(err),
    }
}

/// DELETE /v1/sessions/{session_id}
pub async fn delete_session(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Response {
    let user_id = match user_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match state.service.remove_session(&session_id, &user_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

// --- Sends ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequest {
    pub whatsapp_phone_id: String,
    pub whatsapp_phone_number: String,
    pub target_phone_number: String,
    pub message: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default = "default_send_now")]
    pub send_now: bool,
}

fn default_send_now() -> bool {
    true
}

impl OutboundRequest {
    fn into_input(self, kind: OutboundKind) -> SendInput {
        SendInput {
            session_id: self.whatsapp_phone_id,
            session_phone: self.whatsapp_phone_number,
            target_phone: self.target_phone_number,
            body: self.message,
            kind,
            country_code: self.country_code,
            media_url: self.media_url,
        }
    }
}

async fn send_outbound(state: GatewayState, kind: OutboundKind, body: OutboundRequest) -> Response {
    let send_now = body.send_now;
    let input = body.into_input(kind);
    let result = if send_now {
        state.service.send_now(&input).await
    } else {
        state.service.enqueue(&input).await
    };
    match result {
        Ok(item) => {
            let status = if item.status == DeliveryStatus::Pending {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(item)).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn send_outbound_batch(
    state: GatewayState,
    kind: OutboundKind,
    batch: Vec<OutboundRequest>,
) -> Response {
    let inputs: Vec<SendInput> = batch
        .into_iter()
        .map(|request| request.into_input(kind))
        .collect();
    match state.service.enqueue_batch(&inputs).await {
        Ok(items) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "count": items.len() })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /v1/messages
pub async fn post_message(
    State(state): State<GatewayState>,
    Json(body): Json<OutboundRequest>,
) -> Response {
    send_outbound(state, OutboundKind::Message, body).await
}

/// POST /v1/messages/batch
pub async fn post_message_batch(
    State(state): State<GatewayState>,
    Json(batch): Json<Vec<OutboundRequest>>,
) -> Response {
    send_outbound_batch(state, OutboundKind::Message, batch).await
}

/// POST /v1/notifications
pub async fn post_notification(
    State(state): State<GatewayState>,
    Json(body): Json<OutboundRequest>,
) -> Response {
    send_outbound(state, OutboundKind::Notification, body).await
}

/// POST /v1/notifications/batch
pub async fn post_notification_batch(
    State(state): State<GatewayState>,
    Json(batch): Json<Vec<OutboundRequest>>,
) -> Response {
    send_outbound_batch(state, OutboundKind::Notification, batch).await
}

// --- Listings ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub per_page: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<OutboundItem>,
    pub pagination: kirim_service::Page,
}

async fn list_outbound(
    state: GatewayState,
    headers: HeaderMap,
    kind: OutboundKind,
    query: ListQuery,
) -> Response {
    let user_id = match user_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let mut filter = OutboundFilter {
        kind: Some(kind),
        ..OutboundFilter::default()
    };
    if let Some(ref status) = query.status {
        match DeliveryStatus::from_str(status) {
            Ok(status) => filter.status = Some(status),
            Err(_) => {
                return error_response(KirimError::validation("status", "invalid status"));
            }
        }
    }
    if let Some(ref environment) = query.environment {
        match Environment::from_str(environment) {
            Ok(environment) => filter.environment = Some(environment),
            Err(_) => {
                return error_response(KirimError::validation(
                    "environment",
                    "invalid environment",
                ));
            }
        }
    }

    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(100);
    match state
        .service
        .list_outbound(&user_id, filter, page, per_page)
        .await
    {
        Ok((items, pagination)) => Json(ListResponse { items, pagination }).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /v1/messages
pub async fn get_messages(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    list_outbound(state, headers, OutboundKind::Message, query).await
}

/// GET /v1/notifications
pub async fn get_notifications(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    list_outbound(state, headers, OutboundKind::Notification, query).await
}

/// GET /v1/counts
pub async fn get_counts(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    let user_id = match user_id(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match state.service.all_time_counts(&user_id).await {
        Ok(counts) => Json(counts).into_response(),
        Err(err) => error_response(err),
    }
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health (unauthenticated, for probes)
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
    .into_response()
}
