// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, auth middleware, and shared state. Three route groups:
//! an unauthenticated health probe, bearer-protected management routes, and
//! api-key-protected send routes -- matching the two credential audiences
//! (tenant dashboards vs. server-side API clients).

use std::time::Instant;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use kirim_config::model::GatewayConfig;
use kirim_core::KirimError;
use kirim_service::GatewayService;

use crate::auth::{api_key_middleware, bearer_auth_middleware, AuthConfig};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: GatewayService,
    /// Process start time for the health endpoint's uptime.
    pub start_time: Instant,
}

/// Assemble the full gateway router for the given state and auth config.
pub fn build_router(state: GatewayState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let management_routes = Router::new()
        .route("/v1/sessions", post(handlers::post_session))
        .route("/v1/sessions", get(handlers::get_sessions))
        .route("/v1/sessions/{session_id}", delete(handlers::delete_session))
        .route("/v1/messages", get(handlers::get_messages))
        .route("/v1/notifications", get(handlers::get_notifications))
        .route("/v1/counts", get(handlers::get_counts))
        .route_layer(axum_middleware::from_fn_with_state(
            auth.clone(),
            bearer_auth_middleware,
        ))
        .with_state(state.clone());

    let send_routes = Router::new()
        .route("/v1/messages", post(handlers::post_message))
        .route("/v1/messages/batch", post(handlers::post_message_batch))
        .route("/v1/notifications", post(handlers::post_notification))
        .route(
            "/v1/notifications/batch",
            post(handlers::post_notification_batch),
        )
        .route_layer(axum_middleware::from_fn_with_state(auth, api_key_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(management_routes)
        .merge(send_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve the gateway until the process exits.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
) -> Result<(), KirimError> {
    let auth = AuthConfig {
        bearer_token: config.bearer_token.clone(),
        api_key: config.api_key.clone(),
    };
    let app = build_router(state, auth);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| KirimError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| KirimError::Internal(format!("gateway server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use kirim_client::{ClientManager, Dispatcher};
    use kirim_config::model::QuotaConfig;
    use kirim_quota::{EnvironmentClassifier, SendLimiter};
    use kirim_test_utils::{MemoryStorage, MockClientFactory};

    const BEARER: &str = "test-bearer";
    const API_KEY: &str = "test-api-key";

    async fn router() -> (Router, GatewayState) {
        let factory = Arc::new(MockClientFactory::new());
        let storage = Arc::new(MemoryStorage::new());
        let manager =
            ClientManager::new(factory.clone(), storage.clone(), Duration::from_millis(300));
        let dispatcher = Dispatcher::new(manager.clone(), storage.clone(), "62".to_string());
        let classifier = Arc::new(EnvironmentClassifier::new(storage.clone(), 1000));
        let service = GatewayService::new(
            storage,
            manager,
            dispatcher,
            classifier,
            Arc::new(SendLimiter::new()),
            QuotaConfig::default(),
        );
        let state = GatewayState {
            service,
            start_time: Instant::now(),
        };
        let auth = AuthConfig {
            bearer_token: Some(BEARER.to_string()),
            api_key: Some(API_KEY.to_string()),
        };
        (build_router(state.clone(), auth), state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn management(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {BEARER}"))
            .header("x-user-id", "u1")
            .header(header::CONTENT_TYPE, "application/json");
        match body {
            Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn send(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("x-api-key", API_KEY)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn create_session(router: &Router) -> (String, String) {
        let response = router
            .clone()
            .oneshot(management(
                Method::POST,
                "/v1/sessions",
                Some(json!({"phone": "81234567"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        (
            body["sessionId"].as_str().unwrap().to_string(),
            body["phone"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let (router, _) = router().await;
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn management_routes_reject_missing_or_wrong_bearer() {
        let (router, _) = router().await;

        let response = router
            .clone()
            .oneshot(Request::get("/v1/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::get("/v1/sessions")
                    .header("authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn send_routes_require_the_api_key() {
        let (router, _) = router().await;
        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/v1/messages")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_create_then_synchronous_send() {
        let (router, _) = router().await;
        let (session_id, phone) = create_session(&router).await;

        let response = router
            .clone()
            .oneshot(send(
                "/v1/messages",
                json!({
                    "whatsappPhoneId": session_id,
                    "whatsappPhoneNumber": phone,
                    "targetPhoneNumber": "81198765",
                    "message": "hello",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "DELIVERED");
        assert_eq!(body["environment"], "DEVELOPMENT");
    }

    #[tokio::test]
    async fn deferred_send_is_accepted_as_pending() {
        let (router, _) = router().await;
        let (session_id, phone) = create_session(&router).await;

        let response = router
            .clone()
            .oneshot(send(
                "/v1/notifications",
                json!({
                    "whatsappPhoneId": session_id,
                    "whatsappPhoneNumber": phone,
                    "targetPhoneNumber": "81198765",
                    "message": "deferred",
                    "sendNow": false,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["kind"], "NOTIFICATION");
    }

    #[tokio::test]
    async fn invalid_target_phone_is_unprocessable() {
        let (router, _) = router().await;
        let (session_id, phone) = create_session(&router).await;

        let response = router
            .clone()
            .oneshot(send(
                "/v1/messages",
                json!({
                    "whatsappPhoneId": session_id,
                    "whatsappPhoneNumber": phone,
                    "targetPhoneNumber": "not-a-phone",
                    "message": "hello",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("targetPhoneNumber"));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (router, _) = router().await;

        let response = router
            .oneshot(send(
                "/v1/messages",
                json!({
                    "whatsappPhoneId": "ghost",
                    "whatsappPhoneNumber": "81234567",
                    "targetPhoneNumber": "81198765",
                    "message": "hello",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listing_returns_items_with_pagination() {
        let (router, _) = router().await;
        let (session_id, phone) = create_session(&router).await;

        for _ in 0..3 {
            router
                .clone()
                .oneshot(send(
                    "/v1/messages",
                    json!({
                        "whatsappPhoneId": session_id,
                        "whatsappPhoneNumber": phone,
                        "targetPhoneNumber": "81198765",
                        "message": "hello",
                        "sendNow": false,
                    }),
                ))
                .await
                .unwrap();
        }

        let response = router
            .clone()
            .oneshot(management(
                Method::GET,
                "/v1/messages?page=1&perPage=2&status=PENDING",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["pagination"]["total"], 3);
        assert_eq!(body["pagination"]["totalPages"], 2);
    }

    #[tokio::test]
    async fn counts_split_messages_and_notifications() {
        let (router, _) = router().await;
        let (session_id, phone) = create_session(&router).await;

        let payload = json!({
            "whatsappPhoneId": session_id,
            "whatsappPhoneNumber": phone,
            "targetPhoneNumber": "81198765",
            "message": "hello",
            "sendNow": false,
        });
        router
            .clone()
            .oneshot(send("/v1/messages", payload.clone()))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(send("/v1/notifications", payload))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(management(Method::GET, "/v1/counts", None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["messages"], 1);
        assert_eq!(body["notifications"], 1);
    }

    #[tokio::test]
    async fn delete_session_tears_down() {
        let (router, state) = router().await;
        let (session_id, _) = create_session(&router).await;

        let response = router
            .clone()
            .oneshot(management(
                Method::DELETE,
                &format!("/v1/sessions/{session_id}"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sessions = state.service.list_sessions("u1").await.unwrap();
        assert!(sessions.is_empty());
    }
}
