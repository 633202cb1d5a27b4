// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST client factory for a local WhatsApp-Web bridge.
//!
//! The wire protocol itself is out of scope: a bridge process (Evolution-API
//! style) owns the WhatsApp Web connection and credential store per
//! instance, and exposes it over HTTP. `connect` starts an instance and
//! polls its status endpoint, translating states into [`ClientEvent`]s;
//! the resulting [`BridgeClient`] sends text and media via REST.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use kirim_config::model::WhatsappConfig;
use kirim_core::{
    ClientEvent, ClientFactory, KirimError, MediaPayload, MessageId, PendingClient,
    WhatsappClient,
};

/// Consecutive failed status polls before the instance is declared gone.
const MAX_POLL_FAILURES: u32 = 5;

/// Shared request plumbing for factory and clients.
#[derive(Clone)]
struct BridgeHttp {
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl BridgeHttp {
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }
}

fn http_error(context: &str, e: reqwest::Error) -> KirimError {
    KirimError::Client {
        message: format!("bridge {context} failed"),
        source: Some(Box::new(e)),
    }
}

/// Status payload reported by `GET /instance/{id}/status`.
#[derive(Debug, Deserialize)]
struct InstanceStatus {
    state: String,
    #[serde(default)]
    qr: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    chat_id: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct SendMediaRequest<'a> {
    chat_id: &'a str,
    caption: &'a str,
    mime_type: &'a str,
    filename: Option<&'a str>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

/// Production [`ClientFactory`] backed by the bridge REST API.
pub struct BridgeFactory {
    http: BridgeHttp,
    poll_interval: Duration,
}

impl BridgeFactory {
    pub fn new(config: &WhatsappConfig) -> Self {
        Self {
            http: BridgeHttp {
                base_url: config.bridge_url.clone(),
                api_key: config.bridge_api_key.clone(),
                http: reqwest::Client::new(),
            },
            poll_interval: Duration::from_millis(config.status_poll_interval_ms),
        }
    }

    /// Translate one status response into at most one event to emit.
    ///
    /// `last_qr`/`authenticated_seen` suppress repeats across polls; a
    /// refreshed QR string is emitted again.
    fn event_for(
        status: &InstanceStatus,
        last_qr: &mut Option<String>,
        authenticated_seen: &mut bool,
    ) -> Option<ClientEvent> {
        let reason = || status.reason.clone().unwrap_or_else(|| "unknown".to_string());
        match status.state.as_str() {
            "qr" => match &status.qr {
                Some(qr) if last_qr.as_deref() != Some(qr.as_str()) => {
                    *last_qr = Some(qr.clone());
                    Some(ClientEvent::Qr(qr.clone()))
                }
                _ => None,
            },
            "authenticated" if !*authenticated_seen => {
                *authenticated_seen = true;
                Some(ClientEvent::Authenticated)
            }
            "ready" | "open" => Some(ClientEvent::Ready),
            "auth_failure" => Some(ClientEvent::AuthFailure(reason())),
            "disconnected" | "close" => Some(ClientEvent::Disconnected(reason())),
            _ => None,
        }
    }
}

#[async_trait]
impl ClientFactory for BridgeFactory {
    async fn connect(&self, session_id: &str) -> Result<PendingClient, KirimError> {
        self.http
            .request(
                reqwest::Method::POST,
                &format!("/instance/{session_id}/connect"),
            )
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error("connect", e))?;

        let (tx, rx) = mpsc::channel(32);
        let http = self.http.clone();
        let poll_interval = self.poll_interval;
        let status_path = format!("/instance/{session_id}/status");
        let session = session_id.to_string();

        tokio::spawn(async move {
            let mut last_qr: Option<String> = None;
            let mut authenticated_seen = false;
            let mut failures = 0u32;
            loop {
                tokio::time::sleep(poll_interval).await;

                let status = match http
                    .request(reqwest::Method::GET, &status_path)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                {
                    Ok(response) => match response.json::<InstanceStatus>().await {
                        Ok(status) => {
                            failures = 0;
                            status
                        }
                        Err(e) => {
                            warn!(session_id = session.as_str(), error = %e, "bad status payload");
                            failures += 1;
                            if failures >= MAX_POLL_FAILURES {
                                let _ = tx
                                    .send(ClientEvent::Disconnected(
                                        "bridge unreachable".to_string(),
                                    ))
                                    .await;
                                break;
                            }
                            continue;
                        }
                    },
                    Err(e) => {
                        debug!(session_id = session.as_str(), error = %e, "status poll failed");
                        failures += 1;
                        if failures >= MAX_POLL_FAILURES {
                            let _ = tx
                                .send(ClientEvent::Disconnected(
                                    "bridge unreachable".to_string(),
                                ))
                                .await;
                            break;
                        }
                        continue;
                    }
                };

                if let Some(event) = Self::event_for(&status, &mut last_qr, &mut authenticated_seen)
                {
                    let decisive = matches!(
                        event,
                        ClientEvent::Ready
                            | ClientEvent::AuthFailure(_)
                            | ClientEvent::Disconnected(_)
                    );
                    if tx.send(event).await.is_err() {
                        break; // receiver gone, stop polling
                    }
                    if decisive {
                        break;
                    }
                }
            }
        });

        let client = Arc::new(BridgeClient {
            http: self.http.clone(),
            session_id: session_id.to_string(),
        });

        Ok(PendingClient {
            client,
            events: rx,
        })
    }

    async fn remove_credentials(&self, session_id: &str) -> Result<(), KirimError> {
        let response = self
            .http
            .request(reqwest::Method::DELETE, &format!("/instance/{session_id}"))
            .send()
            .await
            .map_err(|e| http_error("instance removal", e))?;

        // A missing instance means the credentials are already gone.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        response
            .error_for_status()
            .map_err(|e| http_error("instance removal", e))?;
        Ok(())
    }
}

/// Live handle sending through one bridge instance.
pub struct BridgeClient {
    http: BridgeHttp,
    session_id: String,
}

#[async_trait]
impl WhatsappClient for BridgeClient {
    async fn send_text(&self, chat_id: &str, body: &str) -> Result<MessageId, KirimError> {
        let response: SendResponse = self
            .http
            .request(
                reqwest::Method::POST,
                &format!("/instance/{}/send-text", self.session_id),
            )
            .json(&SendTextRequest { chat_id, body })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error("send-text", e))?
            .json()
            .await
            .map_err(|e| http_error("send-text response", e))?;
        Ok(MessageId(response.message_id))
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<MessageId, KirimError> {
        let payload = SendMediaRequest {
            chat_id,
            caption,
            mime_type: &media.mime_type,
            filename: media.filename.as_deref(),
            data: base64::engine::general_purpose::STANDARD.encode(&media.data),
        };
        let response: SendResponse = self
            .http
            .request(
                reqwest::Method::POST,
                &format!("/instance/{}/send-media", self.session_id),
            )
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error("send-media", e))?
            .json()
            .await
            .map_err(|e| http_error("send-media response", e))?;
        Ok(MessageId(response.message_id))
    }

    async fn destroy(&self) -> Result<(), KirimError> {
        self.http
            .request(
                reqwest::Method::POST,
                &format!("/instance/{}/logout", self.session_id),
            )
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error("logout", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn factory_for(server: &MockServer) -> BridgeFactory {
        BridgeFactory::new(&WhatsappConfig {
            bridge_url: server.uri(),
            bridge_api_key: Some("test-key".to_string()),
            default_country_code: "62".to_string(),
            pairing_timeout_secs: 5,
            status_poll_interval_ms: 10,
        })
    }

    #[tokio::test]
    async fn connect_polls_status_until_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instance/s1/connect"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/instance/s1/status"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"state": "connecting"})),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/instance/s1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "ready"})))
            .mount(&server)
            .await;

        let factory = factory_for(&server);
        let mut pending = factory.connect("s1").await.unwrap();
        assert_eq!(pending.events.recv().await, Some(ClientEvent::Ready));
    }

    #[tokio::test]
    async fn qr_states_emit_qr_then_ready_after_scan() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instance/s1/connect"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/instance/s1/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"state": "qr", "qr": "qr-data"})),
            )
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/instance/s1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "open"})))
            .mount(&server)
            .await;

        let factory = factory_for(&server);
        let mut pending = factory.connect("s1").await.unwrap();

        // The repeated "qr" polls collapse into one event.
        assert_eq!(
            pending.events.recv().await,
            Some(ClientEvent::Qr("qr-data".into()))
        );
        assert_eq!(pending.events.recv().await, Some(ClientEvent::Ready));
    }

    #[tokio::test]
    async fn auth_failure_state_surfaces_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instance/s1/connect"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/instance/s1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"state": "auth_failure", "reason": "session invalidated"}),
            ))
            .mount(&server)
            .await;

        let factory = factory_for(&server);
        let mut pending = factory.connect("s1").await.unwrap();
        assert_eq!(
            pending.events.recv().await,
            Some(ClientEvent::AuthFailure("session invalidated".into()))
        );
        // Decisive event ends polling and closes the stream.
        assert_eq!(pending.events.recv().await, None);
    }

    #[tokio::test]
    async fn send_text_posts_and_parses_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/instance/s1/connect"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/instance/s1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "ready"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/instance/s1/send-text"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message_id": "wamid.123"})),
            )
            .mount(&server)
            .await;

        let factory = factory_for(&server);
        let pending = factory.connect("s1").await.unwrap();
        let message_id = pending
            .client
            .send_text("6281198765@c.us", "hello")
            .await
            .unwrap();
        assert_eq!(message_id, MessageId("wamid.123".into()));
    }

    #[tokio::test]
    async fn remove_credentials_tolerates_missing_instance() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/instance/s1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let factory = factory_for(&server);
        factory.remove_credentials("s1").await.unwrap();
    }
}
