// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound dispatcher.
//!
//! Delivers exactly one item through a session's live client, reconnecting
//! transparently when no handle exists. Failures come back as `None`, not
//! errors: the scheduler processes many items per tick and a single bad send
//! must never abort the batch. The uniform sentinel keeps the caller's
//! delivered/failed aggregation branch-free.

use std::sync::Arc;

use tracing::{debug, warn};

use kirim_core::{KirimError, MediaPayload, MessageId, Storage};

use crate::manager::ClientManager;

/// One send through a session's client.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub session_id: String,
    pub target_phone: String,
    pub body: String,
    /// Country code override; the configured default applies when `None`.
    pub country_code: Option<String>,
    /// When present, fetched and sent as media with the body as caption.
    pub media_url: Option<String>,
}

/// Sends one message or notification through a live client handle.
#[derive(Clone)]
pub struct Dispatcher {
    manager: ClientManager,
    storage: Arc<dyn Storage>,
    http: reqwest::Client,
    default_country_code: String,
}

impl Dispatcher {
    pub fn new(
        manager: ClientManager,
        storage: Arc<dyn Storage>,
        default_country_code: String,
    ) -> Self {
        Self {
            manager,
            storage,
            http: reqwest::Client::new(),
            default_country_code,
        }
    }

    /// Destination chat id: `<countrycode><phone>@c.us`.
    pub fn chat_id(&self, country_code: Option<&str>, phone: &str) -> String {
        let code = country_code.unwrap_or(&self.default_country_code);
        format!("{code}{phone}@c.us")
    }

    /// Attempt one delivery. `None` means "not delivered" -- the error has
    /// already been logged and the caller records the item as failed.
    pub async fn send(&self, request: &DispatchRequest) -> Option<MessageId> {
        match self.try_send(request).await {
            Ok(message_id) => {
                debug!(
                    session_id = request.session_id.as_str(),
                    message_id = message_id.0.as_str(),
                    "item delivered"
                );
                Some(message_id)
            }
            Err(e) => {
                warn!(
                    session_id = request.session_id.as_str(),
                    error = %e,
                    "dispatch failed"
                );
                None
            }
        }
    }

    async fn try_send(&self, request: &DispatchRequest) -> Result<MessageId, KirimError> {
        // Deleted (or unknown) sessions fail before any client contact.
        let session = self
            .storage
            .get_session(&request.session_id)
            .await?
            .ok_or_else(|| KirimError::NotFound {
                what: "session".to_string(),
            })?;
        if session.is_deleted {
            return Err(KirimError::Client {
                message: format!("session {} is deleted", request.session_id),
                source: None,
            });
        }

        let chat_id = self.chat_id(request.country_code.as_deref(), &request.target_phone);

        let client = match self.manager.live_handle(&request.session_id) {
            Some(handle) => handle,
            None => self.manager.reconnect(&request.session_id).await?,
        };

        match &request.media_url {
            Some(url) => {
                let media = self.fetch_media(url).await?;
                client.send_media(&chat_id, &media, &request.body).await
            }
            None => client.send_text(&chat_id, &request.body).await,
        }
    }

    /// Fetch a media URL into a payload the client can attach.
    async fn fetch_media(&self, url: &str) -> Result<MediaPayload, KirimError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KirimError::Client {
                message: format!("media fetch failed for {url}"),
                source: Some(Box::new(e)),
            })?;

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap_or("application/octet-stream")
            .to_string();

        let filename = url
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string());

        let data = response
            .bytes()
            .await
            .map_err(|e| KirimError::Client {
                message: format!("media body read failed for {url}"),
                source: Some(Box::new(e)),
            })?
            .to_vec();

        Ok(MediaPayload {
            mime_type,
            filename,
            data,
        })
    }
}
