// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External messaging client traits.
//!
//! The WhatsApp wire protocol is an opaque external capability behind two
//! seams: [`ClientFactory`] performs the pairing handshake and owns the
//! on-disk credential store for each session, and [`WhatsappClient`] is the
//! live handle a successful handshake produces.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::KirimError;
use crate::types::{ClientEvent, MediaPayload, MessageId};

/// A live, authenticated connection to the external messaging system for
/// one session. Never persisted; at most one per session per process.
#[async_trait]
pub trait WhatsappClient: Send + Sync + 'static {
    /// Sends a plain text message to a destination chat id
    /// (`<countrycode><phone>@c.us`).
    async fn send_text(&self, chat_id: &str, body: &str) -> Result<MessageId, KirimError>;

    /// Sends a media attachment with the body as caption.
    async fn send_media(
        &self,
        chat_id: &str,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<MessageId, KirimError>;

    /// Gracefully closes the connection.
    async fn destroy(&self) -> Result<(), KirimError>;
}

/// A client whose handshake has been started but not yet resolved.
///
/// The handle becomes meaningful only once `events` yields
/// [`ClientEvent::Ready`]; before that, sends will fail.
pub struct PendingClient {
    pub client: Arc<dyn WhatsappClient>,
    pub events: mpsc::Receiver<ClientEvent>,
}

/// Constructs clients scoped to a session's credential store.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    /// Starts the connection handshake for a session.
    ///
    /// The returned event stream carries the pairing lifecycle: a fresh
    /// session yields `Qr` before `Ready`; a session with stored credentials
    /// goes straight to `Authenticated`/`Ready`. `AuthFailure` and
    /// `Disconnected` end the stream.
    async fn connect(&self, session_id: &str) -> Result<PendingClient, KirimError>;

    /// Deletes the session's credential store.
    ///
    /// Idempotent: removing credentials that are already gone is not an error.
    async fn remove_credentials(&self, session_id: &str) -> Result<(), KirimError>;
}
