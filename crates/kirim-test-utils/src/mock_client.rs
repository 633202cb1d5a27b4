// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging client and factory for deterministic testing.
//!
//! `MockClientFactory` hands out scripted pairing event sequences so tests
//! can drive the connection manager through QR issuance, ready, auth failure,
//! and disconnect paths without a real WhatsApp bridge.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use kirim_core::{
    ClientEvent, ClientFactory, KirimError, MediaPayload, MessageId, PendingClient,
    WhatsappClient,
};

/// One captured outbound send.
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub chat_id: String,
    pub body: String,
    pub media: Option<MediaPayload>,
}

/// A mock live client that captures sends and can be told to fail them.
pub struct MockWhatsappClient {
    session_id: String,
    sent: Mutex<Vec<SentRecord>>,
    fail_sends: AtomicBool,
    destroyed: AtomicBool,
}

impl MockWhatsappClient {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Make every subsequent send return an error.
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// All sends captured so far.
    pub async fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn record(
        &self,
        chat_id: &str,
        body: &str,
        media: Option<&MediaPayload>,
    ) -> Result<MessageId, KirimError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(KirimError::Client {
                message: format!("mock send failure for {}", self.session_id),
                source: None,
            });
        }
        self.sent.lock().await.push(SentRecord {
            chat_id: chat_id.to_string(),
            body: body.to_string(),
            media: media.cloned(),
        });
        Ok(MessageId(format!("mock-{}", uuid::Uuid::new_v4())))
    }
}

#[async_trait]
impl WhatsappClient for MockWhatsappClient {
    async fn send_text(&self, chat_id: &str, body: &str) -> Result<MessageId, KirimError> {
        self.record(chat_id, body, None).await
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<MessageId, KirimError> {
        self.record(chat_id, caption, Some(media)).await
    }

    async fn destroy(&self) -> Result<(), KirimError> {
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A mock client factory with scripted pairing event sequences.
///
/// Each `connect()` call consumes the next script (defaulting to an
/// immediate `Ready`), buffers its events into the returned stream, and
/// keeps the sender alive so tests can emit further events later via
/// [`emit_last`].
///
/// [`emit_last`]: MockClientFactory::emit_last
pub struct MockClientFactory {
    scripts: Mutex<VecDeque<Vec<ClientEvent>>>,
    senders: Mutex<Vec<mpsc::Sender<ClientEvent>>>,
    clients: Mutex<Vec<Arc<MockWhatsappClient>>>,
    removed: Mutex<Vec<String>>,
    connects: AtomicUsize,
    fail_connect: AtomicBool,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            senders: Mutex::new(Vec::new()),
            clients: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
        }
    }

    /// Queue the event sequence the next `connect()` will replay.
    pub async fn script(&self, events: Vec<ClientEvent>) {
        self.scripts.lock().await.push_back(events);
    }

    /// Make every subsequent `connect()` fail outright.
    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    /// Number of `connect()` calls observed.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Session ids whose credentials were removed, in order.
    pub async fn removed_credentials(&self) -> Vec<String> {
        self.removed.lock().await.clone()
    }

    /// The client handed out by the most recent `connect()`.
    pub async fn last_client(&self) -> Option<Arc<MockWhatsappClient>> {
        self.clients.lock().await.last().cloned()
    }

    /// Emit an event on the most recent connect's stream (e.g. a late
    /// `Ready` after the user scans the QR).
    pub async fn emit_last(&self, event: ClientEvent) {
        let sender = self
            .senders
            .lock()
            .await
            .last()
            .cloned()
            .expect("no connect() has been observed");
        sender.send(event).await.expect("event stream closed");
    }
}

impl Default for MockClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn connect(&self, session_id: &str) -> Result<PendingClient, KirimError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(KirimError::Client {
                message: format!("mock connect failure for {session_id}"),
                source: None,
            });
        }

        let script = self
            .scripts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| vec![ClientEvent::Ready]);

        let (tx, rx) = mpsc::channel(32);
        for event in script {
            tx.send(event).await.expect("fresh channel cannot be full");
        }
        self.senders.lock().await.push(tx);

        let client = Arc::new(MockWhatsappClient::new(session_id));
        self.clients.lock().await.push(client.clone());

        Ok(PendingClient {
            client,
            events: rx,
        })
    }

    async fn remove_credentials(&self, session_id: &str) -> Result<(), KirimError> {
        self.removed.lock().await.push(session_id.to_string());
        Ok(())
    }
}
