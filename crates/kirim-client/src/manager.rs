// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client connection manager.
//!
//! Owns the pairing state machine and the live-handle registry for every
//! session. The in-memory registry is not durable: after a restart, the
//! first operation needing a handle reconnects from on-disk credentials
//! through the same single-flight path, so repeated attempts never register
//! duplicate handles.
//!
//! Ordering invariant: durable session flags are written before any
//! in-memory eviction. A crash between the two leaves the session marked
//! unusable, never stale-usable.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use kirim_core::{
    ClientEvent, ClientFactory, KirimError, PendingClient, SessionPatch, Storage,
    WhatsappClient,
};

use crate::pairing::{await_pairing, PairingOutcome};
use crate::registry::ClientRegistry;

/// How `init_client` resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A QR code was issued; pairing completes in the background once the
    /// user scans it.
    QrIssued(String),
    /// Stored credentials were still valid; the session is ready now.
    Ready,
}

/// Maintains the pairing state machine and the live-handle registry.
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct ClientManager {
    registry: Arc<ClientRegistry>,
    factory: Arc<dyn ClientFactory>,
    storage: Arc<dyn Storage>,
    pairing_timeout: Duration,
    /// Per-session connect locks: reconnection is single-flight.
    connect_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ClientManager {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        storage: Arc<dyn Storage>,
        pairing_timeout: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new()),
            factory,
            storage,
            pairing_timeout,
            connect_locks: Arc::new(DashMap::new()),
        }
    }

    /// Start pairing for a session.
    ///
    /// Returns once either a QR code has been issued (caller should surface
    /// it) or the client reached ready (caller may proceed immediately).
    /// Auth failure, disconnect, or timeout before a stable state tears the
    /// session down and surfaces an error.
    pub async fn init_client(&self, session_id: &str) -> Result<InitOutcome, KirimError> {
        info!(session_id, "initializing client");
        let PendingClient { client, mut events } = self.factory.connect(session_id).await?;

        match await_pairing(&mut events, self.pairing_timeout).await {
            PairingOutcome::Ready => {
                self.finish_ready(session_id, client).await?;
                Ok(InitOutcome::Ready)
            }
            PairingOutcome::QrIssued(qr) => {
                info!(session_id, "qr issued");
                self.registry.set_qr(session_id, &qr);
                self.spawn_scan_watch(session_id.to_string(), client, events);
                Ok(InitOutcome::QrIssued(qr))
            }
            PairingOutcome::Failed(reason) => {
                warn!(session_id, %reason, "pairing failed");
                self.teardown_local(session_id).await?;
                Err(KirimError::PairingFailed {
                    session_id: session_id.to_string(),
                    reason,
                })
            }
            PairingOutcome::TimedOut(duration) => {
                warn!(session_id, ?duration, "pairing timed out");
                self.teardown_local(session_id).await?;
                Err(KirimError::Timeout { duration })
            }
        }
    }

    /// The last-issued QR string, or `None`. Pure lookup, no side effects.
    pub fn get_client_qr(&self, session_id: &str) -> Option<String> {
        self.registry.qr(session_id)
    }

    /// The live handle for a session, if one exists right now.
    pub fn live_handle(&self, session_id: &str) -> Option<Arc<dyn WhatsappClient>> {
        self.registry.get(session_id)
    }

    /// Re-establish a live handle from stored credentials.
    ///
    /// Single-flight per session: concurrent callers share one handshake and
    /// exactly one handle ends up registered. A QR event during reconnect
    /// means the credentials are gone, which is a pairing failure, not a
    /// prompt to scan.
    pub async fn reconnect(
        &self,
        session_id: &str,
    ) -> Result<Arc<dyn WhatsappClient>, KirimError> {
        if let Some(handle) = self.registry.get(session_id) {
            return Ok(handle);
        }

        let lock = self
            .connect_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another caller may have finished while we waited for the lock.
        if let Some(handle) = self.registry.get(session_id) {
            return Ok(handle);
        }

        info!(session_id, "reconnecting client");
        let PendingClient { client, mut events } = self.factory.connect(session_id).await?;

        match await_pairing(&mut events, self.pairing_timeout).await {
            PairingOutcome::Ready => {
                self.finish_ready(session_id, client.clone()).await?;
                Ok(client)
            }
            PairingOutcome::QrIssued(_) => {
                warn!(session_id, "reconnect got a fresh qr, credentials are gone");
                self.teardown_local(session_id).await?;
                Err(KirimError::PairingFailed {
                    session_id: session_id.to_string(),
                    reason: "stored credentials rejected, re-pair required".to_string(),
                })
            }
            PairingOutcome::Failed(reason) => {
                warn!(session_id, %reason, "reconnect failed");
                self.teardown_local(session_id).await?;
                Err(KirimError::PairingFailed {
                    session_id: session_id.to_string(),
                    reason,
                })
            }
            PairingOutcome::TimedOut(duration) => {
                warn!(session_id, ?duration, "reconnect timed out");
                self.teardown_local(session_id).await?;
                Err(KirimError::Timeout { duration })
            }
        }
    }

    /// Tear a session down for good.
    ///
    /// The registry row is flagged deleted (and disconnected) first so no
    /// further dispatch can target the session even if the rest of the
    /// teardown fails. The live client is shut down gracefully when one
    /// exists, otherwise a best-effort reconnect produces one to shut down.
    /// Credentials and the in-memory entry are always removed.
    pub async fn destroy_client(&self, session_id: &str) -> Result<(), KirimError> {
        info!(session_id, "destroying client");
        self.storage
            .update_session_flags(session_id, &SessionPatch::deleted())
            .await?;

        let handle = match self.registry.get(session_id) {
            Some(handle) => Some(handle),
            None => self.connect_for_shutdown(session_id).await,
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.destroy().await {
                warn!(session_id, error = %e, "graceful client shutdown failed");
            }
        }

        if let Err(e) = self.factory.remove_credentials(session_id).await {
            warn!(session_id, error = %e, "credential removal failed");
        }
        self.registry.evict(session_id);
        self.registry.discard_qr(session_id);
        Ok(())
    }

    /// Best-effort handshake purely to obtain a handle for graceful
    /// shutdown. Never registers the handle and swallows every failure.
    async fn connect_for_shutdown(&self, session_id: &str) -> Option<Arc<dyn WhatsappClient>> {
        let PendingClient { client, mut events } =
            self.factory.connect(session_id).await.ok()?;
        match await_pairing(&mut events, self.pairing_timeout).await {
            PairingOutcome::Ready => Some(client),
            _ => None,
        }
    }

    /// Register the handle and persist the ready transition.
    ///
    /// The flag write is a no-op patch when already ready, so reconnects
    /// after a restart cannot corrupt the persisted state.
    async fn finish_ready(
        &self,
        session_id: &str,
        client: Arc<dyn WhatsappClient>,
    ) -> Result<(), KirimError> {
        self.storage
            .update_session_flags(session_id, &SessionPatch::ready())
            .await?;
        self.registry.insert(session_id, client);
        self.registry.discard_qr(session_id);
        info!(session_id, "client ready");
        Ok(())
    }

    /// Degrade a session after a failed handshake or disconnect: durable
    /// flag first, then credentials, then the in-memory entries.
    async fn teardown_local(&self, session_id: &str) -> Result<(), KirimError> {
        self.storage
            .update_session_flags(session_id, &SessionPatch::disconnected())
            .await?;
        if let Err(e) = self.factory.remove_credentials(session_id).await {
            warn!(session_id, error = %e, "credential removal failed");
        }
        self.registry.evict(session_id);
        self.registry.discard_qr(session_id);
        Ok(())
    }

    /// After QR issuance, pairing completes out-of-band: keep consuming
    /// events until the scan produces ready (or the attempt dies). A
    /// refreshed QR replaces the stored one.
    fn spawn_scan_watch(
        &self,
        session_id: String,
        client: Arc<dyn WhatsappClient>,
        mut events: mpsc::Receiver<ClientEvent>,
    ) {
        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                match await_pairing(&mut events, manager.pairing_timeout).await {
                    PairingOutcome::QrIssued(qr) => {
                        manager.registry.set_qr(&session_id, &qr);
                    }
                    PairingOutcome::Ready => {
                        if let Err(e) = manager.finish_ready(&session_id, client).await {
                            warn!(session_id = session_id.as_str(), error = %e, "ready transition failed");
                        }
                        break;
                    }
                    PairingOutcome::Failed(reason) => {
                        warn!(session_id = session_id.as_str(), %reason, "pairing failed while awaiting scan");
                        if let Err(e) = manager.teardown_local(&session_id).await {
                            warn!(session_id = session_id.as_str(), error = %e, "teardown failed");
                        }
                        break;
                    }
                    PairingOutcome::TimedOut(duration) => {
                        warn!(session_id = session_id.as_str(), ?duration, "qr scan window elapsed");
                        if let Err(e) = manager.teardown_local(&session_id).await {
                            warn!(session_id = session_id.as_str(), error = %e, "teardown failed");
                        }
                        break;
                    }
                }
            }
        });
    }
}
