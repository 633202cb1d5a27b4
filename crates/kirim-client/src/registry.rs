// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local registry of live client handles and pending QR codes.
//!
//! The registry is the sole owner of the session-id → handle mapping. A
//! handle's presence here is the single source of truth for "can we send
//! synchronously right now"; nothing outside this crate touches the maps
//! directly. None of this state survives a restart -- reconnection rebuilds
//! it from on-disk credentials.

use std::sync::Arc;

use dashmap::DashMap;

use kirim_core::WhatsappClient;

/// Concurrency-safe mapping from session id to live client handle, plus the
/// last-issued QR string per session still waiting for a scan.
#[derive(Default)]
pub struct ClientRegistry {
    handles: DashMap<String, Arc<dyn WhatsappClient>>,
    qr_codes: DashMap<String, String>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live handle for a session, if one exists.
    pub fn get(&self, session_id: &str) -> Option<Arc<dyn WhatsappClient>> {
        self.handles.get(session_id).map(|entry| entry.value().clone())
    }

    /// Register a handle, replacing any previous one for the session.
    pub fn insert(&self, session_id: &str, handle: Arc<dyn WhatsappClient>) {
        self.handles.insert(session_id.to_string(), handle);
    }

    /// Drop a session's handle. Returns whether one was present.
    pub fn evict(&self, session_id: &str) -> bool {
        self.handles.remove(session_id).is_some()
    }

    /// Number of live handles (tests and diagnostics).
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// The last-issued QR string for a session, if pairing is still waiting
    /// for a scan. Pure lookup, no side effects.
    pub fn qr(&self, session_id: &str) -> Option<String> {
        self.qr_codes.get(session_id).map(|entry| entry.value().clone())
    }

    /// Store (or refresh) a session's pending QR string.
    pub fn set_qr(&self, session_id: &str, qr: &str) {
        self.qr_codes.insert(session_id.to_string(), qr.to_string());
    }

    /// Discard a session's pending QR (on ready or teardown).
    pub fn discard_qr(&self, session_id: &str) {
        self.qr_codes.remove(session_id);
    }
}
