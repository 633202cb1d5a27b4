// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence contract for sessions and outbound items.

use async_trait::async_trait;

use crate::error::KirimError;
use crate::types::{
    DeliveryStatus, Environment, OutboundFilter, OutboundItem, OutboundKind, Session,
    SessionPatch,
};

/// Row-oriented store for the session registry and the outbound audit trail.
///
/// The durable session flags are the single source of truth for
/// `is_ready`/`is_deleted`/`is_disconnected` and must be updated before any
/// in-memory handle eviction, so a crash between the two leaves the session
/// conservatively unusable rather than stale-usable.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // --- Sessions ---

    async fn create_session(&self, session: &Session) -> Result<(), KirimError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, KirimError>;

    /// Lists a tenant's sessions. With `usable_only`, restricts to ready,
    /// non-deleted sessions (the set quota is counted against).
    async fn list_sessions_for_user(
        &self,
        user_id: &str,
        usable_only: bool,
    ) -> Result<Vec<Session>, KirimError>;

    async fn list_disconnected_sessions(&self) -> Result<Vec<Session>, KirimError>;

    /// Applies a flag patch and touches `updated_at`.
    async fn update_session_flags(
        &self,
        id: &str,
        patch: &SessionPatch,
    ) -> Result<(), KirimError>;

    // --- Outbound items ---

    async fn insert_outbound(&self, item: &OutboundItem) -> Result<(), KirimError>;

    async fn get_outbound(&self, id: &str) -> Result<Option<OutboundItem>, KirimError>;

    /// All `PENDING` items across sessions, oldest first.
    async fn list_pending(&self) -> Result<Vec<OutboundItem>, KirimError>;

    /// Records a send outcome on a pending item.
    ///
    /// Returns `false` (without writing) when the item was already in a
    /// terminal state: delivered/failed/disconnected are monotonic.
    async fn record_outcome(
        &self,
        id: &str,
        status: DeliveryStatus,
        environment: Environment,
    ) -> Result<bool, KirimError>;

    /// Flips every `PENDING` item of the given sessions to `DISCONNECTED`.
    /// Returns the number of items swept.
    async fn mark_disconnected(&self, session_ids: &[String]) -> Result<u64, KirimError>;

    async fn list_outbound(
        &self,
        session_ids: &[String],
        filter: &OutboundFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OutboundItem>, KirimError>;

    async fn count_outbound(
        &self,
        session_ids: &[String],
        filter: &OutboundFilter,
    ) -> Result<i64, KirimError>;

    /// Counts items created in `[from, to)` for the given sessions,
    /// regardless of kind or status. Bounds are ISO-8601 strings.
    async fn count_in_range(
        &self,
        session_ids: &[String],
        from: &str,
        to: &str,
    ) -> Result<i64, KirimError>;

    /// All-time item count of one kind for the given sessions.
    async fn count_all_time(
        &self,
        session_ids: &[String],
        kind: OutboundKind,
    ) -> Result<i64, KirimError>;
}
