// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `Storage` implementation for tests.
//!
//! Mirrors the semantics of `kirim-storage` (terminal-status guard,
//! half-open range counts, oldest-first pending order) without touching disk.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kirim_core::types::{
    DeliveryStatus, Environment, OutboundFilter, OutboundItem, OutboundKind, Session,
    SessionPatch,
};
use kirim_core::{KirimError, Storage};

/// In-memory storage fake.
#[derive(Default)]
pub struct MemoryStorage {
    sessions: Mutex<HashMap<String, Session>>,
    items: Mutex<Vec<OutboundItem>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read of one item, bypassing the trait (test assertions).
    pub async fn item(&self, id: &str) -> Option<OutboundItem> {
        self.items.lock().await.iter().find(|i| i.id == id).cloned()
    }

    /// Direct read of one session, bypassing the trait (test assertions).
    pub async fn session(&self, id: &str) -> Option<Session> {
        self.sessions.lock().await.get(id).cloned()
    }
}

fn matches_filter(item: &OutboundItem, filter: &OutboundFilter) -> bool {
    filter.kind.is_none_or(|k| item.kind == k)
        && filter.status.is_none_or(|s| item.status == s)
        && filter.environment.is_none_or(|e| item.environment == e)
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_session(&self, session: &Session) -> Result<(), KirimError> {
        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, KirimError> {
        Ok(self.sessions.lock().await.get(id).cloned())
    }

    async fn list_sessions_for_user(
        &self,
        user_id: &str,
        usable_only: bool,
    ) -> Result<Vec<Session>, KirimError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .lock()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .filter(|s| !usable_only || (s.is_ready && !s.is_deleted))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn list_disconnected_sessions(&self) -> Result<Vec<Session>, KirimError> {
        Ok(self
            .sessions
            .lock()
            .await
            .values()
            .filter(|s| s.is_disconnected)
            .cloned()
            .collect())
    }

    async fn update_session_flags(
        &self,
        id: &str,
        patch: &SessionPatch,
    ) -> Result<(), KirimError> {
        if let Some(session) = self.sessions.lock().await.get_mut(id) {
            if let Some(ready) = patch.is_ready {
                session.is_ready = ready;
            }
            if let Some(deleted) = patch.is_deleted {
                session.is_deleted = deleted;
            }
            if let Some(disconnected) = patch.is_disconnected {
                session.is_disconnected = disconnected;
            }
        }
        Ok(())
    }

    async fn insert_outbound(&self, item: &OutboundItem) -> Result<(), KirimError> {
        self.items.lock().await.push(item.clone());
        Ok(())
    }

    async fn get_outbound(&self, id: &str) -> Result<Option<OutboundItem>, KirimError> {
        Ok(self.item(id).await)
    }

    async fn list_pending(&self) -> Result<Vec<OutboundItem>, KirimError> {
        let mut pending: Vec<OutboundItem> = self
            .items
            .lock()
            .await
            .iter()
            .filter(|i| i.status == DeliveryStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(pending)
    }

    async fn record_outcome(
        &self,
        id: &str,
        status: DeliveryStatus,
        environment: Environment,
    ) -> Result<bool, KirimError> {
        let mut items = self.items.lock().await;
        match items
            .iter_mut()
            .find(|i| i.id == id && i.status == DeliveryStatus::Pending)
        {
            Some(item) => {
                item.status = status;
                item.environment = environment;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_disconnected(&self, session_ids: &[String]) -> Result<u64, KirimError> {
        let mut swept = 0;
        for item in self.items.lock().await.iter_mut() {
            if item.status == DeliveryStatus::Pending
                && session_ids.contains(&item.session_id)
            {
                item.status = DeliveryStatus::Disconnected;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn list_outbound(
        &self,
        session_ids: &[String],
        filter: &OutboundFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OutboundItem>, KirimError> {
        let mut matching: Vec<OutboundItem> = self
            .items
            .lock()
            .await
            .iter()
            .filter(|i| session_ids.contains(&i.session_id) && matches_filter(i, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_outbound(
        &self,
        session_ids: &[String],
        filter: &OutboundFilter,
    ) -> Result<i64, KirimError> {
        Ok(self
            .items
            .lock()
            .await
            .iter()
            .filter(|i| session_ids.contains(&i.session_id) && matches_filter(i, filter))
            .count() as i64)
    }

    async fn count_in_range(
        &self,
        session_ids: &[String],
        from: &str,
        to: &str,
    ) -> Result<i64, KirimError> {
        Ok(self
            .items
            .lock()
            .await
            .iter()
            .filter(|i| {
                session_ids.contains(&i.session_id)
                    && i.created_at.as_str() >= from
                    && i.created_at.as_str() < to
            })
            .count() as i64)
    }

    async fn count_all_time(
        &self,
        session_ids: &[String],
        kind: OutboundKind,
    ) -> Result<i64, KirimError> {
        Ok(self
            .items
            .lock()
            .await
            .iter()
            .filter(|i| session_ids.contains(&i.session_id) && i.kind == kind)
            .count() as i64)
    }
}
