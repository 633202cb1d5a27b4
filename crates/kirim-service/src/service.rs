// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The operations kirim exposes to its callers.
//!
//! Synchronous sends get an immediate delivered/failed answer; deferred
//! sends are accepted as `PENDING` and picked up by the scheduler. Every
//! item is recorded, whatever its outcome -- the outbound table is an
//! append-only audit trail.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use kirim_client::{ClientManager, DispatchRequest, Dispatcher, InitOutcome};
use kirim_config::model::QuotaConfig;
use kirim_core::types::{
    DeliveryStatus, Environment, OutboundFilter, OutboundItem, OutboundKind, Session,
};
use kirim_core::{KirimError, Storage};
use kirim_quota::{EnvironmentClassifier, SendLimiter};

use crate::validation;

/// One send request, synchronous or deferred.
#[derive(Debug, Clone)]
pub struct SendInput {
    /// Session identifier (the tenant's registered WhatsApp phone id).
    pub session_id: String,
    /// The session's own phone number; must match the session row.
    pub session_phone: String,
    pub target_phone: String,
    pub body: String,
    pub kind: OutboundKind,
    pub country_code: Option<String>,
    pub media_url: Option<String>,
}

/// Result of a pairing request.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session: Session,
    /// QR string to display when the pairing is not yet ready.
    pub qr: Option<String>,
}

/// Pagination envelope for listings.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// All-time usage counts per kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AllTimeCounts {
    pub messages: i64,
    pub notifications: i64,
}

/// Coordinates storage, the connection manager, the dispatcher, and quota
/// for every caller-facing operation.
#[derive(Clone)]
pub struct GatewayService {
    storage: Arc<dyn Storage>,
    manager: ClientManager,
    dispatcher: Dispatcher,
    classifier: Arc<EnvironmentClassifier>,
    limiter: Arc<SendLimiter>,
    quota: QuotaConfig,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl GatewayService {
    pub fn new(
        storage: Arc<dyn Storage>,
        manager: ClientManager,
        dispatcher: Dispatcher,
        classifier: Arc<EnvironmentClassifier>,
        limiter: Arc<SendLimiter>,
        quota: QuotaConfig,
    ) -> Self {
        Self {
            storage,
            manager,
            dispatcher,
            classifier,
            limiter,
            quota,
        }
    }

    /// Register a session for a tenant and start pairing.
    ///
    /// Returns the QR string to display, or no QR when stored credentials
    /// made the session ready immediately.
    pub async fn create_session(
        &self,
        user_id: &str,
        phone: &str,
    ) -> Result<CreatedSession, KirimError> {
        validation::validate_session_phone(phone)?;

        let now = now_iso();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            phone: phone.to_string(),
            is_ready: false,
            is_deleted: false,
            is_disconnected: false,
            hourly_limit: self.quota.default_hourly_limit,
            daily_limit: self.quota.default_daily_limit,
            created_at: now.clone(),
            updated_at: now,
        };
        self.storage.create_session(&session).await?;
        info!(session_id = session.id.as_str(), user_id, "session created");

        match self.manager.init_client(&session.id).await? {
            InitOutcome::QrIssued(qr) => Ok(CreatedSession {
                session,
                qr: Some(qr),
            }),
            InitOutcome::Ready => {
                // Pick up the ready flag the manager just persisted.
                let session = self
                    .storage
                    .get_session(&session.id)
                    .await?
                    .unwrap_or(session);
                Ok(CreatedSession { session, qr: None })
            }
        }
    }

    /// Tear down a session the tenant owns.
    pub async fn remove_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<(), KirimError> {
        let session = self
            .storage
            .get_session(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| KirimError::NotFound {
                what: "session".to_string(),
            })?;
        self.manager.destroy_client(&session.id).await
    }

    /// Synchronous send: dispatch immediately and record the outcome.
    pub async fn send_now(&self, input: &SendInput) -> Result<OutboundItem, KirimError> {
        let (session, target_phone) = self.validate_and_find(input).await?;
        self.limiter.try_acquire(&session).await?;

        let environment = self.classifier.classify(&session.user_id).await?;
        let outcome = self
            .dispatcher
            .send(&DispatchRequest {
                session_id: session.id.clone(),
                target_phone: target_phone.clone(),
                body: input.body.clone(),
                country_code: input.country_code.clone(),
                media_url: input.media_url.clone(),
            })
            .await;
        let status = if outcome.is_some() {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Failed
        };

        let item = self.build_item(input, &session, target_phone, environment, status);
        self.storage.insert_outbound(&item).await?;
        Ok(item)
    }

    /// Deferred send: accept as `PENDING` for the scheduler.
    ///
    /// The environment tag recorded here is provisional; the scheduler
    /// re-classifies at send time.
    pub async fn enqueue(&self, input: &SendInput) -> Result<OutboundItem, KirimError> {
        let (session, target_phone) = self.validate_and_find(input).await?;
        let environment = self.classifier.classify(&session.user_id).await?;
        let item = self.build_item(
            input,
            &session,
            target_phone,
            environment,
            DeliveryStatus::Pending,
        );
        self.storage.insert_outbound(&item).await?;
        Ok(item)
    }

    /// Deferred bulk send. The whole batch is validated before anything is
    /// accepted, and batch traffic is always metered as production.
    pub async fn enqueue_batch(
        &self,
        inputs: &[SendInput],
    ) -> Result<Vec<OutboundItem>, KirimError> {
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            resolved.push(self.validate_and_find(input).await?);
        }

        let mut items = Vec::with_capacity(inputs.len());
        for (input, (session, target_phone)) in inputs.iter().zip(resolved) {
            let item = self.build_item(
                input,
                &session,
                target_phone,
                Environment::Production,
                DeliveryStatus::Pending,
            );
            self.storage.insert_outbound(&item).await?;
            items.push(item);
        }
        Ok(items)
    }

    /// The tenant's usable sessions.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, KirimError> {
        self.storage.list_sessions_for_user(user_id, true).await
    }

    /// Paginated listing of the tenant's outbound items, newest first.
    pub async fn list_outbound(
        &self,
        user_id: &str,
        filter: OutboundFilter,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<OutboundItem>, Page), KirimError> {
        let sessions = self.storage.list_sessions_for_user(user_id, false).await?;
        let session_ids: Vec<String> = sessions.into_iter().map(|s| s.id).collect();

        let page = page.max(1);
        let per_page = per_page.clamp(1, 500);
        let offset = (page - 1) * per_page;

        let items = self
            .storage
            .list_outbound(&session_ids, &filter, per_page, offset)
            .await?;
        let total = self.storage.count_outbound(&session_ids, &filter).await?;

        Ok((
            items,
            Page {
                page,
                per_page,
                total,
                total_pages: ((total as u64).div_ceil(per_page as u64) as i64).max(1),
            },
        ))
    }

    /// All-time message and notification counts for the tenant.
    pub async fn all_time_counts(&self, user_id: &str) -> Result<AllTimeCounts, KirimError> {
        let sessions = self.storage.list_sessions_for_user(user_id, false).await?;
        let session_ids: Vec<String> = sessions.into_iter().map(|s| s.id).collect();
        Ok(AllTimeCounts {
            messages: self
                .storage
                .count_all_time(&session_ids, OutboundKind::Message)
                .await?,
            notifications: self
                .storage
                .count_all_time(&session_ids, OutboundKind::Notification)
                .await?,
        })
    }

    /// Validate the input fields and resolve the target session, which must
    /// match the given phone, be ready, and not be deleted.
    async fn validate_and_find(
        &self,
        input: &SendInput,
    ) -> Result<(Session, String), KirimError> {
        validation::validate_session_phone(&input.session_phone)?;
        let target_phone = validation::normalize_target_phone(&input.target_phone)?;
        if let Some(code) = &input.country_code {
            validation::validate_country_code(code)?;
        }
        if input.body.trim().is_empty() {
            return Err(KirimError::validation("message", "can not be empty"));
        }

        let session = self
            .storage
            .get_session(&input.session_id)
            .await?
            .filter(|s| s.phone == input.session_phone && s.is_ready && !s.is_deleted)
            .ok_or_else(|| KirimError::NotFound {
                what: "whatsappPhoneId or whatsappPhoneNumber".to_string(),
            })?;
        Ok((session, target_phone))
    }

    fn build_item(
        &self,
        input: &SendInput,
        session: &Session,
        target_phone: String,
        environment: Environment,
        status: DeliveryStatus,
    ) -> OutboundItem {
        let now = now_iso();
        OutboundItem {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            kind: input.kind,
            target_phone,
            body: input.body.clone(),
            media_url: input.media_url.clone(),
            country_code: input
                .country_code
                .clone()
                .unwrap_or_else(|| "62".to_string()),
            environment,
            status,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
