// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Development/production environment classification.
//!
//! A tenant's sends are free ("development") until their calendar-month
//! volume crosses the configured limit, after which every further item is
//! tagged "production" for billing. Classification is computed fresh at
//! send time -- the running total changes with every send, so caching would
//! tag items against a stale count.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

use kirim_core::{Environment, KirimError, Storage};

/// Calendar-month window `[start, next_month_start)` around `now`, as
/// ISO-8601 bounds matching the storage timestamp format.
pub fn month_window(now: DateTime<Utc>) -> (String, String) {
    let (year, month) = (now.year(), now.month());
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    (
        format!("{year:04}-{month:02}-01T00:00:00.000Z"),
        format!("{next_year:04}-{next_month:02}-01T00:00:00.000Z"),
    )
}

/// Decides the environment tag for a tenant's outbound items.
pub struct EnvironmentClassifier {
    storage: Arc<dyn Storage>,
    development_monthly_limit: i64,
}

impl EnvironmentClassifier {
    pub fn new(storage: Arc<dyn Storage>, development_monthly_limit: i64) -> Self {
        Self {
            storage,
            development_monthly_limit,
        }
    }

    /// Classify a tenant by this month's item count across its usable
    /// (ready, non-deleted) sessions: quota only counts against capacity
    /// that can currently carry traffic.
    pub async fn classify(&self, user_id: &str) -> Result<Environment, KirimError> {
        let sessions = self.storage.list_sessions_for_user(user_id, true).await?;
        let session_ids: Vec<String> = sessions.into_iter().map(|s| s.id).collect();

        let (from, to) = month_window(Utc::now());
        let count = self.storage.count_in_range(&session_ids, &from, &to).await?;

        let environment = if count > self.development_monthly_limit {
            Environment::Production
        } else {
            Environment::Development
        };
        debug!(
            user_id,
            count,
            limit = self.development_monthly_limit,
            environment = %environment,
            "tenant classified"
        );
        Ok(environment)
    }

    /// Classify the tenant owning `session_id`.
    pub async fn classify_for_session(
        &self,
        session_id: &str,
    ) -> Result<Environment, KirimError> {
        let session = self
            .storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| KirimError::NotFound {
                what: "session".to_string(),
            })?;
        self.classify(&session.user_id).await
    }
}
