// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch scheduler for deferred outbound items.
//!
//! Each tick drains part of the `PENDING` backlog: items are grouped by
//! owning session, bounded per session by a jittered cap and the session's
//! send limiter, dispatched oldest-first, re-classified, and written back as
//! delivered or failed. One item's failure never aborts the batch, and a
//! failing tick never kills the timer.
//!
//! A companion sweep moves pending items of disconnected sessions to the
//! terminal `DISCONNECTED` state so dead sessions cannot accumulate an
//! undeliverable backlog.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kirim_client::{DispatchRequest, Dispatcher};
use kirim_config::model::SchedulerConfig;
use kirim_core::{DeliveryStatus, KirimError, OutboundItem, Storage};
use kirim_quota::{EnvironmentClassifier, SendLimiter};

/// Aggregate result of one send tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Items in `PENDING` when the tick started.
    pub pending: usize,
    /// Items actually attempted this tick.
    pub selected: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Periodic drain of the pending backlog.
#[derive(Clone)]
pub struct SendScheduler {
    storage: Arc<dyn Storage>,
    dispatcher: Dispatcher,
    classifier: Arc<EnvironmentClassifier>,
    limiter: Arc<SendLimiter>,
    config: SchedulerConfig,
    /// Tick gate: a tick still running when the next fires makes the next a no-op.
    tick_gate: Arc<Mutex<()>>,
}

impl SendScheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        dispatcher: Dispatcher,
        classifier: Arc<EnvironmentClassifier>,
        limiter: Arc<SendLimiter>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            dispatcher,
            classifier,
            limiter,
            config,
            tick_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Run ticks on the configured interval until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.tick_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            interval_secs = self.config.tick_interval_secs,
            "scheduler running"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let Ok(_guard) = self.tick_gate.try_lock() else {
                        warn!("previous tick still running, skipping this one");
                        continue;
                    };
                    if let Err(e) = self.run_disconnect_sweep().await {
                        warn!(error = %e, "disconnect sweep failed");
                    }
                    if let Err(e) = self.run_send_tick().await {
                        warn!(error = %e, "send tick failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("scheduler stopping");
                    break;
                }
            }
        }
    }

    /// Drain one bounded slice of the pending backlog.
    pub async fn run_send_tick(&self) -> Result<TickSummary, KirimError> {
        let pending = self.storage.list_pending().await?;
        if pending.is_empty() {
            debug!("no pending items");
            return Ok(TickSummary::default());
        }

        let mut by_session: BTreeMap<String, Vec<OutboundItem>> = BTreeMap::new();
        for item in &pending {
            by_session
                .entry(item.session_id.clone())
                .or_default()
                .push(item.clone());
        }

        // Jittered per-session cap: bounds work per tick and staggers a
        // large backlog across ticks instead of replaying it all at once.
        let cap = {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.config.tick_cap_min..=self.config.tick_cap_max) as usize
        };
        info!(
            pending = pending.len(),
            sessions = by_session.len(),
            cap,
            "send tick starting"
        );

        let batches = by_session
            .into_iter()
            .map(|(session_id, items)| self.process_session_batch(session_id, items, cap));
        let results = futures::future::join_all(batches).await;

        let mut summary = TickSummary {
            pending: pending.len(),
            ..TickSummary::default()
        };
        for (selected, delivered, failed) in results {
            summary.selected += selected;
            summary.delivered += delivered;
            summary.failed += failed;
        }

        info!(
            selected = summary.selected,
            delivered = summary.delivered,
            failed = summary.failed,
            "send tick complete"
        );
        Ok(summary)
    }

    /// Process one session's slice of the backlog, oldest first.
    ///
    /// Never returns an error: per-item failures are recorded on the item
    /// and per-session failures are logged, so sibling batches proceed.
    async fn process_session_batch(
        &self,
        session_id: String,
        items: Vec<OutboundItem>,
        cap: usize,
    ) -> (usize, usize, usize) {
        let session = match self.storage.get_session(&session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!(session_id = session_id.as_str(), "pending items for unknown session, skipping");
                return (0, 0, 0);
            }
            Err(e) => {
                warn!(session_id = session_id.as_str(), error = %e, "session lookup failed, skipping batch");
                return (0, 0, 0);
            }
        };
        if !session.is_usable() {
            // Disconnected backlogs belong to the sweep; unready ones wait
            // for pairing to finish.
            debug!(session_id = session_id.as_str(), "session not usable, leaving batch pending");
            return (0, 0, 0);
        }

        let budget = usize::try_from(self.limiter.remaining(&session).await)
            .unwrap_or(usize::MAX)
            .min(cap);

        let mut selected = 0;
        let mut delivered = 0;
        let mut failed = 0;
        for item in items.into_iter().take(budget) {
            if self.limiter.try_acquire(&session).await.is_err() {
                debug!(session_id = session_id.as_str(), "send limit reached mid-batch, rest stays pending");
                break;
            }
            selected += 1;

            let request = DispatchRequest {
                session_id: item.session_id.clone(),
                target_phone: item.target_phone.clone(),
                body: item.body.clone(),
                country_code: Some(item.country_code.clone()),
                media_url: item.media_url.clone(),
            };
            let outcome = self.dispatcher.send(&request).await;
            let status = if outcome.is_some() {
                DeliveryStatus::Delivered
            } else {
                DeliveryStatus::Failed
            };

            // Environment is re-computed at send time; the running total
            // changes with every send. Fall back to the stored tag if the
            // classifier cannot answer.
            let environment = match self.classifier.classify(&session.user_id).await {
                Ok(environment) => environment,
                Err(e) => {
                    warn!(session_id = session_id.as_str(), error = %e, "classification failed, keeping stored tag");
                    item.environment
                }
            };

            match self.storage.record_outcome(&item.id, status, environment).await {
                Ok(true) => {
                    if status == DeliveryStatus::Delivered {
                        delivered += 1;
                    } else {
                        failed += 1;
                    }
                }
                Ok(false) => {
                    warn!(item_id = item.id.as_str(), "item already terminal, outcome dropped");
                }
                Err(e) => {
                    warn!(item_id = item.id.as_str(), error = %e, "outcome write failed");
                }
            }
        }
        (selected, delivered, failed)
    }

    /// Move pending items of disconnected sessions to `DISCONNECTED`.
    pub async fn run_disconnect_sweep(&self) -> Result<u64, KirimError> {
        let sessions = self.storage.list_disconnected_sessions().await?;
        if sessions.is_empty() {
            return Ok(0);
        }
        let session_ids: Vec<String> = sessions.into_iter().map(|s| s.id).collect();
        let swept = self.storage.mark_disconnected(&session_ids).await?;
        if swept > 0 {
            info!(
                swept,
                sessions = session_ids.len(),
                "swept pending items of disconnected sessions"
            );
        }
        Ok(swept)
    }
}
