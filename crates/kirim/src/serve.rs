// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kirim serve` command implementation.
//!
//! Wires the full gateway: SQLite storage, the bridge client factory, the
//! connection manager and dispatcher, quota components, the batch scheduler,
//! and the HTTP gateway. Supports graceful shutdown via signal handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use kirim_client::{BridgeFactory, ClientManager, Dispatcher};
use kirim_config::KirimConfig;
use kirim_core::{ClientFactory, KirimError, Storage};
use kirim_gateway::GatewayState;
use kirim_quota::{EnvironmentClassifier, SendLimiter};
use kirim_scheduler::SendScheduler;
use kirim_service::GatewayService;
use kirim_storage::SqliteStorage;

use crate::shutdown;

/// Runs the `kirim serve` command.
pub async fn run_serve(config: KirimConfig) -> Result<(), KirimError> {
    info!("starting kirim serve");

    // Storage first: everything else hangs off the durable session registry.
    let sqlite = Arc::new(SqliteStorage::new(config.storage.clone()));
    sqlite.initialize().await?;
    let storage: Arc<dyn Storage> = sqlite.clone();

    let factory: Arc<dyn ClientFactory> = Arc::new(BridgeFactory::new(&config.whatsapp));
    let manager = ClientManager::new(
        factory,
        storage.clone(),
        Duration::from_secs(config.whatsapp.pairing_timeout_secs),
    );
    let dispatcher = Dispatcher::new(
        manager.clone(),
        storage.clone(),
        config.whatsapp.default_country_code.clone(),
    );
    let classifier = Arc::new(EnvironmentClassifier::new(
        storage.clone(),
        config.quota.development_monthly_limit,
    ));
    let limiter = Arc::new(SendLimiter::new());

    let cancel = shutdown::install_signal_handler();

    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = SendScheduler::new(
            storage.clone(),
            dispatcher.clone(),
            classifier.clone(),
            limiter.clone(),
            config.scheduler.clone(),
        );
        let token = cancel.clone();
        Some(tokio::spawn(async move { scheduler.run(token).await }))
    } else {
        info!("scheduler disabled by configuration");
        None
    };

    let service = GatewayService::new(
        storage,
        manager,
        dispatcher,
        classifier,
        limiter,
        config.quota.clone(),
    );
    let state = GatewayState {
        service,
        start_time: Instant::now(),
    };

    let serve_result = tokio::select! {
        result = kirim_gateway::start_server(&config.gateway, state) => result,
        _ = cancel.cancelled() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    // Stop the scheduler (idempotent if the signal already fired), then
    // checkpoint storage before exit.
    cancel.cancel();
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "scheduler task join failed");
        }
    }
    if let Err(e) = sqlite.close().await {
        warn!(error = %e, "storage checkpoint failed");
    }

    info!("kirim stopped");
    serve_result
}
