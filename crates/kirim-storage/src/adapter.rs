// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `Storage` trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use kirim_config::model::StorageConfig;
use kirim_core::types::{
    DeliveryStatus, Environment, OutboundFilter, OutboundItem, OutboundKind, Session,
    SessionPatch,
};
use kirim_core::{KirimError, Storage};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    ///
    /// [`initialize`]: SqliteStorage::initialize
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database at the configured path and run migrations.
    pub async fn initialize(&self) -> Result<(), KirimError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| KirimError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Checkpoint the WAL ahead of shutdown.
    pub async fn close(&self) -> Result<(), KirimError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, KirimError> {
        self.db.get().ok_or_else(|| KirimError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_session(&self, session: &Session) -> Result<(), KirimError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, KirimError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn list_sessions_for_user(
        &self,
        user_id: &str,
        usable_only: bool,
    ) -> Result<Vec<Session>, KirimError> {
        queries::sessions::list_for_user(self.db()?, user_id, usable_only).await
    }

    async fn list_disconnected_sessions(&self) -> Result<Vec<Session>, KirimError> {
        queries::sessions::list_disconnected(self.db()?).await
    }

    async fn update_session_flags(
        &self,
        id: &str,
        patch: &SessionPatch,
    ) -> Result<(), KirimError> {
        queries::sessions::update_flags(self.db()?, id, patch).await
    }

    async fn insert_outbound(&self, item: &OutboundItem) -> Result<(), KirimError> {
        queries::outbound::insert_item(self.db()?, item).await
    }

    async fn get_outbound(&self, id: &str) -> Result<Option<OutboundItem>, KirimError> {
        queries::outbound::get_item(self.db()?, id).await
    }

    async fn list_pending(&self) -> Result<Vec<OutboundItem>, KirimError> {
        queries::outbound::list_pending(self.db()?).await
    }

    async fn record_outcome(
        &self,
        id: &str,
        status: DeliveryStatus,
        environment: Environment,
    ) -> Result<bool, KirimError> {
        queries::outbound::record_outcome(self.db()?, id, status, environment).await
    }

    async fn mark_disconnected(&self, session_ids: &[String]) -> Result<u64, KirimError> {
        queries::outbound::mark_disconnected(self.db()?, session_ids).await
    }

    async fn list_outbound(
        &self,
        session_ids: &[String],
        filter: &OutboundFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OutboundItem>, KirimError> {
        queries::outbound::list_items(self.db()?, session_ids, filter, limit, offset).await
    }

    async fn count_outbound(
        &self,
        session_ids: &[String],
        filter: &OutboundFilter,
    ) -> Result<i64, KirimError> {
        queries::outbound::count_items(self.db()?, session_ids, filter).await
    }

    async fn count_in_range(
        &self,
        session_ids: &[String],
        from: &str,
        to: &str,
    ) -> Result<i64, KirimError> {
        queries::outbound::count_in_range(self.db()?, session_ids, from, to).await
    }

    async fn count_all_time(
        &self,
        session_ids: &[String],
        kind: OutboundKind,
    ) -> Result<i64, KirimError> {
        queries::outbound::count_all_time(self.db()?, session_ids, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.get_session("s1").await.is_err());
    }

    #[tokio::test]
    async fn full_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let session = Session {
            id: "sess-1".to_string(),
            user_id: "user-1".to_string(),
            phone: "81234567".to_string(),
            is_ready: false,
            is_deleted: false,
            is_disconnected: false,
            hourly_limit: 100,
            daily_limit: 1000,
            created_at: "2026-02-01T00:00:00.000Z".to_string(),
            updated_at: "2026-02-01T00:00:00.000Z".to_string(),
        };
        storage.create_session(&session).await.unwrap();
        storage
            .update_session_flags("sess-1", &SessionPatch::ready())
            .await
            .unwrap();

        let item = OutboundItem {
            id: "m1".to_string(),
            session_id: "sess-1".to_string(),
            kind: OutboundKind::Message,
            target_phone: "81198765".to_string(),
            body: "hello".to_string(),
            media_url: None,
            country_code: "62".to_string(),
            environment: Environment::Development,
            status: DeliveryStatus::Pending,
            created_at: "2026-02-01T08:00:00.000Z".to_string(),
            updated_at: "2026-02-01T08:00:00.000Z".to_string(),
        };
        storage.insert_outbound(&item).await.unwrap();

        let pending = storage.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);

        let changed = storage
            .record_outcome("m1", DeliveryStatus::Delivered, Environment::Development)
            .await
            .unwrap();
        assert!(changed);
        assert!(storage.list_pending().await.unwrap().is_empty());

        let usable = storage.list_sessions_for_user("user-1", true).await.unwrap();
        assert_eq!(usable.len(), 1);

        storage.close().await.unwrap();
    }
}
