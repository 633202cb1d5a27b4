// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: `Database` wraps one `tokio_rusqlite::Connection`, query modules
//! accept `&Database` and go through `connection().call()`, and SQLITE_BUSY
//! never surfaces under concurrent access. Do NOT create additional
//! Connection instances for writes.

use kirim_core::KirimError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Handle to the single-writer SQLite database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, KirimError> {
        let conn = Connection::open(path.to_string()).await.map_err(map_sqlite_err)?;
        Self::prepare(conn, wal_mode).await
    }

    /// Open an in-memory database (tests).
    pub async fn open_in_memory() -> Result<Self, KirimError> {
        let conn = Connection::open_in_memory().await.map_err(map_sqlite_err)?;
        Self::prepare(conn, false).await
    }

    async fn prepare(conn: Connection, wal_mode: bool) -> Result<Self, KirimError> {
        conn.call(move |conn| -> Result<(), KirimError> {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")
                    .map_err(map_sqlite_err)?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(map_sqlite_err)?;
            conn.pragma_update(None, "foreign_keys", "ON")
                .map_err(map_sqlite_err)?;
            conn.pragma_update(None, "busy_timeout", 5000)
                .map_err(map_sqlite_err)?;
            crate::migrations::run_migrations(conn)?;
            Ok(())
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(inner) => inner,
            other => KirimError::Storage {
                source: Box::new(other),
            },
        })?;

        debug!(wal_mode, "database opened and migrated");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the background connection thread.
    pub async fn close(self) -> Result<(), KirimError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| KirimError::Storage {
                source: Box::new(e),
            })
    }
}

/// Map a tokio-rusqlite error into the workspace error type.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> KirimError {
    KirimError::Storage {
        source: Box::new(e),
    }
}

/// Map a rusqlite error into the workspace error type.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> KirimError {
    KirimError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("open.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        assert!(db_path.exists());

        // Both tables exist after migration.
        let count: i64 = db
            .connection()
            .call(|conn| -> rusqlite::Result<i64> {
                let n = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type = 'table' AND name IN ('sessions', 'outbound')",
                    [],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");

        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        db.close().await.unwrap();

        // Second open must not re-run V1 against existing tables.
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_open_works() {
        let db = Database::open_in_memory().await.unwrap();
        db.close().await.unwrap();
    }
}
