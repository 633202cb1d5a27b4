// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry CRUD operations.

use kirim_core::KirimError;
use rusqlite::{params, Row};

use crate::database::Database;
use crate::models::{Session, SessionPatch};

const SESSION_COLUMNS: &str = "id, user_id, phone, is_ready, is_deleted, is_disconnected,
     hourly_limit, daily_limit, created_at, updated_at";

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        phone: row.get(2)?,
        is_ready: row.get(3)?,
        is_deleted: row.get(4)?,
        is_disconnected: row.get(5)?,
        hourly_limit: row.get(6)?,
        daily_limit: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Create a new session row.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), KirimError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, phone, is_ready, is_deleted,
                     is_disconnected, hourly_limit, daily_limit, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    session.id,
                    session.user_id,
                    session.phone,
                    session.is_ready,
                    session.is_deleted,
                    session.is_disconnected,
                    session.hourly_limit,
                    session.daily_limit,
                    session.created_at,
                    session.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session by ID.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, KirimError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List a tenant's sessions, oldest first.
///
/// With `usable_only`, restricts to ready, non-deleted sessions -- the set
/// monthly quota is counted against.
pub async fn list_for_user(
    db: &Database,
    user_id: &str,
    usable_only: bool,
) -> Result<Vec<Session>, KirimError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = if usable_only {
                format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE user_id = ?1 AND is_ready = 1 AND is_deleted = 0
                     ORDER BY created_at ASC"
                )
            } else {
                format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE user_id = ?1 ORDER BY created_at ASC"
                )
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List every session currently flagged disconnected.
pub async fn list_disconnected(db: &Database) -> Result<Vec<Session>, KirimError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE is_disconnected = 1"
            ))?;
            let rows = stmt.query_map([], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply a lifecycle flag patch and touch `updated_at`.
///
/// `None` fields are left untouched via COALESCE.
pub async fn update_flags(
    db: &Database,
    id: &str,
    patch: &SessionPatch,
) -> Result<(), KirimError> {
    let id = id.to_string();
    let patch = *patch;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET
                     is_ready = COALESCE(?1, is_ready),
                     is_deleted = COALESCE(?2, is_deleted),
                     is_disconnected = COALESCE(?3, is_disconnected),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4",
                params![patch.is_ready, patch.is_deleted, patch.is_disconnected, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
