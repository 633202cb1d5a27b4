// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound item CRUD operations.
//!
//! Status writes go through [`record_outcome`], which refuses to touch rows
//! outside `PENDING`: delivered/failed/disconnected are terminal and the
//! guard makes that monotonic at the storage layer, whatever the callers do.

use std::str::FromStr;

use kirim_core::KirimError;
use rusqlite::{params, params_from_iter, Row};

use crate::database::Database;
use crate::models::{DeliveryStatus, Environment, OutboundFilter, OutboundItem, OutboundKind};

const OUTBOUND_COLUMNS: &str = "id, session_id, kind, target_phone, body, media_url,
     country_code, environment, status, created_at, updated_at";

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<OutboundItem> {
    let kind: String = row.get(2)?;
    let environment: String = row.get(7)?;
    let status: String = row.get(8)?;
    Ok(OutboundItem {
        id: row.get(0)?,
        session_id: row.get(1)?,
        kind: OutboundKind::from_str(&kind).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        target_phone: row.get(3)?,
        body: row.get(4)?,
        media_url: row.get(5)?,
        country_code: row.get(6)?,
        environment: Environment::from_str(&environment).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
        status: DeliveryStatus::from_str(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// `?n` placeholder list for an IN clause, starting at `start`.
fn placeholders(start: usize, len: usize) -> String {
    (start..start + len)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Insert a new outbound item.
pub async fn insert_item(db: &Database, item: &OutboundItem) -> Result<(), KirimError> {
    let item = item.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO outbound (id, session_id, kind, target_phone, body, media_url,
                     country_code, environment, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    item.id,
                    item.session_id,
                    item.kind.to_string(),
                    item.target_phone,
                    item.body,
                    item.media_url,
                    item.country_code,
                    item.environment.to_string(),
                    item.status.to_string(),
                    item.created_at,
                    item.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an outbound item by ID.
pub async fn get_item(db: &Database, id: &str) -> Result<Option<OutboundItem>, KirimError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OUTBOUND_COLUMNS} FROM outbound WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], row_to_item) {
                Ok(item) => Ok(Some(item)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All `PENDING` items across sessions, oldest first.
pub async fn list_pending(db: &Database) -> Result<Vec<OutboundItem>, KirimError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OUTBOUND_COLUMNS} FROM outbound
                 WHERE status = 'PENDING' ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], row_to_item)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a send outcome on a pending item.
///
/// Returns `false` without writing when the item is already terminal.
pub async fn record_outcome(
    db: &Database,
    id: &str,
    status: DeliveryStatus,
    environment: Environment,
) -> Result<bool, KirimError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE outbound SET status = ?1, environment = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3 AND status = 'PENDING'",
                params![status.to_string(), environment.to_string(), id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flip every `PENDING` item of the given sessions to `DISCONNECTED`.
/// Returns the number of items swept.
pub async fn mark_disconnected(
    db: &Database,
    session_ids: &[String],
) -> Result<u64, KirimError> {
    if session_ids.is_empty() {
        return Ok(0);
    }
    let session_ids = session_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "UPDATE outbound SET status = 'DISCONNECTED',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'PENDING' AND session_id IN ({})",
                placeholders(1, session_ids.len())
            );
            let changed = conn.execute(&sql, params_from_iter(session_ids.iter()))?;
            Ok(changed as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Paginated listing of a set of sessions' items, newest first.
pub async fn list_items(
    db: &Database,
    session_ids: &[String],
    filter: &OutboundFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<OutboundItem>, KirimError> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }
    let session_ids = session_ids.to_vec();
    let filter = *filter;
    db.connection()
        .call(move |conn| {
            let (clause, mut args) = filter_clause(&session_ids, &filter);
            let sql = format!(
                "SELECT {OUTBOUND_COLUMNS} FROM outbound WHERE {clause}
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?{} OFFSET ?{}",
                args.len() + 1,
                args.len() + 2,
            );
            args.push(rusqlite::types::Value::from(limit));
            args.push(rusqlite::types::Value::from(offset));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), row_to_item)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count of a set of sessions' items matching the filter.
pub async fn count_items(
    db: &Database,
    session_ids: &[String],
    filter: &OutboundFilter,
) -> Result<i64, KirimError> {
    if session_ids.is_empty() {
        return Ok(0);
    }
    let session_ids = session_ids.to_vec();
    let filter = *filter;
    db.connection()
        .call(move |conn| {
            let (clause, args) = filter_clause(&session_ids, &filter);
            let sql = format!("SELECT COUNT(*) FROM outbound WHERE {clause}");
            let count: i64 =
                conn.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count of items created in `[from, to)` for the given sessions.
pub async fn count_in_range(
    db: &Database,
    session_ids: &[String],
    from: &str,
    to: &str,
) -> Result<i64, KirimError> {
    if session_ids.is_empty() {
        return Ok(0);
    }
    let session_ids = session_ids.to_vec();
    let from = from.to_string();
    let to = to.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM outbound
                 WHERE created_at >= ?1 AND created_at < ?2
                   AND session_id IN ({})",
                placeholders(3, session_ids.len())
            );
            let mut args = vec![from, to];
            args.extend(session_ids);
            let count: i64 =
                conn.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All-time item count of one kind for the given sessions.
pub async fn count_all_time(
    db: &Database,
    session_ids: &[String],
    kind: OutboundKind,
) -> Result<i64, KirimError> {
    if session_ids.is_empty() {
        return Ok(0);
    }
    let session_ids = session_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM outbound WHERE kind = ?1 AND session_id IN ({})",
                placeholders(2, session_ids.len())
            );
            let mut args = vec![kind.to_string()];
            args.extend(session_ids);
            let count: i64 =
                conn.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Build `session_id IN (...) [AND kind = ..][AND status = ..][AND environment = ..]`
/// plus its positional argument list.
fn filter_clause(
    session_ids: &[String],
    filter: &OutboundFilter,
) -> (String, Vec<rusqlite::types::Value>) {
    let mut args: Vec<rusqlite::types::Value> = session_ids
        .iter()
        .map(|id| rusqlite::types::Value::from(id.clone()))
        .collect();
    let mut clause = format!("session_id IN ({})", placeholders(1, session_ids.len()));
    if let Some(kind) = filter.kind {
        args.push(rusqlite::types::Value::from(kind.to_string()));
        clause.push_str(&format!(" AND kind = ?{}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(rusqlite::types::Value::from(status.to_string()));
        clause.push_str(&format!(" AND status = ?{}", args.len()));
    }
    if let Some(environment) = filter.environment {
        args.push(rusqlite::types::Value::from(environment.to_string()));
        clause.push_str(&format!(" AND environment = ?{}", args.len()));
    }
    (clause, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::sessions::create_session;

    async fn setup_db_with_sessions(ids: &[&str]) -> Database {
        let db = Database::open_in_memory().await.unwrap();
        for id in ids {
            let mut session = crate::queries::sessions::tests::make_session(id, "u1");
            session.is_ready = true;
            create_session(&db, &session).await.unwrap();
        }
        db
    }

    fn make_item(id: &str, session_id: &str, created_at: &str) -> OutboundItem {
        OutboundItem {
            id: id.to_string(),
            session_id: session_id.to_string(),
            kind: OutboundKind::Message,
            target_phone: "81198765".to_string(),
            body: "hello".to_string(),
            media_url: None,
            country_code: "62".to_string(),
            environment: Environment::Development,
            status: DeliveryStatus::Pending,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrips() {
        let db = setup_db_with_sessions(&["s1"]).await;
        let mut item = make_item("m1", "s1", "2026-02-01T08:00:00.000Z");
        item.media_url = Some("https://example.com/cat.png".to_string());

        insert_item(&db, &item).await.unwrap();
        let got = get_item(&db, "m1").await.unwrap().unwrap();
        assert_eq!(got, item);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_pending_is_oldest_first() {
        let db = setup_db_with_sessions(&["s1", "s2"]).await;
        insert_item(&db, &make_item("m2", "s1", "2026-02-01T08:00:02.000Z"))
            .await
            .unwrap();
        insert_item(&db, &make_item("m1", "s2", "2026-02-01T08:00:01.000Z"))
            .await
            .unwrap();
        let mut delivered = make_item("m3", "s1", "2026-02-01T08:00:00.000Z");
        delivered.status = DeliveryStatus::Delivered;
        insert_item(&db, &delivered).await.unwrap();

        let pending = list_pending(&db).await.unwrap();
        assert_eq!(
            pending.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["m1", "m2"]
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn record_outcome_updates_pending_item() {
        let db = setup_db_with_sessions(&["s1"]).await;
        insert_item(&db, &make_item("m1", "s1", "2026-02-01T08:00:00.000Z"))
            .await
            .unwrap();

        let changed = record_outcome(&db, "m1", DeliveryStatus::Delivered, Environment::Production)
            .await
            .unwrap();
        assert!(changed);

        let got = get_item(&db, "m1").await.unwrap().unwrap();
        assert_eq!(got.status, DeliveryStatus::Delivered);
        assert_eq!(got.environment, Environment::Production);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn terminal_status_is_monotonic() {
        let db = setup_db_with_sessions(&["s1"]).await;
        insert_item(&db, &make_item("m1", "s1", "2026-02-01T08:00:00.000Z"))
            .await
            .unwrap();

        record_outcome(&db, "m1", DeliveryStatus::Failed, Environment::Development)
            .await
            .unwrap();

        // A later tick must not resurrect or flip the item.
        let changed = record_outcome(&db, "m1", DeliveryStatus::Delivered, Environment::Production)
            .await
            .unwrap();
        assert!(!changed);

        let got = get_item(&db, "m1").await.unwrap().unwrap();
        assert_eq!(got.status, DeliveryStatus::Failed);
        assert_eq!(got.environment, Environment::Development);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_disconnected_sweeps_only_pending_of_named_sessions() {
        let db = setup_db_with_sessions(&["s-down", "s-up"]).await;
        insert_item(&db, &make_item("m1", "s-down", "2026-02-01T08:00:00.000Z"))
            .await
            .unwrap();
        insert_item(&db, &make_item("m2", "s-down", "2026-02-01T08:00:01.000Z"))
            .await
            .unwrap();
        insert_item(&db, &make_item("m3", "s-up", "2026-02-01T08:00:02.000Z"))
            .await
            .unwrap();
        let mut delivered = make_item("m4", "s-down", "2026-02-01T08:00:03.000Z");
        delivered.status = DeliveryStatus::Delivered;
        insert_item(&db, &delivered).await.unwrap();

        let swept = mark_disconnected(&db, &["s-down".to_string()]).await.unwrap();
        assert_eq!(swept, 2);

        assert_eq!(
            get_item(&db, "m1").await.unwrap().unwrap().status,
            DeliveryStatus::Disconnected
        );
        assert_eq!(
            get_item(&db, "m3").await.unwrap().unwrap().status,
            DeliveryStatus::Pending
        );
        assert_eq!(
            get_item(&db, "m4").await.unwrap().unwrap().status,
            DeliveryStatus::Delivered
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_disconnected_with_no_sessions_is_noop() {
        let db = setup_db_with_sessions(&[]).await;
        assert_eq!(mark_disconnected(&db, &[]).await.unwrap(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn count_in_range_is_half_open() {
        let db = setup_db_with_sessions(&["s1"]).await;
        insert_item(&db, &make_item("jan", "s1", "2026-01-31T23:59:59.999Z"))
            .await
            .unwrap();
        insert_item(&db, &make_item("feb1", "s1", "2026-02-01T00:00:00.000Z"))
            .await
            .unwrap();
        insert_item(&db, &make_item("feb2", "s1", "2026-02-15T12:00:00.000Z"))
            .await
            .unwrap();
        insert_item(&db, &make_item("mar", "s1", "2026-03-01T00:00:00.000Z"))
            .await
            .unwrap();

        let count = count_in_range(
            &db,
            &["s1".to_string()],
            "2026-02-01T00:00:00.000Z",
            "2026-03-01T00:00:00.000Z",
        )
        .await
        .unwrap();
        assert_eq!(count, 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let db = setup_db_with_sessions(&["s1"]).await;
        for i in 0..5 {
            let mut item = make_item(
                &format!("m{i}"),
                "s1",
                &format!("2026-02-01T08:00:0{i}.000Z"),
            );
            if i % 2 == 0 {
                item.kind = OutboundKind::Notification;
            }
            insert_item(&db, &item).await.unwrap();
        }

        let filter = OutboundFilter {
            kind: Some(OutboundKind::Notification),
            ..OutboundFilter::default()
        };
        let ids = ["s1".to_string()];

        assert_eq!(count_items(&db, &ids, &filter).await.unwrap(), 3);

        let page = list_items(&db, &ids, &filter, 2, 0).await.unwrap();
        assert_eq!(
            page.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["m4", "m2"]
        );

        let rest = list_items(&db, &ids, &filter, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "m0");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn count_all_time_separates_kinds() {
        let db = setup_db_with_sessions(&["s1"]).await;
        insert_item(&db, &make_item("m1", "s1", "2026-02-01T08:00:00.000Z"))
            .await
            .unwrap();
        let mut notif = make_item("n1", "s1", "2026-02-01T08:00:01.000Z");
        notif.kind = OutboundKind::Notification;
        insert_item(&db, &notif).await.unwrap();

        let ids = ["s1".to_string()];
        assert_eq!(
            count_all_time(&db, &ids, OutboundKind::Message).await.unwrap(),
            1
        );
        assert_eq!(
            count_all_time(&db, &ids, OutboundKind::Notification)
                .await
                .unwrap(),
            1
        );

        db.close().await.unwrap();
    }
}
