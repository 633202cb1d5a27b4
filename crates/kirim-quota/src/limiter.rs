// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session send limiter with hourly and daily windows.
//!
//! Each session row carries `hourly_limit` and `daily_limit` ceilings. The
//! limiter keeps in-memory counters per session that reset on hour/day
//! rollover, warns at 80% of either ceiling, and rejects with
//! `KirimError::QuotaExceeded` once a ceiling is reached. A limit of zero or
//! below disables that window.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use kirim_core::{KirimError, Session};

#[derive(Debug, Default)]
struct SessionWindow {
    /// (year, day-of-year, hour) the hour counter belongs to.
    hour_key: (i32, u32, u32),
    hour_count: i64,
    /// (year, day-of-year) the day counter belongs to.
    day_key: (i32, u32),
    day_count: i64,
}

impl SessionWindow {
    fn roll(&mut self, now: DateTime<Utc>) {
        let hour_key = (now.year(), now.ordinal(), now.hour());
        if hour_key != self.hour_key {
            self.hour_key = hour_key;
            self.hour_count = 0;
        }
        let day_key = (now.year(), now.ordinal());
        if day_key != self.day_key {
            self.day_key = day_key;
            self.day_count = 0;
        }
    }
}

/// In-memory per-session send pacing.
#[derive(Default)]
pub struct SendLimiter {
    windows: Mutex<HashMap<String, SessionWindow>>,
}

impl SendLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve one send slot for the session, or fail with `QuotaExceeded`.
    pub async fn try_acquire(&self, session: &Session) -> Result<(), KirimError> {
        self.try_acquire_at(session, Utc::now()).await
    }

    /// Sends the session may still make right now (minimum of both windows).
    pub async fn remaining(&self, session: &Session) -> i64 {
        self.remaining_at(session, Utc::now()).await
    }

    async fn try_acquire_at(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<(), KirimError> {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(session.id.clone()).or_default();
        window.roll(now);

        if session.hourly_limit > 0 && window.hour_count >= session.hourly_limit {
            return Err(KirimError::QuotaExceeded {
                message: format!(
                    "session {} reached its hourly limit of {}",
                    session.id, session.hourly_limit
                ),
            });
        }
        if session.daily_limit > 0 && window.day_count >= session.daily_limit {
            return Err(KirimError::QuotaExceeded {
                message: format!(
                    "session {} reached its daily limit of {}",
                    session.id, session.daily_limit
                ),
            });
        }

        window.hour_count += 1;
        window.day_count += 1;

        if session.hourly_limit > 0 && window.hour_count * 5 >= session.hourly_limit * 4 {
            warn!(
                session_id = session.id.as_str(),
                hour_count = window.hour_count,
                hourly_limit = session.hourly_limit,
                "approaching hourly send limit (80%+)"
            );
        }
        if session.daily_limit > 0 && window.day_count * 5 >= session.daily_limit * 4 {
            warn!(
                session_id = session.id.as_str(),
                day_count = window.day_count,
                daily_limit = session.daily_limit,
                "approaching daily send limit (80%+)"
            );
        }
        Ok(())
    }

    async fn remaining_at(&self, session: &Session, now: DateTime<Utc>) -> i64 {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(session.id.clone()).or_default();
        window.roll(now);

        let hour_left = if session.hourly_limit > 0 {
            (session.hourly_limit - window.hour_count).max(0)
        } else {
            i64::MAX
        };
        let day_left = if session.daily_limit > 0 {
            (session.daily_limit - window.day_count).max(0)
        } else {
            i64::MAX
        };
        hour_left.min(day_left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session_with_limits(hourly: i64, daily: i64) -> Session {
        Session {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            phone: "81234567".to_string(),
            is_ready: true,
            is_deleted: false,
            is_disconnected: false,
            hourly_limit: hourly,
            daily_limit: daily,
            created_at: "2026-02-01T00:00:00.000Z".to_string(),
            updated_at: "2026-02-01T00:00:00.000Z".to_string(),
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn hourly_ceiling_rejects_then_resets_next_hour() {
        let limiter = SendLimiter::new();
        let session = session_with_limits(2, 100);

        limiter.try_acquire_at(&session, at(9, 0)).await.unwrap();
        limiter.try_acquire_at(&session, at(9, 10)).await.unwrap();
        let err = limiter.try_acquire_at(&session, at(9, 20)).await.unwrap_err();
        assert!(err.to_string().contains("hourly"));

        // Next hour, the window rolls.
        limiter.try_acquire_at(&session, at(10, 0)).await.unwrap();
    }

    #[tokio::test]
    async fn daily_ceiling_survives_hour_rollover() {
        let limiter = SendLimiter::new();
        let session = session_with_limits(10, 3);

        limiter.try_acquire_at(&session, at(9, 0)).await.unwrap();
        limiter.try_acquire_at(&session, at(10, 0)).await.unwrap();
        limiter.try_acquire_at(&session, at(11, 0)).await.unwrap();

        let err = limiter.try_acquire_at(&session, at(12, 0)).await.unwrap_err();
        assert!(err.to_string().contains("daily"));

        // A new day clears the counter.
        let next_day = Utc.with_ymd_and_hms(2026, 2, 15, 0, 5, 0).unwrap();
        limiter.try_acquire_at(&session, next_day).await.unwrap();
    }

    #[tokio::test]
    async fn remaining_is_the_tighter_window() {
        let limiter = SendLimiter::new();
        let session = session_with_limits(5, 8);

        for _ in 0..3 {
            limiter.try_acquire_at(&session, at(9, 0)).await.unwrap();
        }
        assert_eq!(limiter.remaining_at(&session, at(9, 30)).await, 2);

        // After the hour rolls, the daily window is the binding one.
        assert_eq!(limiter.remaining_at(&session, at(10, 0)).await, 5);
    }

    #[tokio::test]
    async fn nonpositive_limits_disable_the_window() {
        let limiter = SendLimiter::new();
        let session = session_with_limits(0, 0);

        for _ in 0..1000 {
            limiter.try_acquire_at(&session, at(9, 0)).await.unwrap();
        }
        assert_eq!(limiter.remaining_at(&session, at(9, 0)).await, i64::MAX);
    }

    #[tokio::test]
    async fn sessions_are_limited_independently() {
        let limiter = SendLimiter::new();
        let a = session_with_limits(1, 10);
        let mut b = session_with_limits(1, 10);
        b.id = "s2".to_string();

        limiter.try_acquire_at(&a, at(9, 0)).await.unwrap();
        assert!(limiter.try_acquire_at(&a, at(9, 1)).await.is_err());

        // Session b is untouched by a's exhaustion.
        limiter.try_acquire_at(&b, at(9, 1)).await.unwrap();
    }
}
