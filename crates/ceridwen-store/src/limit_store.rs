//! Rate-limit event log and daily rollup.
//!
//! The limiting decision is always derived by counting raw events inside
//! the trailing window; the daily aggregate is a reporting rollup and is
//! never consulted for the decision. Event timestamps are unix
//! milliseconds so window scans are plain integer range queries.

use chrono::{TimeZone, Utc};
use rusqlite::{OptionalExtension, params};

use crate::{Database, Result};

/// Outcome of one transactional window check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCheck {
    /// Whether the request was over quota (count before insert >= max).
    pub blocked: bool,
    /// Events already inside the window before this one was recorded.
    pub count: i64,
    /// Timestamp of the oldest in-window event, for retry-after hints.
    pub oldest_in_window_ms: Option<i64>,
}

/// One row of the daily reporting rollup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTotals {
    pub date: String,
    pub endpoint: String,
    pub total_requests: i64,
    pub blocked_requests: i64,
}

/// Repository for rate-limit facts.
#[derive(Clone)]
pub struct LimitStore {
    db: Database,
}

impl LimitStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Count in-window events for (endpoint, actor), record the new event
    /// with its blocked flag, and roll the daily aggregate — all in one
    /// transaction, so checking and consuming quota cannot race.
    pub fn check_window(
        &self,
        endpoint: &str,
        actor_hash: &str,
        actor_kind: &str,
        max_requests: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<WindowCheck> {
        let window_start = now_ms - window_ms;
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM rate_limit_events
             WHERE endpoint = ?1 AND actor_hash = ?2 AND created_at_ms > ?3",
            params![endpoint, actor_hash, window_start],
            |row| row.get(0),
        )?;

        let oldest_in_window_ms: Option<i64> = tx
            .query_row(
                "SELECT MIN(created_at_ms) FROM rate_limit_events
                 WHERE endpoint = ?1 AND actor_hash = ?2 AND created_at_ms > ?3",
                params![endpoint, actor_hash, window_start],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        let blocked = count >= i64::from(max_requests);

        tx.execute(
            "INSERT INTO rate_limit_events (endpoint, actor_hash, actor_kind, blocked, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![endpoint, actor_hash, actor_kind, blocked as i64, now_ms],
        )?;

        tx.execute(
            "INSERT INTO rate_limit_daily (date, endpoint, total_requests, blocked_requests)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(date, endpoint) DO UPDATE SET
                 total_requests = total_requests + 1,
                 blocked_requests = blocked_requests + excluded.blocked_requests",
            params![date_of(now_ms), endpoint, blocked as i64],
        )?;

        tx.commit()?;

        Ok(WindowCheck {
            blocked,
            count,
            oldest_in_window_ms,
        })
    }

    /// Delete events older than the retention horizon. Returns rows removed.
    pub fn prune_events(&self, older_than_ms: i64) -> Result<usize> {
        let deleted = self.db.conn().execute(
            "DELETE FROM rate_limit_events WHERE created_at_ms < ?1",
            params![older_than_ms],
        )?;
        Ok(deleted)
    }

    /// Read one day's rollup for an endpoint, if any requests were seen.
    pub fn daily_totals(&self, date: &str, endpoint: &str) -> Result<Option<DailyTotals>> {
        Ok(self
            .db
            .conn()
            .query_row(
                "SELECT date, endpoint, total_requests, blocked_requests
                 FROM rate_limit_daily WHERE date = ?1 AND endpoint = ?2",
                params![date, endpoint],
                |row| {
                    Ok(DailyTotals {
                        date: row.get(0)?,
                        endpoint: row.get(1)?,
                        total_requests: row.get(2)?,
                        blocked_requests: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }
}

fn date_of(now_ms: i64) -> String {
    Utc.timestamp_millis_opt(now_ms)
        .single()
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d")
        .to_string()
}
