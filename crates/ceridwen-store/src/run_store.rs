//! Run row persistence.
//!
//! The engine persists the full run row after every step transition, so a
//! crash between any two steps leaves the stored state consistent with the
//! work completed so far. Updates carry the version the caller read;
//! a mismatch means another writer got there first.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ceridwen_types::{OutputRefs, RunInput, RunStatus, StepId, StepRecord, Timestamp};

use crate::{Database, Result, StoreError};

/// One orchestration execution, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub subject_id: String,
    pub status: RunStatus,
    pub current_step: Option<StepId>,
    pub steps: Vec<StepRecord>,
    pub input: RunInput,
    pub output_refs: OutputRefs,
    pub last_error: Option<String>,
    /// Optimistic concurrency version; bumped on every successful update.
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RunRecord {
    /// Create a fresh `running` record positioned at the first step.
    pub fn new(subject_id: &str, input: RunInput, steps: Vec<StepRecord>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            status: RunStatus::Running,
            current_step: steps.first().map(|s| s.id),
            steps,
            input,
            output_refs: OutputRefs::new(),
            last_error: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository for run rows.
#[derive(Clone)]
pub struct RunStore {
    db: Database,
}

impl RunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a newly created run.
    pub fn create_run(&self, run: &RunRecord) -> Result<()> {
        self.db.conn().execute(
            "INSERT INTO runs (id, subject_id, status, current_step, steps, input, output_refs,
                               last_error, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run.id,
                run.subject_id,
                run.status.as_str(),
                run.current_step.map(|s| s.as_str()),
                serde_json::to_string(&run.steps)?,
                serde_json::to_string(&run.input)?,
                serde_json::to_string(&run.output_refs)?,
                run.last_error,
                run.version,
                run.created_at.to_rfc3339(),
                run.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a run by id.
    pub fn get_run(&self, id: &str) -> Result<RunRecord> {
        self.db
            .conn()
            .query_row(
                "SELECT id, subject_id, status, current_step, steps, input, output_refs,
                        last_error, version, created_at, updated_at
                 FROM runs WHERE id = ?1",
                params![id],
                row_to_run,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
    }

    /// Overwrite the mutable columns of a run, gated on the version the
    /// caller read. On success the record's version and `updated_at` are
    /// bumped in place.
    pub fn update_run(&self, run: &mut RunRecord) -> Result<()> {
        let now = Utc::now();
        let updated = self.db.conn().execute(
            "UPDATE runs
             SET status = ?1, current_step = ?2, steps = ?3, input = ?4, output_refs = ?5,
                 last_error = ?6, version = version + 1, updated_at = ?7
             WHERE id = ?8 AND version = ?9",
            params![
                run.status.as_str(),
                run.current_step.map(|s| s.as_str()),
                serde_json::to_string(&run.steps)?,
                serde_json::to_string(&run.input)?,
                serde_json::to_string(&run.output_refs)?,
                run.last_error,
                now.to_rfc3339(),
                run.id,
                run.version,
            ],
        )?;

        if updated == 0 {
            let exists: bool = self.db.conn().query_row(
                "SELECT EXISTS(SELECT 1 FROM runs WHERE id = ?1)",
                params![run.id],
                |row| row.get(0),
            )?;
            return Err(if exists {
                StoreError::Conflict {
                    id: run.id.clone(),
                    read: run.version,
                }
            } else {
                StoreError::NotFound(run.id.clone())
            });
        }

        run.version += 1;
        run.updated_at = now;
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<RunRecord>> {
    let status: String = row.get(2)?;
    let current_step: Option<String> = row.get(3)?;
    let steps: String = row.get(4)?;
    let input: String = row.get(5)?;
    let output_refs: String = row.get(6)?;

    Ok(build_run(
        row.get(0)?,
        row.get(1)?,
        status,
        current_step,
        steps,
        input,
        output_refs,
        row.get(7)?,
        row.get(8)?,
        row.get::<_, String>(9)?,
        row.get::<_, String>(10)?,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_run(
    id: String,
    subject_id: String,
    status: String,
    current_step: Option<String>,
    steps: String,
    input: String,
    output_refs: String,
    last_error: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
) -> Result<RunRecord> {
    let status: RunStatus = serde_json::from_value(serde_json::Value::String(status))?;
    let current_step = current_step
        .map(|s| serde_json::from_value::<StepId>(serde_json::Value::String(s)))
        .transpose()?;
    Ok(RunRecord {
        id,
        subject_id,
        status,
        current_step,
        steps: serde_json::from_str(&steps)?,
        input: serde_json::from_str(&input)?,
        output_refs: serde_json::from_str(&output_refs)?,
        last_error,
        version,
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}
