//! SQLite-backed LetterStore.
//!
//! Persists letters and their status history in a single WAL-mode SQLite file.
//!
//! Usage:
//! ```ignore
//! let store = SqliteLetterStore::new("/path/to/courier.db").await?;
//! ```

use crate::letters::models::{
    INITIAL_STATUS, Letter, LetterHistory, Reconciled, StatusObservation, TrackingNumber,
    truncate_to_micros,
};
use crate::letters::reconcile::{self, ReconcilePlan};
use crate::letters::traits::LetterStore;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::Duration;

/// A durable, file-backed LetterStore.
#[derive(Clone)]
pub struct SqliteLetterStore {
    pool: SqlitePool,
}

impl SqliteLetterStore {
    /// Create (or open) the store at `path`, creating parent directories and applying the schema.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::backend("sqlite_letter_store mkdir", e))?;
            }
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| Error::backend("sqlite_letter_store connect", e))?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::backend("sqlite_letter_store schema", e))?;

        tracing::info!(path = %path.display(), "sqlite letter store ready");
        Ok(Self { pool })
    }

    async fn load_history(&self, letter_id: i64) -> Result<Vec<StatusObservation>> {
        let rows = sqlx::query(
            r#"
SELECT id, status, observed_at
FROM letter_status_history
WHERE letter_id = ?1
ORDER BY observed_at DESC, id DESC
"#,
        )
        .bind(letter_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::backend("load status history", e))?;

        rows.iter().map(row_to_observation).collect()
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS letters (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  tracking_number TEXT NOT NULL UNIQUE,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS letter_status_history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  letter_id INTEGER NOT NULL REFERENCES letters(id),
  status TEXT NOT NULL,
  observed_at TEXT NOT NULL,
  UNIQUE (letter_id, observed_at)
);
CREATE INDEX IF NOT EXISTS lsh_letter_observed_idx
  ON letter_status_history(letter_id, observed_at DESC);
"#;

#[async_trait]
impl LetterStore for SqliteLetterStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn register(
        &self,
        tracking_number: &TrackingNumber,
        now: DateTime<Utc>,
    ) -> Result<LetterHistory> {
        let now = truncate_to_micros(now);
        let ts = format_ts(now);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::backend("register begin", e))?;

        let inserted = sqlx::query(
            r#"
INSERT INTO letters (tracking_number, created_at, updated_at)
VALUES (?1, ?2, ?2)
ON CONFLICT(tracking_number) DO NOTHING
RETURNING id
"#,
        )
        .bind(tracking_number.as_str())
        .bind(&ts)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::backend("insert letter", e))?;

        let Some(row) = inserted else {
            return Err(Error::DuplicateLetter(tracking_number.to_string()));
        };
        let letter_id: i64 = row.get("id");

        let observation_id: i64 = sqlx::query(
            r#"
INSERT INTO letter_status_history (letter_id, status, observed_at)
VALUES (?1, ?2, ?3)
RETURNING id
"#,
        )
        .bind(letter_id)
        .bind(INITIAL_STATUS)
        .bind(&ts)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::backend("insert initial status", e))?
        .get("id");

        tx.commit()
            .await
            .map_err(|e| Error::backend("register commit", e))?;

        Ok(LetterHistory {
            letter: Letter {
                id: letter_id,
                tracking_number: tracking_number.clone(),
                created_at: now,
                updated_at: now,
            },
            history: vec![StatusObservation {
                id: observation_id,
                status: INITIAL_STATUS.to_string(),
                observed_at: now,
            }],
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, tracking_number: &TrackingNumber) -> Result<Option<LetterHistory>> {
        let row = sqlx::query(
            r#"
SELECT id, tracking_number, created_at, updated_at
FROM letters
WHERE tracking_number = ?1
"#,
        )
        .bind(tracking_number.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::backend("load letter", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let letter = row_to_letter(&row)?;
        let history = self.load_history(letter.id).await?;
        Ok(Some(LetterHistory { letter, history }))
    }

    async fn exists(&self, tracking_number: &TrackingNumber) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS present FROM letters WHERE tracking_number = ?1")
            .bind(tracking_number.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::backend("letter exists", e))?;
        Ok(row.is_some())
    }

    async fn list_tracking_numbers(&self) -> Result<Vec<TrackingNumber>> {
        let rows = sqlx::query("SELECT tracking_number FROM letters ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::backend("list tracking numbers", e))?;

        rows.iter()
            .map(|row| TrackingNumber::new(row.get::<String, _>("tracking_number")))
            .collect()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn reconcile_status(
        &self,
        tracking_number: &TrackingNumber,
        status: &str,
        now: DateTime<Utc>,
    ) -> Result<Reconciled> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::backend("reconcile begin", e))?;

        // Write first: the transaction holds the write lock before the latest row is read.
        let letter = sqlx::query(
            r#"
UPDATE letters SET updated_at = ?2
WHERE tracking_number = ?1
RETURNING id
"#,
        )
        .bind(tracking_number.as_str())
        .bind(format_ts(truncate_to_micros(now)))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::backend("touch letter", e))?;
        let Some(letter) = letter else {
            return Err(Error::NotFound(format!(
                "letter '{tracking_number}' not found"
            )));
        };
        let letter_id: i64 = letter.get("id");

        let latest = sqlx::query(
            r#"
SELECT id, status, observed_at
FROM letter_status_history
WHERE letter_id = ?1
ORDER BY observed_at DESC, id DESC
LIMIT 1
"#,
        )
        .bind(letter_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::backend("load latest status", e))?
        .as_ref()
        .map(row_to_observation)
        .transpose()?;

        let planned = reconcile::plan(latest.as_ref(), status, now);
        let observation = match planned {
            ReconcilePlan::Touch {
                observation_id,
                observed_at,
            } => {
                sqlx::query("UPDATE letter_status_history SET observed_at = ?2 WHERE id = ?1")
                    .bind(observation_id)
                    .bind(format_ts(observed_at))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| Error::backend("touch status", e))?;
                StatusObservation {
                    id: observation_id,
                    status: status.to_string(),
                    observed_at,
                }
            }
            ReconcilePlan::Append { observed_at } => {
                let id: i64 = sqlx::query(
                    r#"
INSERT INTO letter_status_history (letter_id, status, observed_at)
VALUES (?1, ?2, ?3)
RETURNING id
"#,
                )
                .bind(letter_id)
                .bind(status)
                .bind(format_ts(observed_at))
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| Error::backend("append status", e))?
                .get("id");
                StatusObservation {
                    id,
                    status: status.to_string(),
                    observed_at,
                }
            }
        };

        tx.commit()
            .await
            .map_err(|e| Error::backend("reconcile commit", e))?;

        Ok(Reconciled {
            tracking_number: tracking_number.clone(),
            observation,
            outcome: planned.outcome(),
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, tracking_number: &TrackingNumber) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::backend("delete begin", e))?;

        // Observations are removed explicitly; the FK carries no cascade.
        sqlx::query(
            r#"
DELETE FROM letter_status_history
WHERE letter_id IN (SELECT id FROM letters WHERE tracking_number = ?1)
"#,
        )
        .bind(tracking_number.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::backend("delete status history", e))?;

        let deleted = sqlx::query("DELETE FROM letters WHERE tracking_number = ?1")
            .bind(tracking_number.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::backend("delete letter", e))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| Error::backend("delete commit", e))?;
        Ok(deleted > 0)
    }
}

/// Fixed-width RFC 3339 so that text ordering in SQL equals time ordering.
fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::backend("parse datetime", e))
}

fn row_to_letter(row: &SqliteRow) -> Result<Letter> {
    Ok(Letter {
        id: row.get("id"),
        tracking_number: TrackingNumber::new(row.get::<String, _>("tracking_number"))?,
        created_at: parse_ts(row.get::<String, _>("created_at").as_str())?,
        updated_at: parse_ts(row.get::<String, _>("updated_at").as_str())?,
    })
}

fn row_to_observation(row: &SqliteRow) -> Result<StatusObservation> {
    Ok(StatusObservation {
        id: row.get("id"),
        status: row.get("status"),
        observed_at: parse_ts(row.get::<String, _>("observed_at").as_str())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_as_text() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let b = a + chrono::TimeDelta::microseconds(1);
        let c = a + chrono::TimeDelta::hours(5);
        let mut texts = vec![format_ts(c), format_ts(a), format_ts(b)];
        texts.sort();
        assert_eq!(texts, vec![format_ts(a), format_ts(b), format_ts(c)]);
        assert_eq!(format_ts(a), "2024-01-01T09:00:00.000000Z");
    }

    #[test]
    fn timestamps_round_trip_at_micro_precision() {
        let at = truncate_to_micros(Utc.timestamp_opt(1_700_000_000, 987_654_321).unwrap());
        assert_eq!(parse_ts(&format_ts(at)).unwrap(), at);
    }
}
