//! SQLite-based persistence for the session core.
//!
//! Provides persistent storage for:
//! - Resource progress per (quiz, user, resource) for resume-on-reload
//! - Final submitted/expired results
//! - Key-value store for parked session state
//!
//! The in-memory orchestrator stays authoritative; writes here happen
//! outside its state transitions and failures propagate for retry.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::StorageError;
use crate::model::ResourceProgress;
use crate::scoring::ScoreSummary;

/// One finished attempt, as stored in the `results` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub correct: u32,
    pub total: u32,
    pub percentage: u32,
    pub time_spent_secs: u32,
    /// True when the attempt ended by expiry auto-submit.
    pub expired: bool,
    pub submitted_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn new(
        quiz_id: impl Into<String>,
        user_id: impl Into<String>,
        score: ScoreSummary,
        time_spent_secs: u32,
        expired: bool,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            quiz_id: quiz_id.into(),
            user_id: user_id.into(),
            correct: score.correct,
            total: score.total,
            percentage: score.percentage,
            time_spent_secs,
            expired,
            submitted_at,
        }
    }
}

/// SQLite database for session persistence.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/quizgate/quizgate.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("quizgate.db");
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open the database at an explicit path (used by tests with tempdirs).
    pub fn open_at(path: &std::path::Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS resource_progress (
                    quiz_id         TEXT NOT NULL,
                    user_id         TEXT NOT NULL,
                    resource_id     TEXT NOT NULL,
                    completed       INTEGER NOT NULL DEFAULT 0,
                    progress_ratio  REAL NOT NULL DEFAULT 0,
                    last_updated_at TEXT NOT NULL,
                    PRIMARY KEY (quiz_id, user_id, resource_id)
                );

                CREATE TABLE IF NOT EXISTS results (
                    id              TEXT PRIMARY KEY,
                    quiz_id         TEXT NOT NULL,
                    user_id         TEXT NOT NULL,
                    correct         INTEGER NOT NULL,
                    total           INTEGER NOT NULL,
                    percentage      INTEGER NOT NULL,
                    time_spent_secs INTEGER NOT NULL,
                    expired         INTEGER NOT NULL DEFAULT 0,
                    submitted_at    TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_results_quiz ON results(quiz_id);
                CREATE INDEX IF NOT EXISTS idx_results_submitted_at ON results(submitted_at);",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    /// Upsert one progress row. The monotonicity invariant is enforced by
    /// the gating engine before the row gets here.
    pub fn upsert_progress(
        &self,
        quiz_id: &str,
        user_id: &str,
        progress: &ResourceProgress,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO resource_progress
                 (quiz_id, user_id, resource_id, completed, progress_ratio, last_updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                quiz_id,
                user_id,
                progress.resource_id,
                progress.completed as i64,
                progress.progress_ratio,
                progress.last_updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load all progress rows for a (quiz, user) pair.
    pub fn load_progress(
        &self,
        quiz_id: &str,
        user_id: &str,
    ) -> Result<Vec<ResourceProgress>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT resource_id, completed, progress_ratio, last_updated_at
             FROM resource_progress
             WHERE quiz_id = ?1 AND user_id = ?2",
        )?;
        let rows = stmt.query_map(params![quiz_id, user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (resource_id, completed, progress_ratio, updated) = row?;
            entries.push(ResourceProgress {
                resource_id,
                completed: completed != 0,
                progress_ratio,
                last_updated_at: updated
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now()),
            });
        }
        Ok(entries)
    }

    /// Delete progress rows for a (quiz, user) pair (learner restart).
    pub fn clear_progress(&self, quiz_id: &str, user_id: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM resource_progress WHERE quiz_id = ?1 AND user_id = ?2",
            params![quiz_id, user_id],
        )?;
        Ok(())
    }

    /// Record a finished attempt.
    pub fn record_result(&self, record: &ResultRecord) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO results
                 (id, quiz_id, user_id, correct, total, percentage,
                  time_spent_secs, expired, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.quiz_id,
                record.user_id,
                record.correct,
                record.total,
                record.percentage,
                record.time_spent_secs,
                record.expired as i64,
                record.submitted_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent results, newest first.
    pub fn recent_results(&self, limit: u32) -> Result<Vec<ResultRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, quiz_id, user_id, correct, total, percentage,
                    time_spent_secs, expired, submitted_at
             FROM results
             ORDER BY submitted_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(ResultRecord {
                id: row.get(0)?,
                quiz_id: row.get(1)?,
                user_id: row.get(2)?,
                correct: row.get(3)?,
                total: row.get(4)?,
                percentage: row.get(5)?,
                time_spent_secs: row.get(6)?,
                expired: row.get::<_, i64>(7)? != 0,
                submitted_at: row
                    .get::<_, String>(8)?
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a value from the kv store.
    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
