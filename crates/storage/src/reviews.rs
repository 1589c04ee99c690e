//! Human review markers
//!
//! A row in `human_reviews` means a moderator has already adjudicated the
//! target. The dashboard writes these; the watcher only reads them.

use crate::database::{Result, SqliteDatabase};
use sqlx::SqlitePool;

/// SQLite-backed human review marker table
#[derive(Debug, Clone)]
pub struct ReviewStore {
    pool: SqlitePool,
}

impl ReviewStore {
    /// Create a store over a migrated database
    pub fn new(db: &SqliteDatabase) -> Self {
        Self { pool: db.pool().clone() }
    }

    /// Whether a moderator has reviewed the target
    pub async fn is_reviewed(&self, target_type: &str, target_id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM human_reviews WHERE target_type = ? AND target_id = ? LIMIT 1",
        )
        .bind(target_type)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    /// Record (or replace) a moderator's verdict on a target
    pub async fn mark_reviewed(
        &self,
        target_type: &str,
        target_id: &str,
        moderator_id: &str,
        verdict: &str,
        created_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO human_reviews
                (target_type, target_id, moderator_id, verdict, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(target_type)
        .bind(target_id)
        .bind(moderator_id)
        .bind(verdict)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
