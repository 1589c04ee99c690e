//! Append-only moderation decision log
//!
//! Every automated (and dashboard) moderation outcome is a row in
//! `moderation_decisions`. Rows are never updated or deleted.

use crate::database::{Result, SqliteDatabase};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// A stored moderation decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    /// `event`, `account` or `unknown`
    pub target_type: String,
    /// Event id or account public key
    pub target_id: String,
    /// Action taken, e.g. `auto_hidden`
    pub action: String,
    /// Free-form reason
    pub reason: String,
    /// Who decided (`auto` for the watcher)
    pub actor_id: String,
    /// Report that triggered the decision
    pub report_id: Option<String>,
    /// Author of that report
    pub reporter_id: Option<String>,
    /// Unix seconds
    pub created_at: i64,
}

/// SQLite-backed decision log
#[derive(Debug, Clone)]
pub struct DecisionStore {
    pool: SqlitePool,
}

impl DecisionStore {
    /// Create a store over a migrated database
    pub fn new(db: &SqliteDatabase) -> Self {
        Self { pool: db.pool().clone() }
    }

    /// Append a decision
    pub async fn insert(&self, record: &DecisionRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO moderation_decisions
                (target_type, target_id, action, reason, actor_id, report_id, reporter_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.target_type)
        .bind(&record.target_id)
        .bind(&record.action)
        .bind(&record.reason)
        .bind(&record.actor_id)
        .bind(&record.report_id)
        .bind(&record.reporter_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether any decision with one of `actions` exists for the target
    pub async fn exists(&self, target_type: &str, target_id: &str, actions: &[&str]) -> Result<bool> {
        for action in actions {
            let found: Option<i64> = sqlx::query_scalar(
                "SELECT 1 FROM moderation_decisions
                 WHERE target_type = ? AND target_id = ? AND action = ?
                 LIMIT 1",
            )
            .bind(target_type)
            .bind(target_id)
            .bind(*action)
            .fetch_optional(&self.pool)
            .await?;

            if found.is_some() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// All decisions for a target, oldest first
    pub async fn for_target(&self, target_type: &str, target_id: &str) -> Result<Vec<DecisionRecord>> {
        let rows = sqlx::query(
            "SELECT target_type, target_id, action, reason, actor_id, report_id, reporter_id, created_at
             FROM moderation_decisions
             WHERE target_type = ? AND target_id = ?
             ORDER BY id",
        )
        .bind(target_type)
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DecisionRecord {
                target_type: row.get("target_type"),
                target_id: row.get("target_id"),
                action: row.get("action"),
                reason: row.get("reason"),
                actor_id: row.get("actor_id"),
                report_id: row.get("report_id"),
                reporter_id: row.get("reporter_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Number of decisions with the given action
    pub async fn count_action(&self, action: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM moderation_decisions WHERE action = ?")
                .bind(action)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
