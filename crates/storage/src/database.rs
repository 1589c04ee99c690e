//! Database layer
//!
//! SQLite connection pooling and versioned migrations for the moderation
//! tables. Each migration runs in its own transaction and is recorded with an
//! md5 checksum of its SQL.

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Error as SqlxError, SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Database error types
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error
    #[error("Database error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored value could not be interpreted
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

/// Result type for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path
    pub path: String,
    /// Maximum number of connections in pool
    pub max_connections: u32,
    /// Connection acquire timeout
    pub connect_timeout: Duration,
    /// Enable WAL mode
    pub wal_mode: bool,
    /// Synchronous mode
    pub synchronous: SynchronousMode,
}

/// SQLite synchronous mode
#[derive(Debug, Clone, Copy)]
pub enum SynchronousMode {
    /// Off - no synchronization
    Off,
    /// Normal - synchronize at critical moments
    Normal,
    /// Full - synchronize after each write
    Full,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "moderation.db".to_string(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(5),
            wal_mode: true,
            synchronous: SynchronousMode::Normal,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable WAL mode
    pub fn wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Set synchronous mode
    pub fn synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }
}

/// Migration definition
#[derive(Debug, Clone)]
pub struct MigrationDefinition {
    /// Migration version number
    pub version: i64,
    /// Migration description
    pub description: String,
    /// SQL to execute (a single statement)
    pub sql: String,
    /// Checksum for verification
    pub checksum: String,
}

impl MigrationDefinition {
    /// Create a new migration definition
    pub fn new(version: i64, description: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = format!("{:x}", md5::compute(&sql));

        Self { version, description: description.into(), sql, checksum }
    }
}

/// Schema for the decision log and human-review markers
pub fn moderation_migrations() -> Vec<MigrationDefinition> {
    vec![
        MigrationDefinition::new(
            1,
            "Create moderation decision log",
            "CREATE TABLE IF NOT EXISTS moderation_decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                action TEXT NOT NULL,
                reason TEXT NOT NULL DEFAULT '',
                actor_id TEXT NOT NULL,
                report_id TEXT,
                reporter_id TEXT,
                created_at INTEGER NOT NULL
            )",
        ),
        MigrationDefinition::new(
            2,
            "Index decisions by target and action",
            "CREATE INDEX IF NOT EXISTS idx_moderation_decisions_target
                ON moderation_decisions (target_type, target_id, action)",
        ),
        MigrationDefinition::new(
            3,
            "Create human review markers",
            "CREATE TABLE IF NOT EXISTS human_reviews (
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                moderator_id TEXT NOT NULL,
                verdict TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (target_type, target_id)
            )",
        ),
    ]
}

/// SQLite database handle
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (creating if missing) a SQLite database
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
            .map_err(|e| DatabaseError::Config(e.to_string()))?
            .create_if_missing(true);

        if config.wal_mode {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        options = match config.synchronous {
            SynchronousMode::Off => options.synchronous(SqliteSynchronous::Off),
            SynchronousMode::Normal => options.synchronous(SqliteSynchronous::Normal),
            SynchronousMode::Full => options.synchronous(SqliteSynchronous::Full),
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;

        Ok(Self { pool })
    }

    /// Open a database and bring the moderation schema up to date
    pub async fn open_moderation(config: DatabaseConfig) -> Result<Self> {
        let db = Self::new(config).await?;
        db.migrate(&moderation_migrations()).await?;
        Ok(db)
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply migrations newer than the recorded version
    pub async fn migrate(&self, migrations: &[MigrationDefinition]) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                checksum TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version = self.current_version().await?;

        for migration in migrations {
            if migration.version <= current_version {
                continue;
            }

            tracing::info!("Applying migration {} - {}", migration.version, migration.description);

            let mut tx = self.pool.begin().await?;

            sqlx::query(&migration.sql).execute(&mut *tx).await.map_err(|e| {
                DatabaseError::Migration(format!("migration {} failed: {}", migration.version, e))
            })?;

            sqlx::query("INSERT INTO _migrations (version, description, checksum) VALUES (?, ?, ?)")
                .bind(migration.version)
                .bind(&migration.description)
                .bind(&migration.checksum)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
        }

        Ok(())
    }

    /// Get current migration version
    pub async fn current_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;

        Ok(version.unwrap_or(0))
    }

    /// Check that the database answers queries
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_database_creation() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        assert!(db.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_moderation_migrations() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.migrate(&moderation_migrations()).await.unwrap();

        assert_eq!(db.current_version().await.unwrap(), 3);

        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .unwrap();
        let tables: Vec<String> = rows.iter().map(|r| r.get("name")).collect();
        assert!(tables.contains(&"moderation_decisions".to_string()));
        assert!(tables.contains(&"human_reviews".to_string()));
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        db.migrate(&moderation_migrations()).await.unwrap();
        db.migrate(&moderation_migrations()).await.unwrap();

        assert_eq!(db.current_version().await.unwrap(), 3);
        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(applied, 3);
    }

    #[tokio::test]
    async fn test_failed_migration_is_not_recorded() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let migrations = vec![MigrationDefinition::new(1, "Broken", "CREATE TABLE (")];

        let result = db.migrate(&migrations).await;
        assert!(matches!(result, Err(DatabaseError::Migration(_))));
        assert_eq!(db.current_version().await.unwrap(), 0);
    }

    #[test]
    fn test_migration_checksum_is_stable() {
        let a = MigrationDefinition::new(1, "a", "SELECT 1");
        let b = MigrationDefinition::new(1, "b", "SELECT 1");
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.checksum.len(), 32);
    }

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("test.db")
            .max_connections(2)
            .connect_timeout(Duration::from_secs(10))
            .wal_mode(false)
            .synchronous(SynchronousMode::Full);

        assert_eq!(config.path, "test.db");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(!config.wal_mode);
        assert!(matches!(config.synchronous, SynchronousMode::Full));
    }
}
