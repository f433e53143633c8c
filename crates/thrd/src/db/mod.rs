//! SQLite database handle.
//!
//! The pool is constructed explicitly and passed into the store layer;
//! there is no process-wide engine. Construct at startup, inject into
//! [`crate::SqliteThreadStore`], close at shutdown.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config;
use crate::error::{ThreadError, ThreadResult};

/// Schema for the thread store.
///
/// `messages.seq` is an autoincrement column used as the deterministic
/// secondary sort key: `created` is float seconds and can collide, so
/// reads order by `(created, seq)`.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS threads (
    id TEXT PRIMARY KEY,
    owner_id TEXT,
    public INTEGER NOT NULL DEFAULT 0,
    name TEXT,
    metadata TEXT,
    role_mapping TEXT NOT NULL DEFAULT '{}',
    remote TEXT,
    version TEXT,
    created REAL NOT NULL,
    updated REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_threads_owner ON threads(owner_id);
CREATE INDEX IF NOT EXISTS idx_threads_created ON threads(created);

CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL,
    text TEXT NOT NULL,
    images TEXT,
    private INTEGER NOT NULL DEFAULT 0,
    created REAL NOT NULL,
    metadata TEXT,
    thread_id TEXT REFERENCES threads(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id);
CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created);
"#;

/// Database connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create the database at the given path.
    pub async fn open(path: &Path) -> ThreadResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(ThreadError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Open the database at the path resolved from the environment.
    pub async fn from_env() -> ThreadResult<Self> {
        Self::open(&config::db_path()).await
    }

    /// Create an in-memory database (for testing).
    pub async fn in_memory() -> ThreadResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(ThreadError::Database)?;

        // A single connection keeps every query on the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Apply the schema.
    async fn initialize_schema(&self) -> ThreadResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if the database is healthy.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
