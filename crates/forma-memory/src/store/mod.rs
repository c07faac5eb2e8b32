//! SQLite-backed persistent store.
//!
//! Split into focused submodules:
//! - `identities` — multi-key identity resolution and lead tagging
//! - `messages` — append-only history with two-pass deduplication
//! - `followups` — manual follow-up records for failed external edits

mod followups;
mod identities;
mod messages;

pub use identities::Identity;
pub use messages::{Direction, StoredMessage};

use forma_core::{
    config::{shellexpand, MemoryConfig},
    error::FormaError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    max_context_messages: usize,
    /// Window (seconds) within which identical messages are duplicates.
    dedup_window_secs: i64,
}

impl Store {
    /// Create a new store, running migrations on first use.
    ///
    /// A `db_path` of `:memory:` gives an in-memory database (used by
    /// tests); it is pinned to a single connection since every SQLite
    /// memory connection is its own database.
    pub async fn new(config: &MemoryConfig) -> Result<Self, FormaError> {
        let in_memory = config.db_path == ":memory:";
        let db_path = shellexpand(&config.db_path);

        if !in_memory {
            // Ensure parent directory exists.
            if let Some(parent) = std::path::Path::new(&db_path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| FormaError::Memory(format!("failed to create data dir: {e}")))?;
            }
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| FormaError::Memory(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                sqlx::sqlite::SqliteJournalMode::Memory
            } else {
                sqlx::sqlite::SqliteJournalMode::Wal
            });

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(opts)
            .await
            .map_err(|e| FormaError::Memory(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("store initialized at {db_path}");

        Ok(Self {
            pool,
            max_context_messages: config.max_context_messages,
            dedup_window_secs: config.dedup_window_secs,
        })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), FormaError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| FormaError::Memory(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[
            ("001_init", include_str!("../../migrations/001_init.sql")),
            (
                "002_followups",
                include_str!("../../migrations/002_followups.sql"),
            ),
            (
                "003_audit_log",
                include_str!("../../migrations/003_audit_log.sql"),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        FormaError::Memory(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| FormaError::Memory(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    FormaError::Memory(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}
