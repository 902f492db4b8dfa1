//! Database access for verdant-vd
//!
//! One SQLite database holds the discovered venue review queue, the
//! production venue/dish tables, and the append-only audit log.

pub mod audit;
pub mod discovered_venues;
pub mod dishes;
pub mod venues;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;
use thiserror::Error;

/// Store-level errors surfaced by transition operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied field fails a contract
    #[error("validation: {0}")]
    Validation(String),

    /// Transition precondition no longer holds (caller should refetch and retry)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying sqlx failure
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON column could not be encoded/decoded
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for crate::error::ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => crate::error::ApiError::NotFound(msg),
            StoreError::Validation(msg) => crate::error::ApiError::Validation(msg),
            StoreError::Conflict(msg) => crate::error::ApiError::Conflict(msg),
            StoreError::Database(e) => {
                crate::error::ApiError::Internal(format!("Database error: {}", e))
            }
            StoreError::Serialization(e) => {
                crate::error::ApiError::Internal(format!("Serialization error: {}", e))
            }
        }
    }
}

/// Initialize database connection pool and run table migrations.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create verdant-vd tables if they don't exist.
///
/// Also used directly by tests against `sqlite::memory:` pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discovered_venues (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_normalized TEXT NOT NULL,
            street TEXT,
            city TEXT NOT NULL,
            city_normalized TEXT NOT NULL,
            postal_code TEXT,
            country TEXT NOT NULL,
            lat REAL,
            lng REAL,
            is_chain INTEGER NOT NULL DEFAULT 0,
            chain_id TEXT,
            chain_name TEXT,
            chain_confidence REAL,
            delivery_platforms TEXT NOT NULL DEFAULT '[]',
            planted_products TEXT NOT NULL DEFAULT '[]',
            dishes TEXT NOT NULL DEFAULT '[]',
            confidence_score INTEGER NOT NULL,
            confidence_factors TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'discovered',
            rejection_reason TEXT,
            production_venue_id TEXT,
            discovered_by_strategy_id TEXT NOT NULL,
            discovered_by_query TEXT NOT NULL,
            created_at TEXT NOT NULL,
            verified_at TEXT,
            last_seen_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_discovered_identity
         ON discovered_venues (name_normalized, city_normalized, country)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_discovered_status ON discovered_venues (status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venues (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_normalized TEXT NOT NULL,
            street TEXT,
            city TEXT NOT NULL,
            city_normalized TEXT NOT NULL,
            postal_code TEXT,
            country TEXT NOT NULL,
            lat REAL,
            lng REAL,
            delivery_platforms TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'active',
            discovered_venue_id TEXT,
            created_at TEXT NOT NULL,
            last_verified TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_venues_identity
         ON venues (name_normalized, city_normalized, country)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dishes (
            id TEXT PRIMARY KEY,
            venue_id TEXT NOT NULL REFERENCES venues(id),
            name TEXT NOT NULL,
            name_normalized TEXT NOT NULL,
            price TEXT,
            product TEXT NOT NULL,
            description TEXT,
            image_url TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (venue_id, name_normalized)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action TEXT NOT NULL,
            collection TEXT NOT NULL,
            document_id TEXT NOT NULL,
            changes TEXT NOT NULL DEFAULT '[]',
            reason TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (discovered_venues, venues, dishes, audit_log)");

    Ok(())
}

/// Lowercased, whitespace-collapsed form used for identity matching
pub fn normalize_key(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
