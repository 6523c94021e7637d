//! Persistence layer for the local collection ledger.
//!
//! SQLite with async access via sqlx. Two tables:
//!
//! ## collection_records
//! The local ledger of collected transactions. Settlement synchronization
//! stamps settlement details onto existing rows; it never creates rows.
//! - id: autoincrement
//! - external_transaction_id: provider transaction id, unique
//! - region_code, amount, notes
//! - settlement_id, settlement_sequence, settlement_status, deposit_date,
//!   period_from, period_to, settled_amount, gross_amount, net_amount,
//!   commission, tax: filled in by reconciliation
//! - created_at, updated_at
//!
//! ## settlement_audit
//! Append-only trail of every settlement processed, one row per settlement
//! per run.

pub mod audit_repository;
pub mod collection_repository;
pub mod models;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Initialize the connection pool with the default pool size and run
/// migrations.
///
/// `database_url` is a sqlx SQLite URL, e.g. "sqlite://data/rendix.db" or
/// "sqlite::memory:" for tests.
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    init_database_with_connections(database_url, DEFAULT_MAX_CONNECTIONS).await
}

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Initialize the connection pool with a configured size and run migrations.
pub async fn init_database_with_connections(
    database_url: &str,
    max_connections: u32,
) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    // Each connection to an in-memory database sees its own database, so
    // those pools must stay at a single connection.
    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        max_connections
    };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_transaction_id TEXT NOT NULL UNIQUE,
            region_code TEXT NOT NULL,
            amount REAL NOT NULL,
            settlement_id INTEGER,
            settlement_sequence INTEGER,
            settlement_status TEXT,
            deposit_date DATE,
            period_from DATE,
            period_to DATE,
            settled_amount REAL,
            gross_amount REAL,
            net_amount REAL,
            commission REAL,
            tax REAL,
            notes TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create collection_records table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settlement_audit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            region_code TEXT NOT NULL,
            settlement_id INTEGER NOT NULL,
            settlement_sequence INTEGER,
            settlement_status TEXT NOT NULL,
            period_from DATE,
            period_to DATE,
            gross_amount REAL,
            net_amount REAL,
            item_count INTEGER,
            processed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create settlement_audit table: {}", e))
    })?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_collection_txn_id \
         ON collection_records(external_transaction_id)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_collection_settlement \
         ON collection_records(settlement_id)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audit_region_time \
         ON settlement_audit(region_code, processed_at)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("Database migrations completed successfully");

    Ok(())
}
