use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use ledgerlink_core::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub type DbPool = Pool<Sqlite>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt value in {table}: {message}")]
    Corrupt {
        table: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ledgerlink.db"),
            max_connections: 4,
            busy_timeout_ms: 5000,
        }
    }
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = StorageOptions {
        path: path.to_path_buf(),
        ..StorageOptions::default()
    };
    open_db(&options).await
}

/// Opens (creating if needed) the database file and brings the schema up to
/// date. Pragmas are set on the connect options so every pooled connection
/// gets them.
pub async fn open_db(options: &StorageOptions) -> Result<DbPool, StorageError> {
    let connect = SqliteConnectOptions::new()
        .filename(&options.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(options.busy_timeout_ms))
        .pragma("cache_size", "-32000");

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections.max(1))
        .connect_with(connect)
        .await?;

    run_migrations(&pool).await?;
    debug!(path = %options.path.display(), "database ready");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            iban TEXT,
            currency TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            number TEXT NOT NULL,
            payment_date TEXT NOT NULL,
            amount TEXT NOT NULL,
            contact_name TEXT NOT NULL DEFAULT '',
            reference TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_allocations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payment_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            FOREIGN KEY (payment_id) REFERENCES payments(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_reconciliations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            bank_account_id INTEGER NOT NULL,
            statement_date TEXT NOT NULL,
            opening_balance TEXT NOT NULL,
            closing_balance TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'IN_PROGRESS'
                CHECK (status IN ('IN_PROGRESS', 'COMPLETED')),
            completed_at TEXT,
            created_by TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK ((status = 'COMPLETED') = (completed_at IS NOT NULL)),
            FOREIGN KEY (bank_account_id) REFERENCES bank_accounts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL,
            bank_account_id INTEGER NOT NULL,
            transaction_date TEXT NOT NULL,
            value_date TEXT,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            reference TEXT NOT NULL DEFAULT '',
            counterparty_name TEXT NOT NULL DEFAULT '',
            counterparty_account TEXT NOT NULL DEFAULT '',
            external_id TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'UNMATCHED'
                CHECK (status IN ('UNMATCHED', 'MATCHED', 'RECONCILED')),
            matched_payment_id INTEGER,
            reconciliation_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK ((status = 'UNMATCHED') = (matched_payment_id IS NULL)),
            FOREIGN KEY (bank_account_id) REFERENCES bank_accounts(id),
            FOREIGN KEY (matched_payment_id) REFERENCES payments(id),
            FOREIGN KEY (reconciliation_id) REFERENCES bank_reconciliations(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_bank_transactions_external_id \
         ON bank_transactions (bank_account_id, external_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_bank_transactions_date_amount \
         ON bank_transactions (bank_account_id, transaction_date, amount)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_bank_transactions_status \
         ON bank_transactions (bank_account_id, status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bank_account_id INTEGER NOT NULL,
            file_name TEXT NOT NULL,
            transactions_imported INTEGER NOT NULL DEFAULT 0,
            transactions_matched INTEGER NOT NULL DEFAULT 0,
            duplicates_skipped INTEGER NOT NULL DEFAULT 0,
            imported_at TEXT NOT NULL,
            FOREIGN KEY (bank_account_id) REFERENCES bank_accounts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) fn corrupt(table: &'static str, message: impl Into<String>) -> StorageError {
    StorageError::Corrupt {
        table,
        message: message.into(),
    }
}

pub(crate) fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_stored_date(table: &'static str, raw: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| corrupt(table, format!("date {raw:?}: {e}")))
}

pub(crate) fn parse_stored_money(table: &'static str, raw: &str) -> Result<Money, StorageError> {
    Decimal::from_str(raw)
        .map(Money::new)
        .map_err(|e| corrupt(table, format!("amount {raw:?}: {e}")))
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub(crate) fn timestamp_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_stored_timestamp(
    table: &'static str,
    raw: &str,
) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| corrupt(table, format!("timestamp {raw:?}: {e}")))
}

pub(crate) fn count_from_db(table: &'static str, raw: i64) -> Result<u32, StorageError> {
    u32::try_from(raw).map_err(|_| corrupt(table, format!("count {raw} out of range")))
}
