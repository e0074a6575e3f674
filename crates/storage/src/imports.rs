use chrono::{DateTime, Utc};
use ledgerlink_core::{BankAccountId, ImportId, ImportRecord};
use sqlx::SqliteExecutor;

use crate::db::{count_from_db, parse_stored_timestamp, timestamp_string, StorageError};

const TABLE: &str = "bank_imports";

pub async fn insert_import_summary<'e, E: SqliteExecutor<'e>>(
    executor: E,
    bank_account_id: BankAccountId,
    file_name: &str,
    transactions_imported: u32,
    duplicates_skipped: u32,
    imported_at: DateTime<Utc>,
) -> Result<ImportId, StorageError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO bank_imports (
            bank_account_id, file_name, transactions_imported, transactions_matched,
            duplicates_skipped, imported_at
        ) VALUES (?, ?, ?, 0, ?, ?)
        RETURNING id
        "#,
    )
    .bind(bank_account_id.0)
    .bind(file_name)
    .bind(i64::from(transactions_imported))
    .bind(i64::from(duplicates_skipped))
    .bind(timestamp_string(imported_at))
    .fetch_one(executor)
    .await?;

    Ok(ImportId(id))
}

/// Adds `matched` to the most recent import of the account. Returns zero
/// when the account has never imported anything.
pub async fn increment_import_matched_count<'e, E: SqliteExecutor<'e>>(
    executor: E,
    bank_account_id: BankAccountId,
    matched: u32,
) -> Result<u64, StorageError> {
    let result = sqlx::query(
        r#"
        UPDATE bank_imports
        SET transactions_matched = transactions_matched + ?
        WHERE id = (
            SELECT id FROM bank_imports
            WHERE bank_account_id = ?
            ORDER BY imported_at DESC, id DESC
            LIMIT 1
        )
        "#,
    )
    .bind(i64::from(matched))
    .bind(bank_account_id.0)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Newest first.
pub async fn list_imports<'e, E: SqliteExecutor<'e>>(
    executor: E,
    bank_account_id: BankAccountId,
) -> Result<Vec<ImportRecord>, StorageError> {
    let rows = sqlx::query_as::<_, (i64, i64, String, i64, i64, i64, String)>(
        "SELECT id, bank_account_id, file_name, transactions_imported, transactions_matched, \
         duplicates_skipped, imported_at FROM bank_imports \
         WHERE bank_account_id = ? ORDER BY imported_at DESC, id DESC",
    )
    .bind(bank_account_id.0)
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(ImportRecord {
                id: ImportId(r.0),
                bank_account_id: BankAccountId(r.1),
                file_name: r.2,
                transactions_imported: count_from_db(TABLE, r.3)?,
                transactions_matched: count_from_db(TABLE, r.4)?,
                duplicates_skipped: count_from_db(TABLE, r.5)?,
                imported_at: parse_stored_timestamp(TABLE, &r.6)?,
            })
        })
        .collect()
}
