use ledgerlink_core::{BankAccount, BankAccountId, TenantId};
use sqlx::SqliteExecutor;

use crate::db::StorageError;

pub async fn insert_bank_account<'e, E: SqliteExecutor<'e>>(
    executor: E,
    account: &BankAccount,
) -> Result<BankAccountId, StorageError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO bank_accounts (tenant_id, name, iban, currency) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(account.tenant_id.0)
    .bind(&account.name)
    .bind(&account.iban)
    .bind(&account.currency)
    .fetch_one(executor)
    .await?;

    Ok(BankAccountId(id))
}

pub async fn find_account_by_id<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: BankAccountId,
) -> Result<Option<BankAccount>, StorageError> {
    let row = sqlx::query_as::<_, (i64, i64, String, Option<String>, String)>(
        "SELECT id, tenant_id, name, iban, currency FROM bank_accounts WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|r| BankAccount {
        id: Some(BankAccountId(r.0)),
        tenant_id: TenantId(r.1),
        name: r.2,
        iban: r.3,
        currency: r.4,
    }))
}

pub async fn currency_of<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: BankAccountId,
) -> Result<Option<String>, StorageError> {
    let currency = sqlx::query_scalar::<_, String>("SELECT currency FROM bank_accounts WHERE id = ?")
        .bind(id.0)
        .fetch_optional(executor)
        .await?;
    Ok(currency)
}
