use chrono::{DateTime, NaiveDate, Utc};
use ledgerlink_core::{
    BankAccountId, BankReconciliation, Money, ReconciliationId, ReconciliationStatus, TenantId,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;

use crate::db::{
    corrupt, date_string, parse_stored_date, parse_stored_money, parse_stored_timestamp,
    timestamp_string, StorageError,
};

const TABLE: &str = "bank_reconciliations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReconciliation {
    pub tenant_id: TenantId,
    pub bank_account_id: BankAccountId,
    pub statement_date: NaiveDate,
    pub opening_balance: Money,
    pub closing_balance: Money,
    pub created_by: String,
}

#[derive(sqlx::FromRow)]
struct ReconciliationRow {
    id: i64,
    tenant_id: i64,
    bank_account_id: i64,
    statement_date: String,
    opening_balance: String,
    closing_balance: String,
    status: String,
    completed_at: Option<String>,
    created_by: String,
}

impl TryFrom<ReconciliationRow> for BankReconciliation {
    type Error = StorageError;

    fn try_from(row: ReconciliationRow) -> Result<Self, Self::Error> {
        let reconciliation = BankReconciliation {
            id: ReconciliationId(row.id),
            tenant_id: TenantId(row.tenant_id),
            bank_account_id: BankAccountId(row.bank_account_id),
            statement_date: parse_stored_date(TABLE, &row.statement_date)?,
            opening_balance: parse_stored_money(TABLE, &row.opening_balance)?,
            closing_balance: parse_stored_money(TABLE, &row.closing_balance)?,
            status: row
                .status
                .parse::<ReconciliationStatus>()
                .map_err(|e| corrupt(TABLE, e))?,
            completed_at: row
                .completed_at
                .as_deref()
                .map(|raw| parse_stored_timestamp(TABLE, raw))
                .transpose()?,
            created_by: row.created_by,
        };
        if !reconciliation.is_consistent() {
            return Err(corrupt(
                TABLE,
                format!("reconciliation {} has inconsistent completion", reconciliation.id),
            ));
        }
        Ok(reconciliation)
    }
}

pub async fn insert_reconciliation<'e, E: SqliteExecutor<'e>>(
    executor: E,
    reconciliation: &NewReconciliation,
) -> Result<ReconciliationId, StorageError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO bank_reconciliations (
            tenant_id, bank_account_id, statement_date, opening_balance, closing_balance,
            status, created_by
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(reconciliation.tenant_id.0)
    .bind(reconciliation.bank_account_id.0)
    .bind(date_string(reconciliation.statement_date))
    .bind(reconciliation.opening_balance.to_storage_string())
    .bind(reconciliation.closing_balance.to_storage_string())
    .bind(ReconciliationStatus::InProgress.as_str())
    .bind(&reconciliation.created_by)
    .fetch_one(executor)
    .await?;

    Ok(ReconciliationId(id))
}

pub async fn get_reconciliation<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: ReconciliationId,
) -> Result<Option<BankReconciliation>, StorageError> {
    let row = sqlx::query_as::<_, ReconciliationRow>(
        "SELECT id, tenant_id, bank_account_id, statement_date, opening_balance, \
         closing_balance, status, completed_at, created_by \
         FROM bank_reconciliations WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(executor)
    .await?;

    row.map(BankReconciliation::try_from).transpose()
}

/// Compare-and-set on the session status, stamping `completed_at` when the
/// new status is COMPLETED.
pub async fn conditional_update_reconciliation_status<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: ReconciliationId,
    expected: ReconciliationStatus,
    new: ReconciliationStatus,
    completed_at: Option<DateTime<Utc>>,
) -> Result<u64, StorageError> {
    let result = sqlx::query(
        "UPDATE bank_reconciliations SET status = ?, completed_at = ? WHERE id = ? AND status = ?",
    )
    .bind(new.as_str())
    .bind(completed_at.map(timestamp_string))
    .bind(id.0)
    .bind(expected.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::insert_bank_account;
    use crate::db::testing::test_pool;
    use ledgerlink_core::BankAccount;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn insert_get_and_complete_once() {
        let (_dir, pool) = test_pool().await;
        let account_id = insert_bank_account(&pool, &BankAccount::new(TenantId(1), "Main", "EUR"))
            .await
            .unwrap();
        let id = insert_reconciliation(
            &pool,
            &NewReconciliation {
                tenant_id: TenantId(1),
                bank_account_id: account_id,
                statement_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                opening_balance: Money::new(Decimal::new(100000, 2)),
                closing_balance: Money::new(Decimal::new(175050, 2)),
                created_by: "auditor".to_string(),
            },
        )
        .await
        .unwrap();

        let fresh = get_reconciliation(&pool, id).await.unwrap().unwrap();
        assert_eq!(fresh.status, ReconciliationStatus::InProgress);
        assert_eq!(fresh.completed_at, None);
        assert_eq!(fresh.closing_balance, Money::new(Decimal::new(175050, 2)));

        let at = Utc::now();
        let first = conditional_update_reconciliation_status(
            &pool,
            id,
            ReconciliationStatus::InProgress,
            ReconciliationStatus::Completed,
            Some(at),
        )
        .await
        .unwrap();
        let second = conditional_update_reconciliation_status(
            &pool,
            id,
            ReconciliationStatus::InProgress,
            ReconciliationStatus::Completed,
            Some(at),
        )
        .await
        .unwrap();
        assert_eq!((first, second), (1, 0));

        let done = get_reconciliation(&pool, id).await.unwrap().unwrap();
        assert_eq!(done.status, ReconciliationStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(get_reconciliation(&pool, ReconciliationId(77)).await.unwrap().is_none());
    }
}
