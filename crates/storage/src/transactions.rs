use chrono::NaiveDate;
use ledgerlink_core::{
    BankAccountId, BankTransaction, DateRange, Money, PaymentId, ReconciliationId, TenantId,
    TransactionDraft, TransactionId, TransactionStatus,
};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};

use crate::db::{corrupt, date_string, parse_stored_date, parse_stored_money, StorageError};

const TABLE: &str = "bank_transactions";

const COLUMNS: &str = "id, tenant_id, bank_account_id, transaction_date, value_date, amount, \
    currency, description, reference, counterparty_name, counterparty_account, external_id, \
    status, matched_payment_id, reconciliation_id";

/// Inclusive bounds on the absolute amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Money,
    pub max: Money,
}

impl AmountRange {
    pub fn new(min: Money, max: Money) -> Self {
        let (min, max) = (min.abs(), max.abs());
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn contains(&self, amount: Money) -> bool {
        let amount = amount.abs();
        amount >= self.min && amount <= self.max
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionFilter {
    pub bank_account_id: Option<BankAccountId>,
    pub status: Option<TransactionStatus>,
    pub date_range: Option<DateRange>,
    pub amount_range: Option<AmountRange>,
}

impl TransactionFilter {
    pub fn for_account(bank_account_id: BankAccountId) -> Self {
        Self {
            bank_account_id: Some(bank_account_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_amount_range(mut self, range: AmountRange) -> Self {
        self.amount_range = Some(range);
        self
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    tenant_id: i64,
    bank_account_id: i64,
    transaction_date: String,
    value_date: Option<String>,
    amount: String,
    currency: String,
    description: String,
    reference: String,
    counterparty_name: String,
    counterparty_account: String,
    external_id: String,
    status: String,
    matched_payment_id: Option<i64>,
    reconciliation_id: Option<i64>,
}

impl TryFrom<TransactionRow> for BankTransaction {
    type Error = StorageError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TransactionStatus>()
            .map_err(|e| corrupt(TABLE, e))?;
        let value_date = row
            .value_date
            .as_deref()
            .map(|raw| parse_stored_date(TABLE, raw))
            .transpose()?;

        let txn = BankTransaction {
            id: TransactionId(row.id),
            tenant_id: TenantId(row.tenant_id),
            bank_account_id: BankAccountId(row.bank_account_id),
            transaction_date: parse_stored_date(TABLE, &row.transaction_date)?,
            value_date,
            amount: parse_stored_money(TABLE, &row.amount)?,
            currency: row.currency,
            description: row.description,
            reference: row.reference,
            counterparty_name: row.counterparty_name,
            counterparty_account: row.counterparty_account,
            external_id: row.external_id,
            status,
            matched_payment_id: row.matched_payment_id.map(PaymentId),
            reconciliation_id: row.reconciliation_id.map(ReconciliationId),
        };
        if !txn.is_consistent() {
            return Err(corrupt(
                TABLE,
                format!("transaction {} is {} with payment {:?}", txn.id, txn.status, txn.matched_payment_id),
            ));
        }
        Ok(txn)
    }
}

pub async fn insert_transaction<'e, E: SqliteExecutor<'e>>(
    executor: E,
    tenant_id: TenantId,
    bank_account_id: BankAccountId,
    currency: &str,
    draft: &TransactionDraft,
) -> Result<TransactionId, StorageError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO bank_transactions (
            tenant_id, bank_account_id, transaction_date, value_date, amount, currency,
            description, reference, counterparty_name, counterparty_account, external_id, status
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(tenant_id.0)
    .bind(bank_account_id.0)
    .bind(date_string(draft.transaction_date))
    .bind(draft.value_date.map(date_string))
    .bind(draft.amount.to_storage_string())
    .bind(currency)
    .bind(&draft.description)
    .bind(&draft.reference)
    .bind(&draft.counterparty_name)
    .bind(&draft.counterparty_account)
    .bind(&draft.external_id)
    .bind(TransactionStatus::Unmatched.as_str())
    .fetch_one(executor)
    .await?;

    Ok(TransactionId(id))
}

pub async fn get_transaction<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: TransactionId,
) -> Result<Option<BankTransaction>, StorageError> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {COLUMNS} FROM bank_transactions WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(executor)
    .await?;

    row.map(BankTransaction::try_from).transpose()
}

/// Transactions in date order. The amount range is applied after decoding so
/// comparisons stay in exact decimal arithmetic.
pub async fn list_transactions<'e, E: SqliteExecutor<'e>>(
    executor: E,
    filter: &TransactionFilter,
) -> Result<Vec<BankTransaction>, StorageError> {
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {COLUMNS} FROM bank_transactions WHERE 1 = 1"
    ));
    if let Some(account) = filter.bank_account_id {
        query.push(" AND bank_account_id = ").push_bind(account.0);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(range) = filter.date_range {
        query
            .push(" AND transaction_date BETWEEN ")
            .push_bind(date_string(range.start))
            .push(" AND ")
            .push_bind(date_string(range.end));
    }
    query.push(" ORDER BY transaction_date, id");

    let rows = query
        .build_query_as::<TransactionRow>()
        .fetch_all(executor)
        .await?;

    let mut transactions = Vec::with_capacity(rows.len());
    for row in rows {
        let txn = BankTransaction::try_from(row)?;
        if filter.amount_range.map_or(true, |range| range.contains(txn.amount)) {
            transactions.push(txn);
        }
    }
    Ok(transactions)
}

pub async fn external_id_exists<'e, E: SqliteExecutor<'e>>(
    executor: E,
    bank_account_id: BankAccountId,
    external_id: &str,
) -> Result<bool, StorageError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM bank_transactions WHERE bank_account_id = ? AND external_id = ?)",
    )
    .bind(bank_account_id.0)
    .bind(external_id)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

pub async fn date_amount_exists<'e, E: SqliteExecutor<'e>>(
    executor: E,
    bank_account_id: BankAccountId,
    date: NaiveDate,
    amount: Money,
) -> Result<bool, StorageError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM bank_transactions \
         WHERE bank_account_id = ? AND transaction_date = ? AND amount = ?)",
    )
    .bind(bank_account_id.0)
    .bind(date_string(date))
    .bind(amount.to_storage_string())
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

/// Compare-and-set on status. Returns the number of rows changed, which is
/// zero when the transaction is missing or no longer in `expected`.
/// Moving back to UNMATCHED also drops any reconciliation link.
pub async fn conditional_update_transaction_status<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: TransactionId,
    expected: TransactionStatus,
    new: TransactionStatus,
    matched_payment_id: Option<PaymentId>,
) -> Result<u64, StorageError> {
    let result = sqlx::query(
        r#"
        UPDATE bank_transactions
        SET status = ?,
            matched_payment_id = ?,
            reconciliation_id = CASE WHEN ? = 'UNMATCHED' THEN NULL ELSE reconciliation_id END
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(new.as_str())
    .bind(matched_payment_id.map(|p| p.0))
    .bind(new.as_str())
    .bind(id.0)
    .bind(expected.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Links a MATCHED transaction to an in-progress reconciliation of the same
/// bank account. Returns zero when any of those conditions fails.
pub async fn attach_to_reconciliation<'e, E: SqliteExecutor<'e>>(
    executor: E,
    reconciliation_id: ReconciliationId,
    transaction_id: TransactionId,
) -> Result<u64, StorageError> {
    let result = sqlx::query(
        r#"
        UPDATE bank_transactions
        SET reconciliation_id = ?
        WHERE id = ?
          AND status = 'MATCHED'
          AND bank_account_id = (
              SELECT bank_account_id FROM bank_reconciliations
              WHERE id = ? AND status = 'IN_PROGRESS'
          )
        "#,
    )
    .bind(reconciliation_id.0)
    .bind(transaction_id.0)
    .bind(reconciliation_id.0)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn bulk_promote_reconciled_transactions<'e, E: SqliteExecutor<'e>>(
    executor: E,
    reconciliation_id: ReconciliationId,
) -> Result<u64, StorageError> {
    let result = sqlx::query(
        "UPDATE bank_transactions SET status = 'RECONCILED' \
         WHERE reconciliation_id = ? AND status = 'MATCHED'",
    )
    .bind(reconciliation_id.0)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Amounts of the MATCHED and RECONCILED transactions linked to a session.
pub async fn cleared_amounts<'e, E: SqliteExecutor<'e>>(
    executor: E,
    reconciliation_id: ReconciliationId,
) -> Result<Vec<Money>, StorageError> {
    let amounts = sqlx::query_scalar::<_, String>(
        "SELECT amount FROM bank_transactions \
         WHERE reconciliation_id = ? AND status IN ('MATCHED', 'RECONCILED') ORDER BY id",
    )
    .bind(reconciliation_id.0)
    .fetch_all(executor)
    .await?;

    amounts
        .iter()
        .map(|raw| parse_stored_money(TABLE, raw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::insert_bank_account;
    use crate::db::testing::test_pool;
    use crate::db::DbPool;
    use crate::payments::{insert_payment, NewPayment};
    use ledgerlink_core::BankAccount;
    use rust_decimal::Decimal;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn money(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2))
    }

    async fn account(pool: &DbPool) -> BankAccountId {
        insert_bank_account(pool, &BankAccount::new(TenantId(1), "Main", "EUR"))
            .await
            .unwrap()
    }

    async fn payment(pool: &DbPool) -> PaymentId {
        insert_payment(
            pool,
            &NewPayment {
                tenant_id: TenantId(1),
                number: "PAY-1".to_string(),
                date: day(1),
                amount: money(100),
                contact_name: String::new(),
                reference: String::new(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let (_dir, pool) = test_pool().await;
        let account_id = account(&pool).await;
        let mut draft = TransactionDraft::new(day(15), money(25050), "Interest Income");
        draft.value_date = Some(day(16));
        draft.external_id = "ARCH-1".to_string();

        let id = insert_transaction(&pool, TenantId(1), account_id, "EUR", &draft)
            .await
            .unwrap();
        let txn = get_transaction(&pool, id).await.unwrap().unwrap();
        assert_eq!(txn.amount, money(25050));
        assert_eq!(txn.value_date, Some(day(16)));
        assert_eq!(txn.status, TransactionStatus::Unmatched);
        assert_eq!(txn.matched_payment_id, None);
        assert_eq!(txn.external_id, "ARCH-1");
        assert!(get_transaction(&pool, TransactionId(404)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn existence_probes_use_exact_amounts() {
        let (_dir, pool) = test_pool().await;
        let account_id = account(&pool).await;
        let mut draft = TransactionDraft::new(day(15), money(25050), "x");
        draft.external_id = "E-1".to_string();
        insert_transaction(&pool, TenantId(1), account_id, "EUR", &draft)
            .await
            .unwrap();

        assert!(external_id_exists(&pool, account_id, "E-1").await.unwrap());
        assert!(!external_id_exists(&pool, account_id, "E-2").await.unwrap());
        // 250.500 normalizes to the stored 250.5
        let same = Money::new(Decimal::new(250500, 3));
        assert!(date_amount_exists(&pool, account_id, day(15), same).await.unwrap());
        assert!(!date_amount_exists(&pool, account_id, day(15), money(25051)).await.unwrap());
        assert!(!date_amount_exists(&pool, account_id, day(16), money(25050)).await.unwrap());
        assert!(!date_amount_exists(&pool, BankAccountId(99), day(15), money(25050))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn conditional_update_is_compare_and_set() {
        let (_dir, pool) = test_pool().await;
        let account_id = account(&pool).await;
        let payment_id = payment(&pool).await;
        let id = insert_transaction(
            &pool,
            TenantId(1),
            account_id,
            "EUR",
            &TransactionDraft::new(day(2), money(100), "x"),
        )
        .await
        .unwrap();

        let changed = conditional_update_transaction_status(
            &pool,
            id,
            TransactionStatus::Unmatched,
            TransactionStatus::Matched,
            Some(payment_id),
        )
        .await
        .unwrap();
        assert_eq!(changed, 1);

        let again = conditional_update_transaction_status(
            &pool,
            id,
            TransactionStatus::Unmatched,
            TransactionStatus::Matched,
            Some(payment_id),
        )
        .await
        .unwrap();
        assert_eq!(again, 0);

        let txn = get_transaction(&pool, id).await.unwrap().unwrap();
        assert_eq!(txn.status, TransactionStatus::Matched);
        assert_eq!(txn.matched_payment_id, Some(payment_id));
    }

    #[tokio::test]
    async fn list_applies_every_filter() {
        let (_dir, pool) = test_pool().await;
        let account_id = account(&pool).await;
        let other = account(&pool).await;
        for (d, cents) in [(15, 100000), (16, -50000), (17, 25050)] {
            insert_transaction(
                &pool,
                TenantId(1),
                account_id,
                "EUR",
                &TransactionDraft::new(day(d), money(cents), "row"),
            )
            .await
            .unwrap();
        }
        insert_transaction(
            &pool,
            TenantId(1),
            other,
            "EUR",
            &TransactionDraft::new(day(15), money(100), "other"),
        )
        .await
        .unwrap();

        let all = list_transactions(&pool, &TransactionFilter::for_account(account_id))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].transaction_date <= w[1].transaction_date));

        let dated = list_transactions(
            &pool,
            &TransactionFilter::for_account(account_id)
                .with_date_range(DateRange::new(day(16), day(17))),
        )
        .await
        .unwrap();
        assert_eq!(dated.len(), 2);

        // absolute amount: -500.00 is inside 400..600
        let sized = list_transactions(
            &pool,
            &TransactionFilter::for_account(account_id)
                .with_amount_range(AmountRange::new(money(40000), money(60000))),
        )
        .await
        .unwrap();
        assert_eq!(sized.len(), 1);
        assert_eq!(sized[0].amount, money(-50000));

        let matched = list_transactions(
            &pool,
            &TransactionFilter::default().with_status(TransactionStatus::Matched),
        )
        .await
        .unwrap();
        assert!(matched.is_empty());
        assert_eq!(
            list_transactions(&pool, &TransactionFilter::default()).await.unwrap().len(),
            4
        );
    }

    #[test]
    fn amount_range_orders_bounds() {
        let range = AmountRange::new(money(-500), money(100));
        assert_eq!(range.min, money(100));
        assert_eq!(range.max, money(500));
        assert!(range.contains(money(-300)));
        assert!(!range.contains(money(501)));
    }
}
