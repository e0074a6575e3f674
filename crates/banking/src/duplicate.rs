use chrono::NaiveDate;
use ledgerlink_core::{BankAccountId, Money, TransactionDraft};
use ledgerlink_storage::{self as storage, StorageError};
use sqlx::SqliteConnection;

/// Whether a row is a re-import of something already recorded for the
/// account, as seen from `conn`. Pass the ingestion transaction so rows
/// inserted earlier in the same run count.
///
/// A matching non-empty external id decides on its own. Otherwise the same
/// date and amount is enough; `reference` does not narrow the match.
pub async fn is_duplicate(
    conn: &mut SqliteConnection,
    bank_account_id: BankAccountId,
    date: NaiveDate,
    amount: Money,
    _reference: &str,
    external_id: &str,
) -> Result<bool, StorageError> {
    if !external_id.is_empty()
        && storage::external_id_exists(&mut *conn, bank_account_id, external_id).await?
    {
        return Ok(true);
    }
    storage::date_amount_exists(&mut *conn, bank_account_id, date, amount).await
}

/// How ingestion decides that a draft is already recorded for an account.
pub(crate) trait DuplicateCheck {
    async fn is_recorded(
        &self,
        conn: &mut SqliteConnection,
        bank_account_id: BankAccountId,
        draft: &TransactionDraft,
    ) -> Result<bool, StorageError>;
}

/// [`is_duplicate`] against the stored transactions.
pub(crate) struct StoredTransactions;

impl DuplicateCheck for StoredTransactions {
    async fn is_recorded(
        &self,
        conn: &mut SqliteConnection,
        bank_account_id: BankAccountId,
        draft: &TransactionDraft,
    ) -> Result<bool, StorageError> {
        is_duplicate(
            conn,
            bank_account_id,
            draft.transaction_date,
            draft.amount,
            &draft.reference,
            &draft.external_id,
        )
        .await
    }
}
