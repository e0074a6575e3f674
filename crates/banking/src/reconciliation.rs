use chrono::{NaiveDate, Utc};
use ledgerlink_core::{
    BankAccountId, BankReconciliation, Money, ReconciliationId, ReconciliationStatus,
    ReconciliationSummary, StateError, TransactionId,
};
use ledgerlink_storage::{self as storage, NewReconciliation};
use tracing::{info, instrument, warn};

use crate::error::BankingError;
use crate::service::BankingService;

impl BankingService {
    #[instrument(skip(self, created_by), fields(account_id = %bank_account_id))]
    pub async fn create_reconciliation(
        &self,
        bank_account_id: BankAccountId,
        statement_date: NaiveDate,
        opening_balance: Money,
        closing_balance: Money,
        created_by: &str,
    ) -> Result<BankReconciliation, BankingError> {
        let account = self.bank_account(bank_account_id).await?;
        let id = storage::insert_reconciliation(
            &self.db,
            &NewReconciliation {
                tenant_id: account.tenant_id,
                bank_account_id,
                statement_date,
                opening_balance,
                closing_balance,
                created_by: created_by.to_string(),
            },
        )
        .await?;
        info!(reconciliation_id = %id, "reconciliation started");
        self.reconciliation(id).await
    }

    pub async fn reconciliation(
        &self,
        id: ReconciliationId,
    ) -> Result<BankReconciliation, BankingError> {
        storage::get_reconciliation(&self.db, id)
            .await?
            .ok_or_else(|| StateError::ReconciliationNotFound(id).into())
    }

    /// Links MATCHED transactions of the session's account to an in-progress
    /// session. Ids that are not MATCHED or belong to another account are
    /// skipped. Returns how many were linked.
    #[instrument(skip(self, transaction_ids), fields(reconciliation_id = %reconciliation_id, requested = transaction_ids.len()))]
    pub async fn attach_transactions(
        &self,
        reconciliation_id: ReconciliationId,
        transaction_ids: &[TransactionId],
    ) -> Result<u32, BankingError> {
        let mut tx = self.db.begin().await?;
        // Writes come before any read so the transaction never has to
        // upgrade a stale snapshot.
        let mut attached: u32 = 0;
        for &transaction_id in transaction_ids {
            let changed =
                storage::attach_to_reconciliation(&mut *tx, reconciliation_id, transaction_id)
                    .await?;
            if changed == 0 {
                warn!(transaction_id = %transaction_id, "transaction not attachable");
            } else {
                attached += 1;
            }
        }
        let reconciliation = storage::get_reconciliation(&mut *tx, reconciliation_id)
            .await?
            .ok_or(StateError::ReconciliationNotFound(reconciliation_id))?;
        if reconciliation.status != ReconciliationStatus::InProgress {
            return Err(StateError::AlreadyDone(reconciliation_id).into());
        }
        tx.commit().await?;

        info!(attached, "transactions attached");
        Ok(attached)
    }

    /// IN_PROGRESS → COMPLETED, promoting every linked MATCHED transaction to
    /// RECONCILED in the same database transaction. Of two concurrent callers
    /// exactly one succeeds; the other gets `AlreadyDone`.
    #[instrument(skip(self), fields(reconciliation_id = %reconciliation_id))]
    pub async fn complete_reconciliation(
        &self,
        reconciliation_id: ReconciliationId,
    ) -> Result<BankReconciliation, BankingError> {
        let mut tx = self.db.begin().await?;
        let completed_at = Utc::now();
        // The status flip is the first statement: it takes the write lock
        // before anything is read.
        let changed = storage::conditional_update_reconciliation_status(
            &mut *tx,
            reconciliation_id,
            ReconciliationStatus::InProgress,
            ReconciliationStatus::Completed,
            Some(completed_at),
        )
        .await?;
        if changed == 0 {
            let err = match storage::get_reconciliation(&mut *tx, reconciliation_id).await? {
                None => StateError::ReconciliationNotFound(reconciliation_id),
                Some(_) => StateError::AlreadyDone(reconciliation_id),
            };
            return Err(err.into());
        }
        let promoted =
            storage::bulk_promote_reconciled_transactions(&mut *tx, reconciliation_id).await?;
        let reconciliation = storage::get_reconciliation(&mut *tx, reconciliation_id)
            .await?
            .ok_or(StateError::ReconciliationNotFound(reconciliation_id))?;
        tx.commit().await?;

        info!(promoted, "reconciliation completed");
        Ok(reconciliation)
    }

    /// Opening and closing balance against the linked MATCHED and
    /// RECONCILED transactions.
    pub async fn reconciliation_summary(
        &self,
        reconciliation_id: ReconciliationId,
    ) -> Result<ReconciliationSummary, BankingError> {
        let reconciliation = self.reconciliation(reconciliation_id).await?;
        let cleared = storage::cleared_amounts(&self.db, reconciliation_id).await?;
        Ok(ReconciliationSummary::new(&reconciliation, &cleared))
    }
}
