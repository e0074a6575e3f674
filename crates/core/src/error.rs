use thiserror::Error;

use crate::account::BankAccountId;
use crate::reconciliation::ReconciliationId;
use crate::transaction::{TransactionId, TransactionStatus};

/// Precondition failures of the transaction and reconciliation lifecycles.
///
/// These are never retried: they mean the caller acted on a stale view or
/// lost a race against a concurrent update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Transaction {0} is already {1}")]
    AlreadyMatched(TransactionId, TransactionStatus),
    #[error("Transaction {0} is not matched (status {1})")]
    NotMatched(TransactionId, TransactionStatus),
    #[error("Reconciliation {0} is already completed")]
    AlreadyDone(ReconciliationId),
    #[error("Bank account not found: {0}")]
    AccountNotFound(BankAccountId),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),
    #[error("Reconciliation not found: {0}")]
    ReconciliationNotFound(ReconciliationId),
}
