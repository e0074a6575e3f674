pub mod account;
pub mod error;
pub mod import_log;
pub mod money;
pub mod payment;
pub mod period;
pub mod reconciliation;
pub mod transaction;

pub use account::{BankAccount, BankAccountId, TenantId};
pub use error::StateError;
pub use import_log::{ImportId, ImportRecord, ImportResult};
pub use money::Money;
pub use payment::{PaymentForMatching, PaymentId};
pub use period::DateRange;
pub use reconciliation::{
    BankReconciliation, ReconciliationId, ReconciliationStatus, ReconciliationSummary,
};
pub use transaction::{BankTransaction, TransactionDraft, TransactionId, TransactionStatus};
