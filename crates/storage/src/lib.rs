pub mod accounts;
pub mod db;
pub mod imports;
pub mod payments;
pub mod reconciliations;
pub mod transactions;

pub use accounts::{currency_of, find_account_by_id, insert_bank_account};
pub use db::{create_db, open_db, DbPool, StorageError, StorageOptions};
pub use imports::{increment_import_matched_count, insert_import_summary, list_imports};
pub use payments::{find_unallocated_payments, insert_allocation, insert_payment, NewPayment};
pub use reconciliations::{
    conditional_update_reconciliation_status, get_reconciliation, insert_reconciliation,
    NewReconciliation,
};
pub use transactions::{
    attach_to_reconciliation, bulk_promote_reconciled_transactions, cleared_amounts,
    conditional_update_transaction_status, date_amount_exists, external_id_exists,
    get_transaction, insert_transaction, list_transactions, AmountRange, TransactionFilter,
};
