use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::BankAccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportId(pub i64);

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audit row written once per ingestion run, separate from the transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: ImportId,
    pub bank_account_id: BankAccountId,
    pub file_name: String,
    pub transactions_imported: u32,
    pub transactions_matched: u32,
    pub duplicates_skipped: u32,
    pub imported_at: DateTime<Utc>,
}

/// What an ingestion run reports back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub import_id: ImportId,
    pub transactions_imported: u32,
    pub transactions_matched: u32,
    pub duplicates_skipped: u32,
    pub errors: Vec<String>,
}
