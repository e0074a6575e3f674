use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::account::{BankAccountId, TenantId};
use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconciliationId(pub i64);

impl fmt::Display for ReconciliationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    InProgress,
    Completed,
}

impl ReconciliationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReconciliationStatus::InProgress => "IN_PROGRESS",
            ReconciliationStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconciliationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(ReconciliationStatus::InProgress),
            "COMPLETED" => Ok(ReconciliationStatus::Completed),
            other => Err(format!("Unknown reconciliation status: '{other}'")),
        }
    }
}

/// A dated session grouping matched transactions against one bank statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankReconciliation {
    pub id: ReconciliationId,
    pub tenant_id: TenantId,
    pub bank_account_id: BankAccountId,
    pub statement_date: NaiveDate,
    pub opening_balance: Money,
    pub closing_balance: Money,
    pub status: ReconciliationStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: String,
}

impl BankReconciliation {
    /// `completed_at` is set exactly when the session is completed.
    pub fn is_consistent(&self) -> bool {
        (self.status == ReconciliationStatus::Completed) == self.completed_at.is_some()
    }
}

/// Balance check for a session: the statement's closing balance against the
/// opening balance plus every transaction linked to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub reconciliation_id: ReconciliationId,
    pub opening_balance: Money,
    pub closing_balance: Money,
    pub cleared_total: Money,
    pub cleared_count: usize,
    pub difference: Money,
}

impl ReconciliationSummary {
    pub fn new(reconciliation: &BankReconciliation, cleared: &[Money]) -> Self {
        let cleared_total: Money = cleared.iter().copied().sum();
        ReconciliationSummary {
            reconciliation_id: reconciliation.id,
            opening_balance: reconciliation.opening_balance,
            closing_balance: reconciliation.closing_balance,
            cleared_total,
            cleared_count: cleared.len(),
            difference: reconciliation.closing_balance
                - (reconciliation.opening_balance + cleared_total),
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.difference.is_zero()
    }
}
