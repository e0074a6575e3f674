use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::account::{BankAccountId, TenantId};
use super::error::StateError;
use super::money::Money;
use super::payment::PaymentId;
use super::reconciliation::ReconciliationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an imported bank transaction.
///
/// ```text
/// Unmatched --match--> Matched --complete reconciliation--> Reconciled
///     ^                   |
///     +-----unmatch-------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Unmatched,
    Matched,
    Reconciled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Unmatched => "UNMATCHED",
            TransactionStatus::Matched => "MATCHED",
            TransactionStatus::Reconciled => "RECONCILED",
        }
    }

    /// Whether a transaction in this status must carry a matched payment.
    pub fn requires_payment(self) -> bool {
        match self {
            TransactionStatus::Unmatched => false,
            TransactionStatus::Matched | TransactionStatus::Reconciled => true,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNMATCHED" => Ok(TransactionStatus::Unmatched),
            "MATCHED" => Ok(TransactionStatus::Matched),
            "RECONCILED" => Ok(TransactionStatus::Reconciled),
            other => Err(format!("Unknown transaction status: '{other}'")),
        }
    }
}

/// A parsed statement line that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub transaction_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub amount: Money,
    pub description: String,
    pub reference: String,
    pub counterparty_name: String,
    pub counterparty_account: String,
    pub external_id: String,
}

impl TransactionDraft {
    pub fn new(transaction_date: NaiveDate, amount: Money, description: &str) -> Self {
        TransactionDraft {
            transaction_date,
            value_date: None,
            amount,
            description: description.to_string(),
            reference: String::new(),
            counterparty_name: String::new(),
            counterparty_account: String::new(),
            external_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: TransactionId,
    pub tenant_id: TenantId,
    pub bank_account_id: BankAccountId,
    pub transaction_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub reference: String,
    pub counterparty_name: String,
    pub counterparty_account: String,
    pub external_id: String,
    pub status: TransactionStatus,
    pub matched_payment_id: Option<PaymentId>,
    pub reconciliation_id: Option<ReconciliationId>,
}

impl BankTransaction {
    /// `matched_payment_id` is set exactly when the status requires one.
    pub fn is_consistent(&self) -> bool {
        self.status.requires_payment() == self.matched_payment_id.is_some()
    }

    pub fn match_payment(&mut self, payment_id: PaymentId) -> Result<(), StateError> {
        if self.status != TransactionStatus::Unmatched {
            return Err(StateError::AlreadyMatched(self.id, self.status));
        }
        self.status = TransactionStatus::Matched;
        self.matched_payment_id = Some(payment_id);
        Ok(())
    }

    /// Back to UNMATCHED. Any link to an open reconciliation goes with it.
    pub fn unmatch(&mut self) -> Result<(), StateError> {
        if self.status != TransactionStatus::Matched {
            return Err(StateError::NotMatched(self.id, self.status));
        }
        self.status = TransactionStatus::Unmatched;
        self.matched_payment_id = None;
        self.reconciliation_id = None;
        Ok(())
    }
}
