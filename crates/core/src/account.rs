use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BankAccountId(pub i64);

impl fmt::Display for BankAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bank account statements are imported into. Each account holds a single
/// currency; amounts on its transactions are never converted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: Option<BankAccountId>,
    pub tenant_id: TenantId,
    pub name: String,
    pub iban: Option<String>,
    pub currency: String,
}

impl BankAccount {
    pub fn new(tenant_id: TenantId, name: &str, currency: &str) -> Self {
        BankAccount {
            id: None,
            tenant_id,
            name: name.to_string(),
            iban: None,
            currency: currency.to_uppercase(),
        }
    }
}
