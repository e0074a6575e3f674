use ledgerlink_core::{BankAccount, BankAccountId, BankTransaction, StateError, TransactionId};
use ledgerlink_import::CandidateMatcher;
use ledgerlink_storage::{self as storage, DbPool, TransactionFilter};
use tracing::info;

use crate::config::BankingConfig;
use crate::error::BankingError;

/// Entry point for bank statement import, matching and reconciliation.
/// Holds no state besides the pool and configuration; every call re-reads
/// what it acts on.
#[derive(Debug, Clone)]
pub struct BankingService {
    pub(crate) db: DbPool,
    pub(crate) config: BankingConfig,
}

impl BankingService {
    pub fn new(db: DbPool, config: BankingConfig) -> Self {
        Self { db, config }
    }

    /// Validates `config` and opens the database it names.
    pub async fn open(config: BankingConfig) -> Result<Self, BankingError> {
        config.validate()?;
        let db = storage::open_db(&config.storage).await?;
        info!(path = %config.storage.path.display(), "banking service ready");
        Ok(Self::new(db, config))
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn config(&self) -> &BankingConfig {
        &self.config
    }

    pub(crate) fn matcher(&self) -> CandidateMatcher {
        CandidateMatcher::new(self.config.matcher.clone())
    }

    pub async fn create_bank_account(&self, account: &BankAccount) -> Result<BankAccount, BankingError> {
        let id = storage::insert_bank_account(&self.db, account).await?;
        info!(account_id = %id, tenant_id = %account.tenant_id, "bank account created");
        Ok(BankAccount {
            id: Some(id),
            ..account.clone()
        })
    }

    pub async fn bank_account(&self, id: BankAccountId) -> Result<BankAccount, BankingError> {
        storage::find_account_by_id(&self.db, id)
            .await?
            .ok_or_else(|| StateError::AccountNotFound(id).into())
    }

    pub async fn transaction(&self, id: TransactionId) -> Result<BankTransaction, BankingError> {
        storage::get_transaction(&self.db, id)
            .await?
            .ok_or_else(|| StateError::TransactionNotFound(id).into())
    }

    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<BankTransaction>, BankingError> {
        Ok(storage::list_transactions(&self.db, filter).await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::NaiveDate;
    use ledgerlink_core::{Money, PaymentId, TenantId};
    use ledgerlink_storage::NewPayment;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tempfile::TempDir;

    pub const TENANT: TenantId = TenantId(1);

    pub struct Fixture {
        pub service: BankingService,
        pub account_id: BankAccountId,
        _dir: TempDir,
    }

    pub async fn fixture() -> Fixture {
        fixture_with(BankingConfig::default()).await
    }

    pub async fn fixture_with(mut config: BankingConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        config.storage.path = dir.path().join("banking.db");
        let service = BankingService::open(config).await.unwrap();
        let account = service
            .create_bank_account(&BankAccount::new(TENANT, "Operating", "EUR"))
            .await
            .unwrap();
        Fixture {
            service,
            account_id: account.id.unwrap(),
            _dir: dir,
        }
    }

    pub fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    pub fn money(s: &str) -> Money {
        Money::new(Decimal::from_str(s).unwrap())
    }

    pub async fn add_payment(
        service: &BankingService,
        number: &str,
        date: NaiveDate,
        amount: &str,
        contact_name: &str,
        reference: &str,
    ) -> PaymentId {
        storage::insert_payment(
            service.db(),
            &NewPayment {
                tenant_id: TENANT,
                number: number.to_string(),
                date,
                amount: money(amount),
                contact_name: contact_name.to_string(),
                reference: reference.to_string(),
            },
        )
        .await
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn missing_records_are_typed() {
        let fx = fixture().await;
        let account = fx.service.bank_account(fx.account_id).await.unwrap();
        assert_eq!(account.currency, "EUR");

        let err = fx.service.bank_account(BankAccountId(404)).await.unwrap_err();
        assert_eq!(
            err.as_state(),
            Some(&StateError::AccountNotFound(BankAccountId(404)))
        );
        let err = fx.service.transaction(TransactionId(9)).await.unwrap_err();
        assert_eq!(
            err.as_state(),
            Some(&StateError::TransactionNotFound(TransactionId(9)))
        );
    }
}
