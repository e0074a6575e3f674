use ledgerlink_core::{
    BankAccountId, BankTransaction, PaymentId, StateError, TransactionId, TransactionStatus,
};
use ledgerlink_import::{
    AutoMatchDecision, AutoMatchPolicy, CandidateMatcher, MatchSuggestion, MatchableTransaction,
};
use ledgerlink_storage::{self as storage, TransactionFilter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::BankingError;
use crate::service::BankingService;

impl BankingService {
    /// Ranked candidate payments for one transaction, best first, at most
    /// `suggestion_limit` of them.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn suggest_matches(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<MatchSuggestion>, BankingError> {
        let txn = self.transaction(transaction_id).await?;
        let candidates = storage::find_unallocated_payments(
            &self.db,
            txn.tenant_id,
            txn.amount,
            self.config.auto_match.candidate_limit,
        )
        .await?;
        let suggestions = self.matcher().suggest(
            &MatchableTransaction::from(&txn),
            &candidates,
            self.config.auto_match.suggestion_limit,
        );
        debug!(candidates = candidates.len(), suggestions = suggestions.len(), "scored candidates");
        Ok(suggestions)
    }

    /// UNMATCHED → MATCHED. The status is re-read and then changed with a
    /// compare-and-set, so of two concurrent callers only one succeeds.
    #[instrument(skip(self), fields(transaction_id = %transaction_id, payment_id = %payment_id))]
    pub async fn match_transaction(
        &self,
        transaction_id: TransactionId,
        payment_id: PaymentId,
    ) -> Result<BankTransaction, BankingError> {
        let mut conn = self.db.acquire().await?;
        let mut txn = storage::get_transaction(&mut *conn, transaction_id)
            .await?
            .ok_or(StateError::TransactionNotFound(transaction_id))?;
        txn.match_payment(payment_id)?;

        let changed = storage::conditional_update_transaction_status(
            &mut *conn,
            transaction_id,
            TransactionStatus::Unmatched,
            TransactionStatus::Matched,
            Some(payment_id),
        )
        .await?;
        if changed == 0 {
            let current = current_status(&mut conn, transaction_id).await?;
            return Err(StateError::AlreadyMatched(transaction_id, current).into());
        }

        info!("transaction matched");
        Ok(txn)
    }

    /// MATCHED → UNMATCHED, clearing the payment and any open reconciliation
    /// link.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn unmatch_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<BankTransaction, BankingError> {
        let mut conn = self.db.acquire().await?;
        let mut txn = storage::get_transaction(&mut *conn, transaction_id)
            .await?
            .ok_or(StateError::TransactionNotFound(transaction_id))?;
        txn.unmatch()?;

        let changed = storage::conditional_update_transaction_status(
            &mut *conn,
            transaction_id,
            TransactionStatus::Matched,
            TransactionStatus::Unmatched,
            None,
        )
        .await?;
        if changed == 0 {
            let current = current_status(&mut conn, transaction_id).await?;
            return Err(StateError::NotMatched(transaction_id, current).into());
        }

        info!("transaction unmatched");
        Ok(txn)
    }

    /// Matches every UNMATCHED transaction of the account whose best
    /// candidate reaches `min_confidence` and clearly beats the runner-up.
    /// Each match commits on its own; a failing transaction is logged and
    /// skipped. Cancelling stops before the next transaction and returns the
    /// count so far.
    #[instrument(skip(self, cancel), fields(account_id = %bank_account_id))]
    pub async fn auto_match(
        &self,
        bank_account_id: BankAccountId,
        min_confidence: f64,
        cancel: &CancellationToken,
    ) -> Result<u32, BankingError> {
        self.bank_account(bank_account_id).await?;
        let unmatched = storage::list_transactions(
            &self.db,
            &TransactionFilter::for_account(bank_account_id).with_status(TransactionStatus::Unmatched),
        )
        .await?;

        let matched = self.auto_match_transactions(&unmatched, min_confidence, cancel).await;
        if matched > 0 {
            if let Err(e) =
                storage::increment_import_matched_count(&self.db, bank_account_id, matched).await
            {
                warn!(error = %e, "could not update import matched count");
            }
        }

        info!(candidates = unmatched.len(), matched, "auto-match finished");
        Ok(matched)
    }

    async fn auto_match_transactions(
        &self,
        transactions: &[BankTransaction],
        min_confidence: f64,
        cancel: &CancellationToken,
    ) -> u32 {
        let matcher = CandidateMatcher::new(
            self.config.matcher.clone().with_min_confidence(min_confidence),
        );
        let policy = AutoMatchPolicy::new(min_confidence, &self.config.auto_match);

        let mut matched: u32 = 0;
        for txn in transactions {
            if cancel.is_cancelled() {
                info!(matched, "auto-match cancelled");
                break;
            }
            match self.auto_match_one(&matcher, &policy, txn).await {
                Ok(true) => matched += 1,
                Ok(false) => {}
                Err(e) => warn!(transaction_id = %txn.id, error = %e, "auto-match skipped transaction"),
            }
        }
        matched
    }

    async fn auto_match_one(
        &self,
        matcher: &CandidateMatcher,
        policy: &AutoMatchPolicy,
        txn: &BankTransaction,
    ) -> Result<bool, BankingError> {
        let candidates = storage::find_unallocated_payments(
            &self.db,
            txn.tenant_id,
            txn.amount,
            self.config.auto_match.candidate_limit,
        )
        .await?;
        let suggestions = matcher.score(&MatchableTransaction::from(txn), &candidates);

        match policy.decide(suggestions) {
            AutoMatchDecision::Apply(best) => {
                self.match_transaction(txn.id, best.payment_id).await?;
                debug!(transaction_id = %txn.id, confidence = best.confidence, reason = %best.match_reason, "auto-matched");
                Ok(true)
            }
            AutoMatchDecision::Ambiguous { best, runner_up } => {
                debug!(transaction_id = %txn.id, best, runner_up, "ambiguous candidates");
                Ok(false)
            }
            AutoMatchDecision::BelowThreshold { best } => {
                debug!(transaction_id = %txn.id, best, "best candidate below threshold");
                Ok(false)
            }
            AutoMatchDecision::NoCandidate => Ok(false),
        }
    }
}

async fn current_status(
    conn: &mut sqlx::SqliteConnection,
    transaction_id: TransactionId,
) -> Result<TransactionStatus, BankingError> {
    storage::get_transaction(conn, transaction_id)
        .await?
        .map(|t| t.status)
        .ok_or_else(|| StateError::TransactionNotFound(transaction_id).into())
}
