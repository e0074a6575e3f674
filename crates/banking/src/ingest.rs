//! Statement ingestion: parse, drop duplicates, persist, summarize.
//!
//! One run is one database transaction. The summary row is written in the
//! same transaction as the imported rows, so a reader sees either the whole
//! import or none of it. Cancelling between rows rolls the run back.

use chrono::{NaiveDate, Utc};
use ledgerlink_core::{
    BankAccountId, ImportRecord, ImportResult, Money, StateError, TransactionDraft,
};
use ledgerlink_import::import::{import_csv_detected, import_csv_with_mapping};
use ledgerlink_import::presets::GENERIC_FORMAT;
use ledgerlink_import::{
    detect_format, ColumnMapping, ParsedStatement, RowFailure, StatementLine, StatementParser,
};
use ledgerlink_storage as storage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::duplicate::{is_duplicate, DuplicateCheck, StoredTransactions};
use crate::error::BankingError;
use crate::service::BankingService;

/// Per-call ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub bank_account_id: BankAccountId,
    pub file_name: String,
    pub skip_duplicates: bool,
}

impl ImportRequest {
    pub fn new(bank_account_id: BankAccountId, file_name: &str) -> Self {
        Self {
            bank_account_id,
            file_name: file_name.to_string(),
            skip_duplicates: true,
        }
    }

    pub fn with_skip_duplicates(mut self, skip_duplicates: bool) -> Self {
        self.skip_duplicates = skip_duplicates;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreviewStatus {
    New,
    Duplicate,
    Error,
}

/// How one source row would fare if imported now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRow {
    pub row: usize,
    pub status: PreviewStatus,
    pub draft: Option<TransactionDraft>,
    pub error: Option<String>,
}

impl BankingService {
    /// An [`ImportRequest`] carrying the configured `[import]` defaults.
    pub fn import_request(&self, bank_account_id: BankAccountId, file_name: &str) -> ImportRequest {
        ImportRequest::new(bank_account_id, file_name)
            .with_skip_duplicates(self.config.import.skip_duplicates)
    }

    /// Parses a CSV export and imports it. With `format` unset the layout is
    /// detected from the header line, falling back to the configured default
    /// format; otherwise it names a configured mapping or a built-in preset.
    #[instrument(skip(self, data, cancel), fields(account_id = %request.bank_account_id, file = %request.file_name))]
    pub async fn import_csv(
        &self,
        request: &ImportRequest,
        data: &str,
        format: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ImportResult, BankingError> {
        let parsed = self.parse_csv(data, format)?;
        self.ingest(request, parsed, cancel).await
    }

    /// Imports pre-split rows through `mapping`.
    #[instrument(skip(self, rows, mapping, cancel), fields(account_id = %request.bank_account_id, rows = rows.len()))]
    pub async fn import_rows<S: AsRef<str>>(
        &self,
        request: &ImportRequest,
        rows: &[Vec<S>],
        mapping: &ColumnMapping,
        cancel: &CancellationToken,
    ) -> Result<ImportResult, BankingError> {
        let parsed = StatementParser::parse_rows(rows, mapping);
        self.ingest(request, parsed, cancel).await
    }

    /// Imports already-canonical drafts, bypassing the parser. Row numbers
    /// in errors are 1-based positions in `drafts`.
    #[instrument(skip(self, drafts, cancel), fields(account_id = %request.bank_account_id, rows = drafts.len()))]
    pub async fn import_drafts(
        &self,
        request: &ImportRequest,
        drafts: Vec<TransactionDraft>,
        cancel: &CancellationToken,
    ) -> Result<ImportResult, BankingError> {
        let parsed = ParsedStatement {
            lines: drafts
                .into_iter()
                .enumerate()
                .map(|(idx, draft)| StatementLine { row: idx + 1, draft })
                .collect(),
            failures: Vec::new(),
        };
        self.ingest(request, parsed, cancel).await
    }

    /// Classifies every row of a CSV export without writing anything. Rows
    /// repeated within the file are reported as duplicates of the earlier
    /// row, as an import would treat them.
    #[instrument(skip(self, data), fields(account_id = %bank_account_id))]
    pub async fn preview_csv(
        &self,
        bank_account_id: BankAccountId,
        data: &str,
        format: Option<&str>,
    ) -> Result<Vec<PreviewRow>, BankingError> {
        self.bank_account(bank_account_id).await?;
        let parsed = self.parse_csv(data, format)?;
        let mut conn = self.db.acquire().await?;

        let mut preview: Vec<PreviewRow> = parsed
            .failures
            .into_iter()
            .map(|failure| PreviewRow {
                row: failure.row,
                status: PreviewStatus::Error,
                draft: None,
                error: Some(failure.message),
            })
            .collect();

        let mut seen_external_ids: HashSet<String> = HashSet::new();
        let mut seen_date_amounts: HashSet<(NaiveDate, Money)> = HashSet::new();
        for StatementLine { row, draft } in parsed.lines {
            let key = (draft.transaction_date, draft.amount);
            let repeated = (!draft.external_id.is_empty()
                && seen_external_ids.contains(&draft.external_id))
                || seen_date_amounts.contains(&key);
            let checked = if repeated {
                Ok(true)
            } else {
                is_duplicate(
                    &mut conn,
                    bank_account_id,
                    draft.transaction_date,
                    draft.amount,
                    &draft.reference,
                    &draft.external_id,
                )
                .await
            };

            let (status, error) = match checked {
                Ok(true) => (PreviewStatus::Duplicate, None),
                Ok(false) => {
                    if !draft.external_id.is_empty() {
                        seen_external_ids.insert(draft.external_id.clone());
                    }
                    seen_date_amounts.insert(key);
                    (PreviewStatus::New, None)
                }
                Err(e) => (
                    PreviewStatus::Error,
                    Some(format!("duplicate check failed: {e}")),
                ),
            };
            preview.push(PreviewRow {
                row,
                status,
                draft: Some(draft),
                error,
            });
        }

        preview.sort_by_key(|p| p.row);
        Ok(preview)
    }

    pub async fn list_imports(
        &self,
        bank_account_id: BankAccountId,
    ) -> Result<Vec<ImportRecord>, BankingError> {
        Ok(storage::list_imports(&self.db, bank_account_id).await?)
    }

    fn parse_csv(&self, data: &str, format: Option<&str>) -> Result<ParsedStatement, BankingError> {
        if let Some(name) = format {
            return self.parse_with_format(data, name);
        }
        let default_format = self.config.import.default_format.as_str();
        let first_line = data
            .trim_start_matches('\u{feff}')
            .lines()
            .next()
            .unwrap_or_default();
        if detect_format(first_line).id == GENERIC_FORMAT && default_format != GENERIC_FORMAT {
            debug!(format = default_format, "header not recognised, using default format");
            return self.parse_with_format(data, default_format);
        }
        let (detected, parsed) = import_csv_detected(data)?;
        debug!(format = detected.id, "detected statement format");
        Ok(parsed)
    }

    fn parse_with_format(&self, data: &str, name: &str) -> Result<ParsedStatement, BankingError> {
        let mapping = self
            .config
            .import
            .mapping(name)
            .ok_or_else(|| BankingError::UnknownFormat(name.to_string()))?;
        Ok(import_csv_with_mapping(data.as_bytes(), &mapping)?)
    }

    async fn ingest(
        &self,
        request: &ImportRequest,
        parsed: ParsedStatement,
        cancel: &CancellationToken,
    ) -> Result<ImportResult, BankingError> {
        self.ingest_lines(request, parsed.lines, parsed.failures, &StoredTransactions, cancel)
            .await
    }

    async fn ingest_lines<L, D>(
        &self,
        request: &ImportRequest,
        lines: L,
        mut failures: Vec<RowFailure>,
        duplicate_check: &D,
        cancel: &CancellationToken,
    ) -> Result<ImportResult, BankingError>
    where
        L: IntoIterator<Item = StatementLine>,
        D: DuplicateCheck,
    {
        let account_id = request.bank_account_id;
        let mut tx = self.db.begin().await?;
        let account = storage::find_account_by_id(&mut *tx, account_id)
            .await?
            .ok_or(StateError::AccountNotFound(account_id))?;

        let mut imported: u32 = 0;
        let mut duplicates: u32 = 0;

        for StatementLine { row, draft } in lines {
            if cancel.is_cancelled() {
                warn!(row, imported, "import cancelled, rolling back");
                return Err(BankingError::Cancelled);
            }

            if request.skip_duplicates {
                match duplicate_check.is_recorded(&mut tx, account_id, &draft).await {
                    Ok(true) => {
                        debug!(row, "skipping duplicate");
                        duplicates += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(row, error = %e, "duplicate check failed");
                        failures.push(RowFailure {
                            row,
                            message: format!("duplicate check failed: {e}"),
                        });
                        continue;
                    }
                }
            }

            storage::insert_transaction(
                &mut *tx,
                account.tenant_id,
                account_id,
                &account.currency,
                &draft,
            )
            .await?;
            imported += 1;
        }

        let import_id = storage::insert_import_summary(
            &mut *tx,
            account_id,
            &request.file_name,
            imported,
            duplicates,
            Utc::now(),
        )
        .await?;
        tx.commit().await?;

        failures.sort_by_key(|f| f.row);
        for failure in &failures {
            warn!(row = failure.row, reason = %failure.message, "row rejected");
        }
        info!(
            import_id = %import_id,
            imported,
            duplicates,
            errors = failures.len(),
            "statement imported"
        );

        Ok(ImportResult {
            import_id,
            transactions_imported: imported,
            transactions_matched: 0,
            duplicates_skipped: duplicates,
            errors: failures.iter().map(ToString::to_string).collect(),
        })
    }
}
