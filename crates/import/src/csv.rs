use ledgerlink_core::{Money, TransactionDraft};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use thiserror::Error;

use crate::normalize::{self, NormalizeError};

/// Where each canonical field lives in a statement row. Column indices are
/// zero-based; `None` marks a column the export does not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub date_column: usize,
    pub value_date_column: Option<usize>,
    pub amount_column: usize,
    pub description_column: Option<usize>,
    pub reference_column: Option<usize>,
    pub counterparty_name_column: Option<usize>,
    pub counterparty_account_column: Option<usize>,
    pub external_id_column: Option<usize>,
    /// Cell holding a `D`/`K` (or `D`/`C`) marker for exports that print
    /// unsigned amounts.
    pub debit_credit_column: Option<usize>,
    pub date_format: String,
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
    pub delimiter: char,
    pub has_header: bool,
    /// Rows dropped before the header (bank banners, account info).
    pub skip_rows: usize,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date_column: 0,
            value_date_column: None,
            amount_column: 1,
            description_column: Some(2),
            reference_column: None,
            counterparty_name_column: None,
            counterparty_account_column: None,
            external_id_column: None,
            debit_credit_column: None,
            date_format: "%Y-%m-%d".to_string(),
            decimal_separator: '.',
            thousands_separator: Some(','),
            delimiter: ',',
            has_header: false,
            skip_rows: 0,
        }
    }
}

impl ColumnMapping {
    /// `date, amount, description` with ISO dates and no header row.
    pub fn generic() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    /// Number of leading rows that never carry data.
    pub fn leading_rows(&self) -> usize {
        self.skip_rows + usize::from(self.has_header)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("Missing {field} column (index {index})")]
    MissingColumn { field: &'static str, index: usize },
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("Unreadable row: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Delimiter must be a single-byte character, got {0:?}")]
    InvalidDelimiter(char),
}

/// A draft together with its 1-based row number in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementLine {
    pub row: usize,
    pub draft: TransactionDraft,
}

/// A rejected row and the reason, rendered as `Row {row}: {message}`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

/// Outcome of parsing one statement: valid lines and rejected rows, both in
/// source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStatement {
    pub lines: Vec<StatementLine>,
    pub failures: Vec<RowFailure>,
}

impl ParsedStatement {
    pub fn errors(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    fn push(&mut self, row: usize, outcome: Result<TransactionDraft, RowError>) {
        match outcome {
            Ok(draft) => self.lines.push(StatementLine { row, draft }),
            Err(e) => self.failures.push(RowFailure {
                row,
                message: e.to_string(),
            }),
        }
    }
}

pub struct StatementParser;

impl StatementParser {
    /// Parses pre-split rows. `rows[0]` is source row 1; skipped and header
    /// rows still count towards the numbering.
    pub fn parse_rows<S: AsRef<str>>(rows: &[Vec<S>], mapping: &ColumnMapping) -> ParsedStatement {
        let mut parsed = ParsedStatement::default();
        for (idx, row) in rows.iter().enumerate().skip(mapping.leading_rows()) {
            if is_blank(row) {
                continue;
            }
            parsed.push(idx + 1, build_draft(row, mapping));
        }
        parsed
    }

    /// Reads delimited text with the mapping's delimiter. A record the CSV
    /// reader cannot decode becomes a row error like any other.
    pub fn parse_reader<R: Read>(
        data: R,
        mapping: &ColumnMapping,
    ) -> Result<ParsedStatement, ParseError> {
        if !mapping.delimiter.is_ascii() {
            return Err(ParseError::InvalidDelimiter(mapping.delimiter));
        }
        let delimiter = mapping.delimiter as u8;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(data);

        let mut parsed = ParsedStatement::default();
        for (idx, result) in reader.records().enumerate().skip(mapping.leading_rows()) {
            // The reader drops empty lines, so prefer its line numbers.
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    let row = e.position().map_or(idx + 1, |p| p.line() as usize);
                    parsed.push(row, Err(RowError::Malformed(e.to_string())));
                    continue;
                }
            };
            let row = record.position().map_or(idx + 1, |p| p.line() as usize);
            let cells: Vec<&str> = record.iter().collect();
            if is_blank(&cells) {
                continue;
            }
            parsed.push(row, build_draft(&cells, mapping));
        }
        Ok(parsed)
    }
}

fn is_blank<S: AsRef<str>>(row: &[S]) -> bool {
    row.iter().all(|c| c.as_ref().trim().is_empty())
}

fn required<'a, S: AsRef<str>>(
    row: &'a [S],
    index: usize,
    field: &'static str,
) -> Result<&'a str, RowError> {
    row.get(index)
        .map(|c| c.as_ref())
        .ok_or(RowError::MissingColumn { field, index })
}

fn optional<S: AsRef<str>>(row: &[S], index: Option<usize>) -> String {
    index
        .and_then(|i| row.get(i))
        .map(|c| c.as_ref().trim().to_string())
        .unwrap_or_default()
}

fn build_draft<S: AsRef<str>>(row: &[S], mapping: &ColumnMapping) -> Result<TransactionDraft, RowError> {
    let transaction_date = normalize::parse_date(
        required(row, mapping.date_column, "date")?,
        &mapping.date_format,
    )?;

    let mut amount = normalize::parse_amount(
        required(row, mapping.amount_column, "amount")?,
        mapping.decimal_separator,
        mapping.thousands_separator,
    )?;
    match optional(row, mapping.debit_credit_column).to_uppercase().chars().next() {
        Some('D') => amount = -amount.abs(),
        Some('K') | Some('C') => amount = amount.abs(),
        _ => {}
    }

    let value_date = match optional(row, mapping.value_date_column) {
        s if s.is_empty() => None,
        s => Some(normalize::parse_date(&s, &mapping.date_format)?),
    };

    Ok(TransactionDraft {
        transaction_date,
        value_date,
        amount: Money::new(amount),
        description: optional(row, mapping.description_column),
        reference: optional(row, mapping.reference_column),
        counterparty_name: optional(row, mapping.counterparty_name_column),
        counterparty_account: optional(row, mapping.counterparty_account_column),
        external_id: optional(row, mapping.external_id_column),
    })
}

pub fn parse_rows<S: AsRef<str>>(rows: &[Vec<S>], mapping: &ColumnMapping) -> ParsedStatement {
    StatementParser::parse_rows(rows, mapping)
}

pub fn parse_csv<R: Read>(data: R, mapping: &ColumnMapping) -> Result<ParsedStatement, ParseError> {
    StatementParser::parse_reader(data, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn money(s: &str) -> Money {
        Money::new(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn generic_mapping_imports_all_rows() {
        let input = rows(&[
            &["2025-01-15", "1000.00", "Customer Payment"],
            &["2025-01-16", "-500.00", "Supplier Payment"],
            &["2025-01-17", "250.50", "Interest Income"],
        ]);
        let parsed = parse_rows(&input, &ColumnMapping::generic());
        assert!(parsed.failures.is_empty());
        assert_eq!(parsed.lines.len(), 3);
        assert_eq!(parsed.lines[1].draft.amount, money("-500"));
        assert_eq!(parsed.lines[2].draft.description, "Interest Income");
        assert_eq!(parsed.lines[2].row, 3);
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let input = rows(&[
            &["date", "amount", "description"],
            &["2025-01-15", "10.00", "ok"],
            &["15/01/2025", "10.00", "bad date"],
            &["2025-01-16", "ten", "bad amount"],
            &["2025-01-17"],
            &["2025-01-18", "(3.50)", "refund"],
        ]);
        let parsed = parse_rows(&input, &ColumnMapping::generic().with_header(true));
        assert_eq!(parsed.lines.len(), 2);
        assert_eq!(
            parsed.errors(),
            vec![
                "Row 3: Invalid date: 15/01/2025".to_string(),
                "Row 4: Invalid amount: ten".to_string(),
                "Row 5: Missing amount column (index 1)".to_string(),
            ]
        );
        assert_eq!(parsed.lines[1].draft.amount, money("-3.50"));
        assert_eq!(parsed.lines[1].row, 6);
    }

    #[test]
    fn numbering_counts_skipped_rows() {
        let input = rows(&[
            &["Statement for account EE12"],
            &["Period 2025-01"],
            &["date", "amount", "description"],
            &["nope", "1", "x"],
        ]);
        let mapping = ColumnMapping::generic().with_skip_rows(2).with_header(true);
        let parsed = parse_rows(&input, &mapping);
        assert_eq!(parsed.errors(), vec!["Row 4: Invalid date: nope".to_string()]);
    }

    #[test]
    fn blank_rows_are_ignored() {
        let input = rows(&[&["2025-01-15", "1", "a"], &["", "", ""], &["2025-01-16", "2", "b"]]);
        let parsed = parse_rows(&input, &ColumnMapping::generic());
        assert_eq!(parsed.lines.len(), 2);
        assert!(parsed.failures.is_empty());
        assert_eq!(parsed.lines[1].row, 3);
    }

    #[test]
    fn all_fields_and_debit_marker() {
        let mapping = ColumnMapping {
            date_column: 0,
            value_date_column: Some(1),
            amount_column: 2,
            debit_credit_column: Some(3),
            description_column: Some(4),
            reference_column: Some(5),
            counterparty_name_column: Some(6),
            counterparty_account_column: Some(7),
            external_id_column: Some(8),
            date_format: "%d.%m.%Y".to_string(),
            decimal_separator: ',',
            thousands_separator: Some(' '),
            delimiter: ';',
            has_header: false,
            skip_rows: 0,
        };
        let input = rows(&[
            &["15.01.2025", "16.01.2025", "1 250,00", "D", "Rent", "RF18 539", "Landlord OÜ", "EE38220022", "2025011500001"],
            &["16.01.2025", "", "99,90", "K", "Refund", "", "", "", ""],
        ]);
        let parsed = parse_rows(&input, &mapping);
        assert!(parsed.failures.is_empty(), "{:?}", parsed.failures);
        let first = &parsed.lines[0].draft;
        assert_eq!(first.amount, money("-1250"));
        assert_eq!(first.value_date, NaiveDate::from_ymd_opt(2025, 1, 16));
        assert_eq!(first.reference, "RF18 539");
        assert_eq!(first.counterparty_name, "Landlord OÜ");
        assert_eq!(first.counterparty_account, "EE38220022");
        assert_eq!(first.external_id, "2025011500001");
        let second = &parsed.lines[1].draft;
        assert_eq!(second.amount, money("99.90"));
        assert_eq!(second.value_date, None);
    }

    #[test]
    fn invalid_value_date_is_a_row_error() {
        let mapping = ColumnMapping {
            value_date_column: Some(3),
            ..ColumnMapping::generic()
        };
        let input = rows(&[&["2025-01-15", "1", "a", "soon"]]);
        let parsed = parse_rows(&input, &mapping);
        assert_eq!(parsed.errors(), vec!["Row 1: Invalid date: soon".to_string()]);
    }

    #[test]
    fn reads_delimited_text() {
        let data = "date;amount;description\n2025-01-15;1.000,00;Customer Payment\n2025-01-16;-500,00;\"Supplier; Ltd\"\n";
        let mapping = ColumnMapping {
            delimiter: ';',
            decimal_separator: ',',
            thousands_separator: Some('.'),
            ..ColumnMapping::generic().with_header(true)
        };
        let parsed = parse_csv(data.as_bytes(), &mapping).unwrap();
        assert!(parsed.failures.is_empty());
        assert_eq!(parsed.lines.len(), 2);
        assert_eq!(parsed.lines[0].draft.amount, money("1000"));
        assert_eq!(parsed.lines[1].draft.description, "Supplier; Ltd");
        assert_eq!(parsed.lines[1].row, 3);
    }

    #[test]
    fn rejects_multibyte_delimiter() {
        let mapping = ColumnMapping {
            delimiter: '§',
            ..ColumnMapping::generic()
        };
        assert!(matches!(
            parse_csv("".as_bytes(), &mapping),
            Err(ParseError::InvalidDelimiter('§'))
        ));
    }
}
