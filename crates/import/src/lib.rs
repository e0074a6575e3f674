pub mod auto_match;
pub mod csv;
pub mod match_engine;
pub mod normalize;
pub mod presets;
pub mod util;

pub use auto_match::{AutoMatchDecision, AutoMatchPolicy, AutoMatchSettings};
pub use csv::{
    ColumnMapping, ParseError, ParsedStatement, RowError, RowFailure, StatementLine,
    StatementParser,
};
pub use match_engine::{
    CandidateMatcher, MatchSuggestion, MatchableTransaction, MatcherWeights,
};
pub use normalize::NormalizeError;
pub use presets::{detect_format, get_format, BankFormat};

pub mod import {
    use crate::*;

    pub fn import_csv_with_mapping<R: std::io::Read>(
        data: R,
        mapping: &ColumnMapping,
    ) -> Result<ParsedStatement, ParseError> {
        crate::csv::parse_csv(data, mapping)
    }

    /// Detects the bank format from the first line of `text` and parses the
    /// whole export with it. For the generic layout the first line is taken
    /// to be a header only when neither its date nor its amount cell parses,
    /// so a malformed first data row is still reported.
    pub fn import_csv_detected(
        text: &str,
    ) -> Result<(&'static BankFormat, ParsedStatement), ParseError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let first_line = text.lines().next().unwrap_or_default();
        let format = detect_format(first_line);
        let mut mapping = format.mapping.clone();
        if format.id == crate::presets::GENERIC_FORMAT {
            let has_header = looks_like_header(first_line, &mapping);
            mapping = mapping.with_header(has_header);
        }
        let parsed = crate::csv::parse_csv(text.as_bytes(), &mapping)?;
        Ok((format, parsed))
    }

    fn looks_like_header(line: &str, mapping: &ColumnMapping) -> bool {
        let cells: Vec<&str> = line
            .split(mapping.delimiter)
            .map(|c| c.trim().trim_matches('"'))
            .collect();
        let cell = |index: usize| cells.get(index).copied().unwrap_or_default();
        let date_ok =
            crate::normalize::parse_date(cell(mapping.date_column), &mapping.date_format).is_ok();
        let amount_ok = crate::normalize::parse_amount(
            cell(mapping.amount_column),
            mapping.decimal_separator,
            mapping.thousands_separator,
        )
        .is_ok();
        !date_ok && !amount_ok
    }
}
