//! Named column mappings for known bank exports.
//!
//! The registry is built once and never mutated; callers get shared
//! references into it.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::csv::ColumnMapping;

pub const GENERIC_FORMAT: &str = "generic";

#[derive(Debug, Clone)]
pub struct BankFormat {
    pub id: &'static str,
    pub name: &'static str,
    /// Header substrings that must all be present (case-insensitive) for the
    /// format to be detected.
    pub detection: &'static [&'static str],
    pub mapping: ColumnMapping,
}

static FORMATS: Lazy<BTreeMap<&'static str, BankFormat>> = Lazy::new(|| {
    [generic(), swedbank(), seb(), lhv()]
        .into_iter()
        .map(|f| (f.id, f))
        .collect()
});

fn generic() -> BankFormat {
    BankFormat {
        id: GENERIC_FORMAT,
        name: "Generic (date, amount, description)",
        detection: &[],
        mapping: ColumnMapping::generic(),
    }
}

/// Swedbank Estonia statement export:
/// `Kliendi konto;Reatüüp;Kuupäev;Saaja/Maksja;Selgitus;Summa;Valuuta;
/// Deebet/Kreedit;Arhiveerimistunnus;Tehingu tüüp;Viitenumber;Dokumendi number`
fn swedbank() -> BankFormat {
    BankFormat {
        id: "swedbank",
        name: "Swedbank (Estonia)",
        detection: &["reatüüp", "arhiveerimistunnus"],
        mapping: ColumnMapping {
            date_column: 2,
            value_date_column: None,
            amount_column: 5,
            description_column: Some(4),
            reference_column: Some(10),
            counterparty_name_column: Some(3),
            counterparty_account_column: None,
            external_id_column: Some(8),
            debit_credit_column: Some(7),
            date_format: "%d.%m.%Y".to_string(),
            decimal_separator: ',',
            thousands_separator: None,
            delimiter: ';',
            has_header: true,
            skip_rows: 0,
        },
    }
}

/// SEB Estonia: `Kliendi konto;Dokumendi number;Kuupäev;Saaja/maksja konto;
/// Saaja/maksja nimi;Saaja panga kood;Tühi;Deebet/Kreedit (D/C);Summa;
/// Viitenumber;Arhiveerimistunnus;Selgitus;Teenustasu;Valuuta;...`
fn seb() -> BankFormat {
    BankFormat {
        id: "seb",
        name: "SEB (Estonia)",
        detection: &["saaja/maksja konto", "arhiveerimistunnus"],
        mapping: ColumnMapping {
            date_column: 2,
            value_date_column: None,
            amount_column: 8,
            description_column: Some(11),
            reference_column: Some(9),
            counterparty_name_column: Some(4),
            counterparty_account_column: Some(3),
            external_id_column: Some(10),
            debit_credit_column: Some(7),
            date_format: "%d.%m.%Y".to_string(),
            decimal_separator: ',',
            thousands_separator: None,
            delimiter: ';',
            has_header: true,
            skip_rows: 0,
        },
    }
}

/// LHV English export: `Customer account no,Document no,Date,
/// Sender/receiver account,Sender/receiver name,Sender bank code,Empty,
/// Debit/Credit (D/C),Amount,Reference number,Archiving code,Description,...`
fn lhv() -> BankFormat {
    BankFormat {
        id: "lhv",
        name: "LHV",
        detection: &["sender/receiver name", "archiving code"],
        mapping: ColumnMapping {
            date_column: 2,
            value_date_column: None,
            amount_column: 8,
            description_column: Some(11),
            reference_column: Some(9),
            counterparty_name_column: Some(4),
            counterparty_account_column: Some(3),
            external_id_column: Some(10),
            debit_credit_column: Some(7),
            date_format: "%Y-%m-%d".to_string(),
            decimal_separator: '.',
            thousands_separator: None,
            delimiter: ',',
            has_header: true,
            skip_rows: 0,
        },
    }
}

pub fn all_formats() -> impl Iterator<Item = &'static BankFormat> {
    FORMATS.values()
}

pub fn get_format(id: &str) -> Option<&'static BankFormat> {
    FORMATS.get(id)
}

pub fn generic_format() -> &'static BankFormat {
    &FORMATS[GENERIC_FORMAT]
}

/// Picks the preset whose detection substrings all occur in `header`.
/// When several qualify the one with more substrings wins; with none the
/// generic mapping is returned.
pub fn detect_format(header: &str) -> &'static BankFormat {
    let header = header.to_lowercase();
    all_formats()
        .filter(|f| !f.detection.is_empty())
        .filter(|f| f.detection.iter().all(|needle| header.contains(needle)))
        .max_by_key(|f| f.detection.len())
        .unwrap_or_else(generic_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::parse_csv;
    use ledgerlink_core::Money;
    use rust_decimal::Decimal;

    #[test]
    fn registry_has_generic() {
        assert_eq!(generic_format().mapping, ColumnMapping::generic());
        assert!(get_format("swedbank").is_some());
        assert!(get_format("nordea").is_none());
        assert_eq!(all_formats().count(), 4);
    }

    #[test]
    fn detects_swedbank_case_insensitive() {
        let header = "\"Kliendi konto\";\"REATÜÜP\";\"Kuupäev\";\"Saaja/Maksja\";\"Selgitus\";\"Summa\";\"Valuuta\";\"Deebet/Kreedit\";\"Arhiveerimistunnus\";\"Tehingu tüüp\";\"Viitenumber\";\"Dokumendi number\"";
        assert_eq!(detect_format(header).id, "swedbank");
    }

    #[test]
    fn detects_seb_and_lhv() {
        let seb = "Kliendi konto;Dokumendi number;Kuupäev;Saaja/maksja konto;Saaja/maksja nimi;Saaja panga kood;Tühi;Deebet/Kreedit (D/C);Summa;Viitenumber;Arhiveerimistunnus;Selgitus";
        assert_eq!(detect_format(seb).id, "seb");
        let lhv = "Customer account no,Document no,Date,Sender/receiver account,Sender/receiver name,Sender bank code,Empty,Debit/Credit (D/C),Amount,Reference number,Archiving code,Description";
        assert_eq!(detect_format(lhv).id, "lhv");
    }

    #[test]
    fn unknown_header_falls_back_to_generic() {
        assert_eq!(detect_format("Date,Amount,Memo").id, GENERIC_FORMAT);
        assert_eq!(detect_format("").id, GENERIC_FORMAT);
    }

    #[test]
    fn swedbank_export_parses() {
        let data = "\
\"Kliendi konto\";\"Reatüüp\";\"Kuupäev\";\"Saaja/Maksja\";\"Selgitus\";\"Summa\";\"Valuuta\";\"Deebet/Kreedit\";\"Arhiveerimistunnus\";\"Tehingu tüüp\";\"Viitenumber\";\"Dokumendi number\"
\"EE382200221020145685\";\"20\";\"15.01.2025\";\"Acme OÜ\";\"Arve INV-2025-001\";\"1250,00\";\"EUR\";\"K\";\"2025011500012345\";\"MK\";\"1234561\";\"\"
\"EE382200221020145685\";\"20\";\"16.01.2025\";\"Elektrilevi\";\"Elekter jaanuar\";\"89,45\";\"EUR\";\"D\";\"2025011600054321\";\"MK\";\"\";\"17\"
";
        let format = detect_format(data.lines().next().unwrap());
        let parsed = parse_csv(data.as_bytes(), &format.mapping).unwrap();
        assert!(parsed.failures.is_empty(), "{:?}", parsed.failures);
        let drafts: Vec<_> = parsed.lines.iter().map(|line| &line.draft).collect();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].amount, Money::new(Decimal::new(125000, 2)));
        assert_eq!(drafts[0].counterparty_name, "Acme OÜ");
        assert_eq!(drafts[0].external_id, "2025011500012345");
        assert_eq!(drafts[0].reference, "1234561");
        assert_eq!(drafts[1].amount, Money::new(Decimal::new(-8945, 2)));
    }
}
