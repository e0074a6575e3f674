//! TOML configuration for the banking service.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [matcher]
//! min_confidence = 0.4
//!
//! [auto_match]
//! ambiguity_ratio = 0.85
//!
//! [import]
//! skip_duplicates = true
//! default_format = "swedbank"
//!
//! [import.mappings.legacy]
//! date_column = 1
//! amount_column = 3
//! delimiter = ";"
//! ```

use ledgerlink_import::{get_format, AutoMatchSettings, ColumnMapping, MatcherWeights};
use ledgerlink_storage::StorageOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::BankingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub skip_duplicates: bool,
    pub default_format: String,
    /// Site-specific mappings, looked up before the built-in presets.
    pub mappings: BTreeMap<String, ColumnMapping>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            default_format: ledgerlink_import::presets::GENERIC_FORMAT.to_string(),
            mappings: BTreeMap::new(),
        }
    }
}

impl ImportSettings {
    pub fn mapping(&self, name: &str) -> Option<ColumnMapping> {
        self.mappings
            .get(name)
            .cloned()
            .or_else(|| get_format(name).map(|f| f.mapping.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankingConfig {
    pub matcher: MatcherWeights,
    pub auto_match: AutoMatchSettings,
    pub import: ImportSettings,
    pub storage: StorageOptions,
}

impl BankingConfig {
    pub fn from_toml(content: &str) -> Result<Self, BankingError> {
        let config: BankingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, BankingError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), BankingError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.matcher.min_confidence) {
            return Err(BankingError::InvalidConfig(format!(
                "matcher.min_confidence must be within [0, 1], got {}",
                self.matcher.min_confidence
            )));
        }
        if self.matcher.max_date_diff_days == 0 {
            return Err(BankingError::InvalidConfig(
                "matcher.max_date_diff_days must be positive".to_string(),
            ));
        }
        if !(self.auto_match.ambiguity_ratio > 0.0 && self.auto_match.ambiguity_ratio <= 1.0) {
            return Err(BankingError::InvalidConfig(format!(
                "auto_match.ambiguity_ratio must be within (0, 1], got {}",
                self.auto_match.ambiguity_ratio
            )));
        }
        if self.auto_match.candidate_limit == 0 || self.auto_match.suggestion_limit == 0 {
            return Err(BankingError::InvalidConfig(
                "auto_match limits must be positive".to_string(),
            ));
        }
        if self.import.mapping(&self.import.default_format).is_none() {
            return Err(BankingError::UnknownFormat(self.import.default_format.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = BankingConfig::from_toml("").unwrap();
        assert_eq!(config, BankingConfig::default());
        assert_eq!(config.matcher.exact_amount_bonus, 0.5);
        assert_eq!(config.matcher.max_date_diff_days, 7);
        assert_eq!(config.auto_match.ambiguity_ratio, 0.9);
        assert_eq!(config.auto_match.candidate_limit, 20);
        assert!(config.import.skip_duplicates);
        assert_eq!(config.import.default_format, "generic");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = BankingConfig::from_toml(
            r#"
            [matcher]
            min_confidence = 0.45

            [auto_match]
            candidate_limit = 50

            [storage]
            path = "/var/lib/ledgerlink/bank.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.matcher.min_confidence, 0.45);
        assert_eq!(config.matcher.name_match_weight, 0.1);
        assert_eq!(config.auto_match.candidate_limit, 50);
        assert_eq!(config.auto_match.suggestion_limit, 5);
        assert_eq!(config.storage.path, Path::new("/var/lib/ledgerlink/bank.db"));
        assert_eq!(config.storage.max_connections, 4);
    }

    #[test]
    fn custom_mapping_shadows_presets() {
        let config = BankingConfig::from_toml(
            r#"
            [import]
            default_format = "legacy"

            [import.mappings.legacy]
            date_column = 1
            amount_column = 3
            delimiter = ";"
            decimal_separator = ","
            date_format = "%d.%m.%Y"
            has_header = true
            "#,
        )
        .unwrap();
        let legacy = config.import.mapping("legacy").unwrap();
        assert_eq!(legacy.amount_column, 3);
        assert_eq!(legacy.delimiter, ';');
        assert!(legacy.has_header);
        assert!(config.import.mapping("swedbank").is_some());
        assert!(config.import.mapping("nope").is_none());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            BankingConfig::from_toml("[auto_match]\nambiguity_ratio = 1.5"),
            Err(BankingError::InvalidConfig(_))
        ));
        assert!(matches!(
            BankingConfig::from_toml("[import]\ndefault_format = \"nordea\""),
            Err(BankingError::UnknownFormat(_))
        ));
        assert!(matches!(
            BankingConfig::from_toml("[matcher]\nmin_confidence = \"high\""),
            Err(BankingError::Config(_))
        ));
    }
}
