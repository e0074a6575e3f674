use chrono::NaiveDate;
use ledgerlink_core::{BankTransaction, Money, PaymentForMatching, PaymentId};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::util::similarity;

/// Legal-entity suffixes dropped from the end of counterparty names.
const LEGAL_SUFFIXES: &[&str] = &[
    "oü", "ou", "as", "mtü", "sia", "uab", "ab", "oy", "oyj", "asa", "aps", "gmbh", "ag", "bv",
    "sa", "srl", "sp z o o", "llc", "ltd", "limited", "inc", "corp", "plc", "co",
];

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());
static NAME_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherWeights {
    pub exact_amount_bonus: f64,
    pub date_proximity_weight: f64,
    pub reference_match_weight: f64,
    pub name_match_weight: f64,
    /// Flat bonus when the payment number appears in the description.
    pub payment_number_bonus: f64,
    pub min_confidence: f64,
    pub max_date_diff_days: u32,
}

impl Default for MatcherWeights {
    fn default() -> Self {
        Self {
            exact_amount_bonus: 0.5,
            date_proximity_weight: 0.2,
            reference_match_weight: 0.2,
            name_match_weight: 0.1,
            payment_number_bonus: 0.2,
            min_confidence: 0.3,
            max_date_diff_days: 7,
        }
    }
}

impl MatcherWeights {
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

/// A scored candidate payment for one bank transaction. Computed on demand,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSuggestion {
    pub payment_id: PaymentId,
    pub payment_number: String,
    pub payment_date: NaiveDate,
    pub amount: Money,
    pub contact_name: String,
    pub reference: String,
    pub confidence: f64,
    pub match_reason: String,
}

/// The transaction fields the scorer reads.
#[derive(Debug, Clone)]
pub struct MatchableTransaction {
    pub date: NaiveDate,
    pub amount: Money,
    pub description: String,
    pub reference: String,
    pub counterparty_name: String,
}

impl From<&BankTransaction> for MatchableTransaction {
    fn from(t: &BankTransaction) -> Self {
        MatchableTransaction {
            date: t.transaction_date,
            amount: t.amount,
            description: t.description.clone(),
            reference: t.reference.clone(),
            counterparty_name: t.counterparty_name.clone(),
        }
    }
}

pub struct CandidateMatcher {
    pub weights: MatcherWeights,
}

impl Default for CandidateMatcher {
    fn default() -> Self {
        Self::new(MatcherWeights::default())
    }
}

impl CandidateMatcher {
    pub fn new(weights: MatcherWeights) -> Self {
        Self { weights }
    }

    /// Scores every candidate and keeps those reaching `min_confidence`.
    /// Output follows the input order; see [`rank`] for ordering.
    pub fn score(
        &self,
        txn: &MatchableTransaction,
        payments: &[PaymentForMatching],
    ) -> Vec<MatchSuggestion> {
        payments
            .iter()
            .filter_map(|p| self.score_pair(txn, p))
            .collect()
    }

    /// Scores, sorts by confidence descending and truncates to `limit`.
    pub fn suggest(
        &self,
        txn: &MatchableTransaction,
        payments: &[PaymentForMatching],
        limit: usize,
    ) -> Vec<MatchSuggestion> {
        let mut suggestions = self.score(txn, payments);
        rank(&mut suggestions);
        suggestions.truncate(limit);
        suggestions
    }

    fn score_pair(
        &self,
        txn: &MatchableTransaction,
        payment: &PaymentForMatching,
    ) -> Option<MatchSuggestion> {
        let w = &self.weights;
        let mut confidence: f64 = 0.0;
        let mut reasons: Vec<String> = Vec::new();

        let (amount_factor, amount_label) = amount_signal(txn.amount, payment.amount);
        if amount_factor > 0.0 {
            confidence += w.exact_amount_bonus * amount_factor;
            reasons.push(amount_label.to_string());
        }

        let days = (txn.date - payment.date).num_days().unsigned_abs();
        if w.max_date_diff_days > 0 && days <= u64::from(w.max_date_diff_days) {
            let decay = 1.0 - days as f64 / f64::from(w.max_date_diff_days);
            if decay > 0.0 {
                confidence += w.date_proximity_weight * decay;
                reasons.push(if days == 0 {
                    "same date".to_string()
                } else {
                    format!("date within {days} days")
                });
            }
        }

        if !txn.reference.trim().is_empty() && !payment.reference.trim().is_empty() {
            let score = similarity(
                &normalize_reference(&txn.reference),
                &normalize_reference(&payment.reference),
            );
            if score > 0.8 {
                confidence += w.reference_match_weight;
                reasons.push("reference match".to_string());
            } else if score > 0.5 {
                confidence += w.reference_match_weight / 2.0;
                reasons.push("similar reference".to_string());
            }
        }

        if !txn.counterparty_name.trim().is_empty() && !payment.contact_name.trim().is_empty() {
            let score = similarity(
                &normalize_name(&txn.counterparty_name),
                &normalize_name(&payment.contact_name),
            );
            if score > 0.7 {
                confidence += w.name_match_weight;
                reasons.push("name match".to_string());
            } else if score > 0.4 {
                confidence += w.name_match_weight / 2.0;
                reasons.push("similar name".to_string());
            }
        }

        let number = payment.number.trim().to_lowercase();
        if !number.is_empty() && txn.description.to_lowercase().contains(&number) {
            confidence += w.payment_number_bonus;
            reasons.push("payment number in description".to_string());
        }

        let confidence = confidence.clamp(0.0, 1.0);
        if reasons.is_empty() || confidence < w.min_confidence {
            return None;
        }

        Some(MatchSuggestion {
            payment_id: payment.id,
            payment_number: payment.number.clone(),
            payment_date: payment.date,
            amount: payment.amount,
            contact_name: payment.contact_name.clone(),
            reference: payment.reference.clone(),
            confidence,
            match_reason: reasons.join(", "),
        })
    }
}

/// Sorts suggestions by confidence, highest first. Ties keep input order.
pub fn rank(suggestions: &mut [MatchSuggestion]) {
    suggestions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
}

/// Fraction of the exact-amount bonus earned, compared on magnitudes.
fn amount_signal(txn_amount: Money, payment_amount: Money) -> (f64, &'static str) {
    let a = txn_amount.abs().as_decimal();
    let b = payment_amount.abs().as_decimal();
    if a == b {
        return (1.0, "exact amount");
    }
    if a.is_zero() {
        return (0.0, "");
    }
    let relative = ((a - b).abs() / a).to_f64().unwrap_or(f64::MAX);
    if relative <= 0.01 {
        (0.8, "amount within 1%")
    } else if relative <= 0.05 {
        (0.5, "amount within 5%")
    } else {
        (0.0, "")
    }
}

/// Lowercase, alphanumerics only: `RF18-0000 539` → `rf180000539`.
pub fn normalize_reference(reference: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&reference.to_lowercase(), "")
        .into_owned()
}

/// Lowercase, punctuation dropped, trailing legal-entity suffixes removed and
/// internal whitespace collapsed: `Acme Trading, OÜ` → `acme trading`.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let cleaned = NAME_NOISE.replace_all(&lowered, " ");
    let mut collapsed = WHITESPACE.replace_all(cleaned.trim(), " ").into_owned();

    loop {
        let stripped = LEGAL_SUFFIXES.iter().find_map(|suffix| {
            collapsed
                .strip_suffix(suffix)
                .filter(|rest| rest.ends_with(' '))
                .map(|rest| rest.trim_end().to_string())
        });
        match stripped {
            Some(rest) if !rest.is_empty() => collapsed = rest,
            _ => break,
        }
    }
    collapsed
}
