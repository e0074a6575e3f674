use serde::{Deserialize, Serialize};

use crate::match_engine::{rank, MatchSuggestion};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMatchSettings {
    /// A runner-up scoring at least this fraction of the best suggestion
    /// makes the choice ambiguous.
    pub ambiguity_ratio: f64,
    /// Upper bound on candidate payments fetched per transaction.
    pub candidate_limit: usize,
    /// Suggestions returned for interactive review.
    pub suggestion_limit: usize,
}

impl Default for AutoMatchSettings {
    fn default() -> Self {
        Self {
            ambiguity_ratio: 0.9,
            candidate_limit: 20,
            suggestion_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutoMatchDecision {
    Apply(MatchSuggestion),
    NoCandidate,
    BelowThreshold { best: f64 },
    Ambiguous { best: f64, runner_up: f64 },
}

/// Decides whether the top suggestion for a transaction is safe to commit
/// without review: it must reach `threshold` and clearly beat the runner-up.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMatchPolicy {
    pub threshold: f64,
    pub ambiguity_ratio: f64,
}

impl AutoMatchPolicy {
    pub fn new(threshold: f64, settings: &AutoMatchSettings) -> Self {
        Self {
            threshold,
            ambiguity_ratio: settings.ambiguity_ratio,
        }
    }

    pub fn decide(&self, mut suggestions: Vec<MatchSuggestion>) -> AutoMatchDecision {
        rank(&mut suggestions);
        let mut ranked = suggestions.into_iter();
        let Some(best) = ranked.next() else {
            return AutoMatchDecision::NoCandidate;
        };
        if best.confidence < self.threshold {
            return AutoMatchDecision::BelowThreshold {
                best: best.confidence,
            };
        }
        if let Some(runner_up) = ranked.next() {
            if runner_up.confidence >= best.confidence * self.ambiguity_ratio {
                return AutoMatchDecision::Ambiguous {
                    best: best.confidence,
                    runner_up: runner_up.confidence,
                };
            }
        }
        AutoMatchDecision::Apply(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgerlink_core::{Money, PaymentId};

    fn suggestion(id: i64, confidence: f64) -> MatchSuggestion {
        MatchSuggestion {
            payment_id: PaymentId(id),
            payment_number: format!("P{id}"),
            payment_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            amount: Money::zero(),
            contact_name: String::new(),
            reference: String::new(),
            confidence,
            match_reason: "exact amount".to_string(),
        }
    }

    fn policy(threshold: f64) -> AutoMatchPolicy {
        AutoMatchPolicy::new(threshold, &AutoMatchSettings::default())
    }

    #[test]
    fn applies_clear_winner() {
        let decision = policy(0.7).decide(vec![suggestion(1, 0.5), suggestion(2, 0.9)]);
        assert_eq!(decision, AutoMatchDecision::Apply(suggestion(2, 0.9)));
    }

    #[test]
    fn single_candidate_above_threshold() {
        assert!(matches!(
            policy(0.7).decide(vec![suggestion(1, 0.7)]),
            AutoMatchDecision::Apply(_)
        ));
    }

    #[test]
    fn rejects_below_threshold() {
        assert_eq!(
            policy(0.8).decide(vec![suggestion(1, 0.75)]),
            AutoMatchDecision::BelowThreshold { best: 0.75 }
        );
    }

    #[test]
    fn rejects_close_runner_up() {
        // 0.73 >= 0.8 * 0.9
        assert_eq!(
            policy(0.7).decide(vec![suggestion(1, 0.8), suggestion(2, 0.73)]),
            AutoMatchDecision::Ambiguous {
                best: 0.8,
                runner_up: 0.73
            }
        );
        assert!(matches!(
            policy(0.7).decide(vec![suggestion(1, 0.8), suggestion(2, 0.70)]),
            AutoMatchDecision::Apply(_)
        ));
    }

    #[test]
    fn ratio_is_configurable() {
        let strict = AutoMatchPolicy {
            threshold: 0.5,
            ambiguity_ratio: 0.5,
        };
        assert!(matches!(
            strict.decide(vec![suggestion(1, 0.9), suggestion(2, 0.5)]),
            AutoMatchDecision::Ambiguous { .. }
        ));
    }

    #[test]
    fn nothing_to_decide() {
        assert_eq!(policy(0.1).decide(Vec::new()), AutoMatchDecision::NoCandidate);
    }
}
