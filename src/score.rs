//! Compatibility scoring between two accepted cards
//!
//! The score estimates how much of card A can be reused in card B's setting.
//! It combines three components:
//!
//! - **pattern**: do the cards solve the same abstract problem?
//! - **assumptions**: do B's premises cover A's, and vice versa?
//! - **coverage**: do B's interfaces cover A's swappable components, and vice versa?
//!
//! Each component is computed in both directions and the weaker direction
//! counts, so `score(A, B) == score(B, A)`. Only the recommendation list is
//! directional: it names A's hard assumptions that B does not satisfy.

use serde::{Deserialize, Serialize};
use similar::TextDiff;
use std::collections::BTreeSet;

use crate::card::{AssumptionCategory, AssumptionStrength, BehaviorCard, DomainAssumption};
use crate::config::ScoringConfig;
use crate::error::{CardError, Result};
use crate::pipeline::{AcceptedCard, CardPipeline};
use crate::version::CardIdentity;

/// Result of comparing card A against card B
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub source: CardIdentity,
    pub target: CardIdentity,
    /// Weighted score in [0, 1]
    pub score: f64,
    pub components: ScoreComponents,
    /// A's hard assumptions not fully satisfied by B
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub pattern: f64,
    pub assumptions: f64,
    pub coverage: f64,
}

/// An adaptation needed before A can run under B's assumptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub assumption_id: String,
    pub category: AssumptionCategory,
    pub assumption: String,
    /// Credit the assumption earned against B
    pub credit: f64,
    /// The card's own advice for adapting this assumption
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptation_note: Option<String>,
}

/// Score two accepted cards with default weights
pub fn score(a: &AcceptedCard, b: &AcceptedCard) -> CompatibilityReport {
    CompatibilityScorer::default().score(a, b)
}

#[derive(Debug, Clone, Default)]
pub struct CompatibilityScorer {
    config: ScoringConfig,
}

impl CompatibilityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, a: &AcceptedCard, b: &AcceptedCard) -> CompatibilityReport {
        self.compare(a.card(), b.card())
    }

    /// Score two typed cards that have not been through acceptance
    ///
    /// Both cards are re-checked first; a card that would not be accepted
    /// fails with [`CardError::Precondition`].
    pub fn score_cards(&self, a: &BehaviorCard, b: &BehaviorCard) -> Result<CompatibilityReport> {
        let pipeline = CardPipeline::new();
        for card in [a, b] {
            if let Err(rejection) = pipeline.reaccept(card) {
                return Err(CardError::Precondition {
                    identity: rejection.label,
                    errors: rejection.diagnostics.error_count(),
                });
            }
        }
        Ok(self.compare(a, b))
    }

    /// Score cards known to be accepted
    pub(crate) fn compare(&self, a: &BehaviorCard, b: &BehaviorCard) -> CompatibilityReport {
        let pattern = self.pattern_score(a, b);

        let (forward, recommendations) = self.assumption_direction(a, b);
        let (backward, _) = self.assumption_direction(b, a);
        let assumptions = forward.min(backward);

        let coverage = coverage_direction(a, b).min(coverage_direction(b, a));

        let weights = &self.config;
        let total = weights.total_weight();
        let score = if total > 0.0 {
            (weights.pattern_weight * pattern
                + weights.assumption_weight * assumptions
                + weights.coverage_weight * coverage)
                / total
        } else {
            0.0
        };

        CompatibilityReport {
            source: a.identity(),
            target: b.identity(),
            score: score.clamp(0.0, 1.0),
            components: ScoreComponents {
                pattern,
                assumptions,
                coverage,
            },
            recommendations,
        }
    }

    fn pattern_score(&self, a: &BehaviorCard, b: &BehaviorCard) -> f64 {
        let (ca, cb) = (a.category(), b.category());
        if ca.is_custom() || cb.is_custom() {
            return self.text_similarity(&a.problem_pattern.description, &b.problem_pattern.description);
        }
        if ca == cb {
            return 1.0;
        }
        analog_similarity(a, b).max(analog_similarity(b, a))
    }

    /// Weighted credit of A's assumptions against B, plus recommendations
    fn assumption_direction(&self, a: &BehaviorCard, b: &BehaviorCard) -> (f64, Vec<Recommendation>) {
        let mut earned = 0.0;
        let mut possible = 0.0;
        let mut hard_count = 0;
        let mut recommendations = Vec::new();

        for (category, assumption) in a.domain_assumptions.iter() {
            let credit = self.assumption_credit(category, assumption, b);
            let weight = match assumption.strength {
                AssumptionStrength::Hard => {
                    hard_count += 1;
                    if credit < 1.0 {
                        recommendations.push(Recommendation {
                            assumption_id: assumption.id.clone(),
                            category,
                            assumption: assumption.assumption.clone(),
                            credit,
                            adaptation_note: assumption.adaptation_note.clone(),
                        });
                    }
                    1.0
                }
                AssumptionStrength::Soft => self.config.soft_assumption_weight,
            };
            earned += weight * credit;
            possible += weight;
        }

        // Nothing can break without hard assumptions
        if hard_count == 0 || possible <= 0.0 {
            return (1.0, recommendations);
        }
        (earned / possible, recommendations)
    }

    fn assumption_credit(&self, category: AssumptionCategory, assumption: &DomainAssumption, b: &BehaviorCard) -> f64 {
        let mut credit: f64 = 0.0;
        for (other_category, other) in b.domain_assumptions.iter() {
            if self.text_similarity(&assumption.assumption, &other.assumption) >= self.config.text_match_threshold {
                return 1.0;
            }
            if other_category == category {
                credit = credit.max(self.config.category_credit);
            }
        }
        credit
    }

    pub fn text_similarity(&self, a: &str, b: &str) -> f64 {
        text_similarity(a, b, self.config.max_text_tokens)
    }
}

/// Best declared similarity from `from`'s analogous domains to `to`'s category or origin
fn analog_similarity(from: &BehaviorCard, to: &BehaviorCard) -> f64 {
    let targets: Vec<String> = [Some(to.category().as_str()), to.origin_domain()]
        .into_iter()
        .flatten()
        .map(normalize_domain)
        .collect();

    from.problem_pattern
        .analogous_domains
        .iter()
        .filter(|analog| targets.contains(&normalize_domain(&analog.domain)))
        .map(|analog| analog.similarity)
        .fold(0.0, f64::max)
}

/// Fraction of A's swappable interfaces that B exposes
fn coverage_direction(a: &BehaviorCard, b: &BehaviorCard) -> f64 {
    let wanted: BTreeSet<&str> = a.swappable_interfaces().into_iter().collect();
    if wanted.is_empty() {
        return 1.0;
    }
    let offered = b.known_interfaces();
    let covered = wanted.iter().filter(|i| offered.contains(*i)).count();
    covered as f64 / wanted.len() as f64
}

/// Domain name compared without case or separators
pub fn normalize_domain(domain: &str) -> String {
    domain
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// =============================================================================
// Text similarity
// =============================================================================

/// Deterministic, symmetric similarity of two texts in [0, 1]
///
/// Mean of token-set Jaccard and the word-level diff ratio, each text cut to
/// `max_tokens` lowercase alphanumeric tokens.
pub fn text_similarity(a: &str, b: &str, max_tokens: usize) -> f64 {
    let left = tokenize(a, max_tokens);
    let right = tokenize(b, max_tokens);
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }

    let jaccard = token_jaccard(&left, &right);
    let ratio = (diff_ratio(&left, &right) + diff_ratio(&right, &left)) / 2.0;
    ((jaccard + ratio) / 2.0).clamp(0.0, 1.0)
}

fn tokenize(text: &str, max_tokens: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .take(max_tokens)
        .map(str::to_lowercase)
        .collect()
}

fn token_jaccard(a: &[String], b: &[String]) -> f64 {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn diff_ratio(a: &[String], b: &[String]) -> f64 {
    let a: Vec<&str> = a.iter().map(String::as_str).collect();
    let b: Vec<&str> = b.iter().map(String::as_str).collect();
    f64::from(TextDiff::from_slices(&a, &b).ratio())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{card, set};
    use crate::pipeline::accept;
    use serde_json::{json, Value};

    fn accepted(doc: &Value) -> AcceptedCard {
        accept(doc).unwrap_or_else(|r| panic!("{}", r))
    }

    fn assumption(id: &str, text: &str) -> Value {
        json!({"id": id, "assumption": text, "strength": "hard", "adaptation_note": format!("Adapt {}", id)})
    }

    fn swappable(id: &str, interface: &str) -> Value {
        json!({
            "id": id,
            "name": interface,
            "type": "swappable_component",
            "interface": interface,
            "suggested_alternatives": [{"name": "alternative"}]
        })
    }

    fn worked_example() -> (AcceptedCard, AcceptedCard) {
        let mut a = card("card-a", "1.0.0");
        set(&mut a, "/domain_assumptions", json!({
            "data_assumptions": [assumption("DA-001", "Stock counts arrive every morning from each warehouse")],
            "environment_assumptions": [assumption("EA-001", "Trucks can reach every site within one shift")],
            "authority_assumptions": [assumption("AA-001", "Dispatchers reroute loads without approval")]
        }));
        set(&mut a, "/adaptation_points", json!([swappable("AP-001", "I1"), swappable("AP-002", "I2")]));
        set(&mut a, "/composition", json!({}));
        set(&mut a, "/provenance/lineage", json!([]));

        // Same categories for data and environment, different wording, no authority
        let mut b = card("card-b", "1.0.0");
        set(&mut b, "/domain_assumptions", json!({
            "data_assumptions": [assumption("DA-001", "Clinic inventories are reported by volunteers weekly")],
            "environment_assumptions": [assumption("EA-001", "Roads flood during the rainy season")]
        }));
        set(&mut b, "/adaptation_points", json!([swappable("AP-001", "I1")]));
        set(&mut b, "/composition", json!({}));
        set(&mut b, "/provenance/lineage", json!([]));

        (accepted(&a), accepted(&b))
    }

    fn single_assumption(name: &str, section: &str, id: &str, text: &str) -> AcceptedCard {
        let mut doc = card(name, "1.0.0");
        set(&mut doc, "/domain_assumptions", json!({ section: [assumption(id, text)] }));
        set(&mut doc, "/provenance/lineage", json!([]));
        accepted(&doc)
    }

    #[test]
    fn test_self_score_is_one() {
        let a = accepted(&card("inventory-rebalance-optimizer", "1.0.0"));
        let report = score(&a, &a);
        assert!((report.score - 1.0).abs() < 1e-9);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_worked_example() {
        let (a, b) = worked_example();
        let report = score(&a, &b);

        assert_eq!(report.components.pattern, 1.0);
        assert!((report.components.assumptions - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.components.coverage - 0.5).abs() < 1e-9);
        assert!((report.score - 0.7667).abs() < 1e-3);

        assert_eq!(report.recommendations.len(), 1);
        let rec = &report.recommendations[0];
        assert_eq!(rec.assumption_id, "AA-001");
        assert_eq!(rec.category, AssumptionCategory::Authority);
        assert_eq!(rec.credit, 0.0);
        assert_eq!(rec.adaptation_note.as_deref(), Some("Adapt AA-001"));
    }

    #[test]
    fn test_symmetry() {
        let (a, b) = worked_example();
        let forward = score(&a, &b);
        let backward = score(&b, &a);
        assert_eq!(forward.score, backward.score);
        assert_eq!(forward.components, backward.components);
        // A covers both of B's categories and its only interface
        assert!(backward.recommendations.is_empty());
    }

    #[test]
    fn test_category_match_satisfies_assumption() {
        let a = single_assumption("card-a", "data_assumptions", "DA-001", "Sensor feeds report every five minutes");
        let b = single_assumption("card-b", "data_assumptions", "DA-001", "Patient records include allergy history");

        let report = score(&a, &b);
        assert_eq!(report.components.assumptions, 1.0);
        assert!(report.recommendations.is_empty());

        let partial = CompatibilityScorer::new(ScoringConfig {
            category_credit: 0.5,
            ..ScoringConfig::default()
        });
        let report = partial.score(&a, &b);
        assert!((report.components.assumptions - 0.5).abs() < 1e-9);
        assert_eq!(report.recommendations[0].credit, 0.5);
    }

    #[test]
    fn test_text_match_across_categories() {
        let text = "Volunteers confirm every delivery by phone";
        let a = single_assumption("card-a", "data_assumptions", "DA-001", text);
        let b = single_assumption("card-b", "authority_assumptions", "AA-001", text);
        assert_eq!(score(&a, &b).components.assumptions, 1.0);

        let c = single_assumption("card-c", "authority_assumptions", "AA-001", "Budgets are fixed each quarter");
        let report = score(&a, &c);
        assert_eq!(report.components.assumptions, 0.0);
        assert_eq!(report.recommendations[0].assumption_id, "DA-001");
        assert_eq!(report.recommendations[0].credit, 0.0);
    }

    #[test]
    fn test_no_hard_assumptions_scores_full() {
        let mut a = card("card-a", "1.0.0");
        set(&mut a, "/domain_assumptions", json!({
            "environment_assumptions": [{"id": "EA-001", "assumption": "Network is mostly available", "strength": "soft"}]
        }));
        set(&mut a, "/provenance/lineage", json!([]));
        let b = card("card-b", "1.0.0");

        let scorer = CompatibilityScorer::default();
        let (a, b) = (accepted(&a), accepted(&b));
        let (direction, recommendations) = scorer.assumption_direction(a.card(), b.card());
        assert_eq!(direction, 1.0);
        assert!(recommendations.is_empty());
    }

    #[test]
    fn test_analogous_domain_pattern_credit() {
        let a = card("card-a", "1.0.0");
        let mut b = card("card-b", "1.0.0");
        set(&mut b, "/problem_pattern/category", json!("anomaly-detection-and-response"));
        set(&mut b, "/provenance/origin/domain", json!("Humanitarian Logistics"));

        let report = score(&accepted(&a), &accepted(&b));
        assert!((report.components.pattern - 0.8).abs() < 1e-9);

        set(&mut b, "/provenance/origin/domain", json!("healthcare"));
        let report = score(&accepted(&a), &accepted(&b));
        assert_eq!(report.components.pattern, 0.0);
    }

    #[test]
    fn test_custom_category_uses_description_text() {
        let mut a = card("card-a", "1.0.0");
        set(&mut a, "/problem_pattern/category", json!("custom"));
        set(&mut a, "/problem_pattern/description", json!("Route volunteer drivers to pickup points"));
        let mut b = card("card-b", "1.0.0");
        set(&mut b, "/problem_pattern/description", json!("Route volunteer drivers to pickup points"));

        let report = score(&accepted(&a), &accepted(&b));
        assert!((report.components.pattern - 1.0).abs() < 1e-9);

        set(&mut b, "/problem_pattern/description", json!("Classify invoices by tax code"));
        let report = score(&accepted(&a), &accepted(&b));
        assert_eq!(report.components.pattern, 0.0);
    }

    #[test]
    fn test_coverage_counts_composition_interfaces() {
        let mut a = card("card-a", "1.0.0");
        set(&mut a, "/adaptation_points", json!([swappable("AP-001", "Forecaster")]));
        set(&mut a, "/provenance/lineage", json!([]));
        let mut b = card("card-b", "1.0.0");
        set(&mut b, "/adaptation_points", json!([swappable("AP-001", "Notifier")]));
        set(&mut b, "/composition", json!({"delegates_to": [{"behavior": "forecast-service", "interface": "Forecaster"}]}));
        set(&mut b, "/provenance/lineage", json!([]));

        let (a, b) = (accepted(&a), accepted(&b));
        assert_eq!(coverage_direction(a.card(), b.card()), 1.0);
        assert_eq!(coverage_direction(b.card(), a.card()), 0.0);
        assert_eq!(score(&a, &b).components.coverage, 0.0);
    }

    #[test]
    fn test_score_cards_requires_acceptable_cards() {
        let a = accepted(&card("card-a", "1.0.0")).into_card();
        let mut b = accepted(&card("card-b", "1.0.0")).into_card();
        let scorer = CompatibilityScorer::default();
        assert!(scorer.score_cards(&a, &b).is_ok());

        b.adaptation_points.clear();
        let err = scorer.score_cards(&a, &b).unwrap_err();
        assert!(matches!(err, CardError::Precondition { ref identity, .. } if identity == "card-b@1.0.0"));
    }

    #[test]
    fn test_text_similarity() {
        assert_eq!(text_similarity("Same words here", "same, words HERE", 256), 1.0);
        assert_eq!(text_similarity("", "", 256), 1.0);
        assert_eq!(text_similarity("alpha beta", "gamma delta", 256), 0.0);

        let ab = text_similarity("stock counts are accurate", "stock counts are late", 256);
        let ba = text_similarity("stock counts are late", "stock counts are accurate", 256);
        assert_eq!(ab, ba);
        assert!(ab > 0.5 && ab < 1.0);
    }

    #[test]
    fn test_text_similarity_token_cap() {
        let long_a = format!("shared prefix {}", "alpha ".repeat(500));
        let long_b = format!("shared prefix {}", "omega ".repeat(500));
        assert_eq!(text_similarity(&long_a, &long_b, 2), 1.0);
        assert!(text_similarity(&long_a, &long_b, 256) < 0.3);
    }

    #[test]
    fn test_tokenize_stops_at_cap() {
        assert_eq!(tokenize("Alpha, BETA gamma", 2), vec!["alpha", "beta"]);
        assert_eq!(tokenize("  --  ", 8), Vec::<String>::new());
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("Humanitarian Logistics"), "humanitarianlogistics");
        assert_eq!(normalize_domain("humanitarian_logistics"), normalize_domain("humanitarian-logistics"));
    }
}
