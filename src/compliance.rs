//! Compliance scoring
//!
//! Grades an accepted card against the documentation rubric: how complete
//! the card sections are, and how much of the trust framework the card fills
//! in. Every check is worth a fixed number of points; checks made of several
//! sub-checks earn their points in proportion to the sub-checks that pass.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::card::{
    AdaptationPointType, BehaviorCard, FailureSeverity, ObservabilityProfile, PerformanceProfile,
};
use crate::version::CardIdentity;

const CARD_WEIGHT: f64 = 0.55;
const TRUST_WEIGHT: f64 = 0.45;
const MAX_SUGGESTIONS: usize = 5;
const MIN_FAILURE_MODES: usize = 3;
const MIN_FAILURE_CATEGORIES: usize = 4;

/// Failure categories implied by words in a scenario
const CATEGORY_KEYWORDS: [(&str, &[&str]); 4] = [
    ("INPUT", &["data", "stale", "missing", "input", "format"]),
    ("MODEL", &["forecast", "predict", "classif", "accuracy", "model"]),
    ("HUMAN", &["fatigue", "trust", "override", "ignore", "complacen"]),
    ("ETHICAL", &["bias", "equity", "fair", "discriminat", "vulnerable"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    NonCompliant,
    Aspirational,
    Compatible,
    Certified,
}

impl ComplianceLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => ComplianceLevel::Certified,
            s if s >= 70.0 => ComplianceLevel::Compatible,
            s if s >= 50.0 => ComplianceLevel::Aspirational,
            _ => ComplianceLevel::NonCompliant,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComplianceLevel::Certified => "ABC Certified",
            ComplianceLevel::Compatible => "ABC Compatible",
            ComplianceLevel::Aspirational => "ABC Aspirational",
            ComplianceLevel::NonCompliant => "Non-compliant",
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCheck {
    pub item: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl SubCheck {
    fn new(item: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            item: item.to_string(),
            passed,
            detail: detail.into(),
        }
    }
}

/// One graded check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub points_earned: f64,
    pub points_possible: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_checks: Vec<SubCheck>,
}

impl CheckResult {
    /// Points earned in proportion to the passing sub-checks
    fn graded(name: &str, points: f64, sub_checks: Vec<SubCheck>, fix: &str) -> Self {
        let passed_count = sub_checks.iter().filter(|s| s.passed).count();
        let passed = passed_count == sub_checks.len();
        let earned = if sub_checks.is_empty() {
            points
        } else {
            passed_count as f64 / sub_checks.len() as f64 * points
        };
        let failing: Vec<&str> = sub_checks
            .iter()
            .filter(|s| !s.passed)
            .map(|s| s.item.as_str())
            .collect();

        Self {
            name: name.to_string(),
            passed,
            points_earned: round1(earned),
            points_possible: points,
            details: format!("{}/{} sub-checks passed", passed_count, sub_checks.len()),
            fix_suggestion: (!passed).then(|| format!("{}: {}", fix, failing.join(", "))),
            sub_checks,
        }
    }

    /// Points earned as a fraction of the whole
    fn fractional(name: &str, points: f64, fraction: f64, passed: bool, details: String, fix: &str) -> Self {
        Self {
            name: name.to_string(),
            passed,
            points_earned: round1(fraction.clamp(0.0, 1.0) * points),
            points_possible: points,
            details,
            fix_suggestion: (!passed).then(|| fix.to_string()),
            sub_checks: Vec::new(),
        }
    }

    pub fn points_lost(&self) -> f64 {
        self.points_possible - self.points_earned
    }
}

/// Compliance grading of one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub card: CardIdentity,
    pub card_score: f64,
    pub trust_score: f64,
    pub overall_score: f64,
    pub level: ComplianceLevel,
    pub card_checks: Vec<CheckResult>,
    pub trust_checks: Vec<CheckResult>,
    pub suggestions: Vec<String>,
}

impl ComplianceReport {
    pub fn checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.card_checks.iter().chain(&self.trust_checks)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks().filter(|c| !c.passed)
    }
}

pub struct ComplianceChecker {
    assumption_id: Regex,
    adaptation_point_id: Regex,
    failure_mode_id: Regex,
}

impl Default for ComplianceChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplianceChecker {
    pub fn new() -> Self {
        Self {
            assumption_id: Regex::new(r"^[A-Z]{2}-\d{3}$").unwrap(),
            adaptation_point_id: Regex::new(r"^AP-\d{3}$").unwrap(),
            failure_mode_id: Regex::new(r"^FM-\d{3}$").unwrap(),
        }
    }

    pub fn check(&self, card: &BehaviorCard) -> ComplianceReport {
        let card_checks = vec![
            required_sections(),
            identity_check(card),
            problem_pattern_check(card),
            behavior_check(card),
            self.assumptions_check(card),
            self.adaptation_points_check(card),
            composition_check(card),
            provenance_check(card),
        ];

        let trust_checks = vec![
            self.failure_modes_check(card),
            mitigation_check(card),
            category_coverage_check(card),
            ethical_check(card),
            performance_check(card),
            observability_check(card),
            domain_severity_check(card),
            guardrails_check(card),
        ];

        let card_score = section_score(&card_checks);
        let trust_score = section_score(&trust_checks);
        let overall_score = round1(card_score * CARD_WEIGHT + trust_score * TRUST_WEIGHT);

        let mut failed: Vec<&CheckResult> = card_checks
            .iter()
            .chain(&trust_checks)
            .filter(|c| !c.passed)
            .collect();
        failed.sort_by(|a, b| b.points_lost().total_cmp(&a.points_lost()));
        let suggestions = failed
            .into_iter()
            .filter_map(|c| c.fix_suggestion.clone())
            .take(MAX_SUGGESTIONS)
            .collect();

        let report = ComplianceReport {
            card: card.identity(),
            card_score,
            trust_score,
            overall_score,
            level: ComplianceLevel::from_score(overall_score),
            card_checks,
            trust_checks,
            suggestions,
        };

        tracing::debug!(
            card = %report.card,
            score = report.overall_score,
            level = %report.level,
            "compliance graded"
        );

        report
    }

    fn assumptions_check(&self, card: &BehaviorCard) -> CheckResult {
        let assumptions: Vec<_> = card.domain_assumptions.iter().map(|(_, a)| a).collect();
        let ids_valid = assumptions.iter().all(|a| self.assumption_id.is_match(&a.id));
        let noted = assumptions
            .iter()
            .all(|a| a.adaptation_note.as_deref().is_some_and(|n| !n.is_empty()));

        let subs = vec![
            SubCheck::new("has assumptions documented", !assumptions.is_empty(), format!("{} total", assumptions.len())),
            SubCheck::new("IDs follow format (XX-NNN)", ids_valid, ""),
            // Strength is a closed enum once decoded
            SubCheck::new("strengths are hard/soft", true, ""),
            SubCheck::new("adaptation notes present", noted, ""),
        ];
        CheckResult::graded("Domain assumptions", 15.0, subs, "Document domain assumptions")
    }

    fn adaptation_points_check(&self, card: &BehaviorCard) -> CheckResult {
        let points = &card.adaptation_points;
        let of_type = |t: AdaptationPointType| points.iter().filter(move |ap| ap.point_type == t);

        let subs = vec![
            SubCheck::new("has adaptation points", !points.is_empty(), format!("{} defined", points.len())),
            SubCheck::new(
                "IDs follow format (AP-NNN)",
                points.iter().all(|ap| self.adaptation_point_id.is_match(&ap.id)),
                "",
            ),
            SubCheck::new("types valid", true, ""),
            SubCheck::new(
                "swappable components have interface",
                of_type(AdaptationPointType::SwappableComponent).all(|ap| ap.interface.is_some()),
                "",
            ),
            SubCheck::new(
                "swappable components have alternatives",
                of_type(AdaptationPointType::SwappableComponent).all(|ap| !ap.suggested_alternatives.is_empty()),
                "",
            ),
            SubCheck::new(
                "configurable points have parameters",
                of_type(AdaptationPointType::Configurable).all(|ap| !ap.parameters.is_empty()),
                "",
            ),
        ];
        CheckResult::graded("Adaptation points", 15.0, subs, "Complete adaptation points")
    }

    fn failure_modes_check(&self, card: &BehaviorCard) -> CheckResult {
        let modes = &card.trust.failure_modes;
        let subs = vec![
            SubCheck::new(
                "minimum 3 failure modes",
                modes.len() >= MIN_FAILURE_MODES,
                format!("{} documented", modes.len()),
            ),
            SubCheck::new(
                "IDs follow format (FM-NNN)",
                modes.iter().all(|fm| self.failure_mode_id.is_match(&fm.id)),
                "",
            ),
            SubCheck::new(
                "required fields present",
                !modes.is_empty() && modes.iter().all(|fm| fm.impact.is_some() && fm.severity.is_some()),
                "id, scenario, impact, severity",
            ),
            SubCheck::new(
                "severities valid",
                !modes.is_empty() && modes.iter().all(|fm| fm.severity.is_some()),
                "",
            ),
        ];
        CheckResult::graded("Failure modes documented", 20.0, subs, "Document failure modes")
    }
}

/// Grade a card with the default checker
pub fn check(card: &BehaviorCard) -> ComplianceReport {
    ComplianceChecker::new().check(card)
}

// Accepted cards always carry every required section
fn required_sections() -> CheckResult {
    let subs = [
        "abc_version",
        "identity",
        "problem_pattern",
        "behavior",
        "domain_assumptions",
        "adaptation_points",
        "trust",
    ]
    .into_iter()
    .map(|section| SubCheck::new(section, true, "present"))
    .collect();
    CheckResult::graded("Required top-level sections", 10.0, subs, "Add missing sections")
}

fn identity_check(card: &BehaviorCard) -> CheckResult {
    let identity = &card.identity;
    let version = &identity.version.0;
    let plain_semver = version.pre.is_empty() && version.build.is_empty();

    let subs = vec![
        SubCheck::new("required fields", !identity.authors.is_empty(), ""),
        SubCheck::new("name format (kebab-case)", true, identity.name.clone()),
        SubCheck::new("version format (semver)", plain_semver, identity.version.to_string()),
    ];
    CheckResult::graded("Identity section", 10.0, subs, "Fix identity")
}

fn problem_pattern_check(card: &BehaviorCard) -> CheckResult {
    let pattern = &card.problem_pattern;
    let subs = vec![
        SubCheck::new("required fields", !pattern.description.is_empty(), ""),
        SubCheck::new("valid category", true, pattern.category.as_str()),
        SubCheck::new(
            "has sub_patterns",
            !pattern.sub_patterns.is_empty(),
            format!("{} defined", pattern.sub_patterns.len()),
        ),
        SubCheck::new(
            "has analogous_domains",
            !pattern.analogous_domains.is_empty(),
            format!("{} defined", pattern.analogous_domains.len()),
        ),
        SubCheck::new(
            "analogous domains well-formed",
            pattern
                .analogous_domains
                .iter()
                .all(|a| (0.0..=1.0).contains(&a.similarity)),
            "",
        ),
    ];
    CheckResult::graded("Problem pattern section", 10.0, subs, "Describe the problem pattern")
}

fn behavior_check(card: &BehaviorCard) -> CheckResult {
    let behavior = &card.behavior;
    let method = behavior
        .reasoning
        .as_ref()
        .and_then(|r| r.method.clone())
        .unwrap_or_else(|| "(not documented)".to_string());

    let subs = vec![
        SubCheck::new("trigger type valid", true, ""),
        SubCheck::new(
            "inputs well-formed",
            !behavior.inputs.is_empty(),
            format!("{} inputs defined", behavior.inputs.len()),
        ),
        SubCheck::new(
            "outputs well-formed",
            !behavior.outputs.is_empty(),
            format!("{} outputs defined", behavior.outputs.len()),
        ),
        SubCheck::new(
            "reasoning documented",
            behavior.reasoning.as_ref().is_some_and(|r| r.is_documented()),
            method,
        ),
    ];
    CheckResult::graded("Behavior specification", 15.0, subs, "Specify the behavior")
}

fn composition_check(card: &BehaviorCard) -> CheckResult {
    let composition = &card.composition;
    let declared = !(composition.delegates_to.is_empty()
        && composition.orchestrated_by.is_empty()
        && composition.emits.is_empty()
        && composition.listens_to.is_empty());

    let subs = vec![
        SubCheck::new("composition section exists", declared, ""),
        SubCheck::new(
            "emits events defined",
            !composition.emits.is_empty(),
            format!("{} events", composition.emits.len()),
        ),
        SubCheck::new(
            "listens_to events defined",
            !composition.listens_to.is_empty(),
            format!("{} events", composition.listens_to.len()),
        ),
        SubCheck::new(
            "emitted events have payloads",
            composition.emits.iter().all(|e| e.payload.as_ref().is_some_and(truthy)),
            "",
        ),
    ];
    CheckResult::graded("Composition interface", 10.0, subs, "Declare the composition interface")
}

fn provenance_check(card: &BehaviorCard) -> CheckResult {
    let provenance = card.provenance.as_ref();
    let lineage = provenance.map(|p| p.lineage.len()).unwrap_or(0);

    let subs = vec![
        SubCheck::new("origin domain documented", card.origin_domain().is_some(), ""),
        SubCheck::new("lineage history present", lineage > 0, format!("{} versions", lineage)),
        // Version and date are required fields of a decoded lineage entry
        SubCheck::new("lineage entries have version + date", true, ""),
    ];
    CheckResult::graded("Provenance & lineage", 5.0, subs, "Record provenance")
}

fn mitigation_check(card: &BehaviorCard) -> CheckResult {
    let modes = &card.trust.failure_modes;
    let mitigated = modes
        .iter()
        .filter(|fm| fm.mitigation.as_deref().is_some_and(|m| !m.is_empty()))
        .count();
    let coverage = mitigated as f64 / modes.len().max(1) as f64;

    CheckResult::fractional(
        "Failure mode mitigations",
        15.0,
        coverage,
        coverage >= 1.0,
        format!("{}/{} failure modes have mitigations", mitigated, modes.len()),
        "Add a mitigation to every failure mode",
    )
}

fn category_coverage_check(card: &BehaviorCard) -> CheckResult {
    let covered = failure_categories(card);
    let names: Vec<&str> = covered.iter().map(String::as_str).collect();

    CheckResult::fractional(
        "Failure category coverage",
        10.0,
        covered.len() as f64 / MIN_FAILURE_CATEGORIES as f64,
        covered.len() >= MIN_FAILURE_CATEGORIES,
        format!("{} categories covered: {}", covered.len(), names.join(", ")),
        "Document failure modes across more categories (INPUT, MODEL, HUMAN, ETHICAL minimum)",
    )
}

/// Explicit failure categories plus those implied by scenario wording
pub fn failure_categories(card: &BehaviorCard) -> BTreeSet<String> {
    let mut covered = BTreeSet::new();
    for mode in &card.trust.failure_modes {
        if let Some(category) = mode.category.as_deref().filter(|c| !c.is_empty()) {
            covered.insert(category.to_string());
        }
        let scenario = mode.scenario.to_lowercase();
        for (category, keywords) in CATEGORY_KEYWORDS {
            if keywords.iter().any(|k| scenario.contains(k)) {
                covered.insert(category.to_string());
            }
        }
    }
    covered
}

fn ethical_check(card: &BehaviorCard) -> CheckResult {
    let flags = &card.trust.ethical_flags;
    let subs = vec![
        SubCheck::new("ethical flags present", !flags.is_empty(), format!("{} flags", flags.len())),
        SubCheck::new(
            "all have recommendations",
            flags
                .iter()
                .all(|f| f.recommendation.as_deref().is_some_and(|r| !r.is_empty())),
            "",
        ),
    ];
    CheckResult::graded("Ethical considerations", 15.0, subs, "Flag ethical concerns")
}

fn performance_check(card: &BehaviorCard) -> CheckResult {
    let perf = card.trust.performance.as_ref();
    let documented = |field: fn(&PerformanceProfile) -> Option<&Value>| {
        perf.and_then(field).is_some_and(truthy)
    };

    let subs = vec![
        SubCheck::new("tested_scale documented", documented(|p| p.tested_scale.as_ref()), ""),
        SubCheck::new("latency documented", documented(|p| p.latency.as_ref()), ""),
        SubCheck::new("accuracy documented", documented(|p| p.accuracy.as_ref()), ""),
        SubCheck::new("known_degradation documented", documented(|p| p.known_degradation.as_ref()), ""),
    ];
    CheckResult::graded("Performance expectations", 15.0, subs, "Document performance")
}

fn observability_check(card: &BehaviorCard) -> CheckResult {
    let obs = card.trust.observability.as_ref();
    let documented = |field: fn(&ObservabilityProfile) -> Option<&Value>| {
        obs.and_then(field).is_some_and(truthy)
    };

    let subs = vec![
        SubCheck::new("logging documented", documented(|o| o.logging.as_ref()), ""),
        SubCheck::new("explainability documented", documented(|o| o.explainability.as_ref()), ""),
        SubCheck::new("reproducibility documented", documented(|o| o.reproducibility.as_ref()), ""),
    ];
    CheckResult::graded("Observability", 10.0, subs, "Document observability")
}

fn domain_severity_check(card: &BehaviorCard) -> CheckResult {
    let found = card.trust.failure_modes.iter().any(|fm| {
        fm.severity_by_domain.is_some() || fm.severity == Some(FailureSeverity::HighInHumanitarian)
    });

    CheckResult::fractional(
        "Domain-specific severity",
        5.0,
        if found { 1.0 } else { 0.0 },
        found,
        if found {
            "Domain-adjusted severity documented".to_string()
        } else {
            "No domain-specific severity found".to_string()
        },
        "Add severity_by_domain to failure modes that change severity across domains",
    )
}

fn guardrails_check(card: &BehaviorCard) -> CheckResult {
    let trust = &card.trust;
    let items = [
        ("human_oversight", &trust.human_oversight),
        ("kill_switch", &trust.kill_switch),
        ("degradation_modes", &trust.degradation_modes),
    ];
    let present = items.iter().filter(|(_, v)| v.as_ref().is_some_and(truthy)).count();
    let details = items
        .iter()
        .map(|(name, v)| format!("{}: {}", name, if v.as_ref().is_some_and(truthy) { "yes" } else { "no" }))
        .collect::<Vec<_>>()
        .join(", ");

    CheckResult::fractional(
        "Operational guardrails",
        10.0,
        present as f64 / items.len() as f64,
        present >= 2,
        details,
        "Describe human oversight, a kill switch and degradation modes",
    )
}

/// Percentage of the points available in a section
fn section_score(checks: &[CheckResult]) -> f64 {
    let possible: f64 = checks.iter().map(|c| c.points_possible).sum();
    if possible == 0.0 {
        return 0.0;
    }
    let earned: f64 = checks.iter().map(|c| c.points_earned).sum();
    round1(earned / possible * 100.0)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
