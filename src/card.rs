//! Behavior card types and structures
//!
//! The typed model of an Agent Behavior Card. Fields documented as optional in
//! the card format are `Option`s or defaulted collections; every enumerated
//! field is a closed enum. A `BehaviorCard` is produced from a document tree
//! only after the validator and resolver accepted it
//! (see [`crate::pipeline`]).

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::version::{CardIdentity, CardVersion};

// =============================================================================
// Enumerations
// =============================================================================

/// Abstract problem category, independent of domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProblemCategory {
    ConstrainedResourceAllocation,
    AnomalyDetectionAndResponse,
    MultiStakeholderNegotiation,
    InformationSynthesisAndRouting,
    SequentialDecisionUnderUncertainty,
    ComplianceAndConstraintChecking,
    AdaptiveCommunication,
    PatternMatchingAndClassification,
    /// Outside the fixed taxonomy; matched on description text
    Custom,
}

impl ProblemCategory {
    pub const ALL: [ProblemCategory; 9] = [
        Self::ConstrainedResourceAllocation,
        Self::AnomalyDetectionAndResponse,
        Self::MultiStakeholderNegotiation,
        Self::InformationSynthesisAndRouting,
        Self::SequentialDecisionUnderUncertainty,
        Self::ComplianceAndConstraintChecking,
        Self::AdaptiveCommunication,
        Self::PatternMatchingAndClassification,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConstrainedResourceAllocation => "constrained-resource-allocation",
            Self::AnomalyDetectionAndResponse => "anomaly-detection-and-response",
            Self::MultiStakeholderNegotiation => "multi-stakeholder-negotiation",
            Self::InformationSynthesisAndRouting => "information-synthesis-and-routing",
            Self::SequentialDecisionUnderUncertainty => "sequential-decision-under-uncertainty",
            Self::ComplianceAndConstraintChecking => "compliance-and-constraint-checking",
            Self::AdaptiveCommunication => "adaptive-communication",
            Self::PatternMatchingAndClassification => "pattern-matching-and-classification",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom)
    }
}

impl fmt::Display for ProblemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What starts a behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerType {
    Scheduled,
    EventDriven,
    Continuous,
    OnDemand,
}

impl TriggerType {
    pub const NAMES: [&'static str; 4] = ["scheduled", "event-driven", "continuous", "on-demand"];
}

/// How badly a behavior breaks when an assumption is false
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssumptionStrength {
    /// Behavior breaks if false
    Hard,
    /// Behavior degrades gracefully if false
    Soft,
}

impl AssumptionStrength {
    pub const NAMES: [&'static str; 2] = ["hard", "soft"];
}

/// Which section of `domain_assumptions` an assumption is declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionCategory {
    Data,
    Environment,
    Authority,
}

impl AssumptionCategory {
    pub const ALL: [AssumptionCategory; 3] = [Self::Data, Self::Environment, Self::Authority];

    /// Key of the section holding assumptions of this category
    pub fn section_key(&self) -> &'static str {
        match self {
            Self::Data => "data_assumptions",
            Self::Environment => "environment_assumptions",
            Self::Authority => "authority_assumptions",
        }
    }
}

/// Kind of adaptation point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationPointType {
    /// Replaceable component behind a named interface
    SwappableComponent,
    /// Tunable parameters
    Configurable,
    /// Open for additional implementations
    Extensible,
}

impl AdaptationPointType {
    pub const NAMES: [&'static str; 3] = ["swappable_component", "configurable", "extensible"];
}

/// Failure mode severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSeverity {
    Low,
    Medium,
    High,
    Critical,
    HighInHumanitarian,
}

impl FailureSeverity {
    pub const NAMES: [&'static str; 5] = ["low", "medium", "high", "critical", "high_in_humanitarian"];
}

/// `abc_version` as written, or a bare number such as `0.1` rendered back to text
fn format_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

// =============================================================================
// Card
// =============================================================================

/// Root entity: a single Agent Behavior Card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorCard {
    /// Version of the card format this document follows
    #[serde(deserialize_with = "format_version")]
    pub abc_version: String,
    pub identity: Identity,
    pub problem_pattern: ProblemPattern,
    pub behavior: BehaviorSpec,
    pub domain_assumptions: DomainAssumptions,
    pub adaptation_points: Vec<AdaptationPoint>,
    #[serde(default)]
    pub composition: CompositionInterface,
    pub trust: TrustProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl BehaviorCard {
    pub fn identity(&self) -> CardIdentity {
        CardIdentity::new(self.identity.name.clone(), self.identity.version.clone())
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn category(&self) -> ProblemCategory {
        self.problem_pattern.category
    }

    pub fn origin_domain(&self) -> Option<&str> {
        self.provenance
            .as_ref()
            .and_then(|p| p.origin.as_ref())
            .map(|o| o.domain.as_str())
    }

    /// Interfaces declared by swappable adaptation points, in declaration order
    pub fn swappable_interfaces(&self) -> Vec<&str> {
        self.adaptation_points
            .iter()
            .filter(|ap| ap.is_swappable())
            .filter_map(|ap| ap.interface.as_deref())
            .collect()
    }

    /// Every interface name this card exposes or consumes
    ///
    /// Adaptation point interfaces plus the interfaces of delegation links.
    pub fn known_interfaces(&self) -> BTreeSet<&str> {
        let from_points = self
            .adaptation_points
            .iter()
            .filter_map(|ap| ap.interface.as_deref());
        let from_links = self
            .composition
            .delegates_to
            .iter()
            .chain(&self.composition.orchestrated_by)
            .filter_map(|link| link.interface.as_deref());
        from_points.chain(from_links).collect()
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.adaptation_points
            .iter()
            .any(|ap| ap.interface.as_deref() == Some(interface))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.identity.tags.contains(tag)
    }
}

/// Who published the card and under which version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Kebab-case slug, unique per card family
    pub name: String,
    pub display_name: String,
    pub version: CardVersion,
    pub authors: Vec<String>,
    pub created: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

// =============================================================================
// Problem pattern
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemPattern {
    pub category: ProblemCategory,
    pub description: String,
    #[serde(default)]
    pub sub_patterns: Vec<String>,
    #[serde(default)]
    pub analogous_domains: Vec<AnalogousDomain>,
}

/// Another domain where the same pattern applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogousDomain {
    pub domain: String,
    /// Declared similarity in [0, 1]
    pub similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// =============================================================================
// Behavior
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSpec {
    pub trigger: Trigger,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    /// Free-form trigger details (schedule, event names, ...)
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// A named input or output of the behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reasoning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach: Option<String>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
}

impl Reasoning {
    pub fn is_documented(&self) -> bool {
        self.method.as_deref().is_some_and(|m| !m.is_empty())
            || self.approach.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// An optimization objective, optionally weighted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Objective {
    Named(String),
    Weighted {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl Objective {
    pub fn weight(&self) -> Option<f64> {
        match self {
            Self::Named(_) => None,
            Self::Weighted { weight, .. } => *weight,
        }
    }
}

// =============================================================================
// Domain assumptions
// =============================================================================

/// Baked-in premises, grouped by what they are about
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomainAssumptions {
    #[serde(default, rename = "data_assumptions")]
    pub data: Vec<DomainAssumption>,
    #[serde(default, rename = "environment_assumptions")]
    pub environment: Vec<DomainAssumption>,
    #[serde(default, rename = "authority_assumptions")]
    pub authority: Vec<DomainAssumption>,
}

impl DomainAssumptions {
    pub fn section(&self, category: AssumptionCategory) -> &[DomainAssumption] {
        match category {
            AssumptionCategory::Data => &self.data,
            AssumptionCategory::Environment => &self.environment,
            AssumptionCategory::Authority => &self.authority,
        }
    }

    /// All assumptions with their category, data first, then environment, then authority
    pub fn iter(&self) -> impl Iterator<Item = (AssumptionCategory, &DomainAssumption)> {
        AssumptionCategory::ALL
            .into_iter()
            .flat_map(move |cat| self.section(cat).iter().map(move |a| (cat, a)))
    }

    pub fn hard(&self) -> impl Iterator<Item = (AssumptionCategory, &DomainAssumption)> {
        self.iter().filter(|(_, a)| a.strength == AssumptionStrength::Hard)
    }

    pub fn len(&self) -> usize {
        self.data.len() + self.environment.len() + self.authority.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.iter().any(|(_, a)| a.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAssumption {
    /// `XX-NNN`, unique within the card
    pub id: String,
    pub assumption: String,
    pub strength: AssumptionStrength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptation_note: Option<String>,
}

// =============================================================================
// Adaptation points
// =============================================================================

/// A marked location where domain-specific behavior is swapped or tuned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationPoint {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub point_type: AdaptationPointType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<serde_json::Value>,
    /// Interface name; required for swappable components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub suggested_alternatives: Vec<Alternative>,
}

impl AdaptationPoint {
    pub fn is_swappable(&self) -> bool {
        self.point_type == AdaptationPointType::SwappableComponent
    }
}

/// A tunable parameter of a configurable adaptation point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ParameterRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Inclusive numeric bounds, written `[min, max]` or `{min, max}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterRange {
    Pair([f64; 2]),
    Bounds { min: f64, max: f64 },
}

impl ParameterRange {
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Self::Pair([min, max]) => (min, max),
            Self::Bounds { min, max } => (min, max),
        }
    }
}

/// A suggested replacement, tagged with the domain it suits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Composition
// =============================================================================

/// How a card plugs into a graph of other behaviors
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositionInterface {
    #[serde(default)]
    pub delegates_to: Vec<BehaviorLink>,
    #[serde(default)]
    pub orchestrated_by: Vec<BehaviorLink>,
    #[serde(default)]
    pub emits: Vec<EventEmission>,
    #[serde(default)]
    pub listens_to: Vec<EventSubscription>,
}

/// Weak reference to another behavior, by name or by `pattern:<category>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorLink {
    pub behavior: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEmission {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub event: String,
    /// Emitting behavior, when the subscription is source-specific
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Trust
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrustProfile {
    #[serde(default)]
    pub failure_modes: Vec<FailureMode>,
    #[serde(default)]
    pub ethical_flags: Vec<EthicalFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_oversight: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_switch: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation_modes: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMode {
    pub id: String,
    pub scenario: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<FailureSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
    /// INPUT, MODEL, INTEGRATION, SCALE, DOMAIN, HUMAN, SECURITY or ETHICAL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_by_domain: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthicalFlag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tested_scale: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_degradation: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservabilityProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explainability: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reproducibility: Option<serde_json::Value>,
}

// =============================================================================
// Provenance
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    #[serde(default)]
    pub lineage: Vec<LineageEntry>,
    #[serde(default)]
    pub compatibility: Vec<CompatibilityDeclaration>,
}

/// Where the behavior was first built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<String>,
}

/// Snapshot of one published version
///
/// The changed-id lists are back references into this card's adaptation
/// points and assumptions; they are checked by the resolver, never owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub version: CardVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub adaptation_points_changed: Vec<String>,
    #[serde(default)]
    pub assumptions_changed: Vec<String>,
}

/// External framework compatibility, opaque to this crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityDeclaration {
    pub framework: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for category in ProblemCategory::ALL {
            assert_eq!(ProblemCategory::parse(category.as_str()), Some(category));
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, serde_json::Value::String(category.as_str().to_string()));
        }
        assert_eq!(ProblemCategory::parse("resource-juggling"), None);
    }

    #[test]
    fn test_assumptions_iterate_in_section_order() {
        let make = |id: &str, strength| DomainAssumption {
            id: id.to_string(),
            assumption: format!("assumption {}", id),
            strength,
            adaptation_note: None,
        };
        let assumptions = DomainAssumptions {
            data: vec![make("DA-001", AssumptionStrength::Hard)],
            environment: vec![make("EA-001", AssumptionStrength::Soft)],
            authority: vec![make("AA-001", AssumptionStrength::Hard)],
        };

        let order: Vec<_> = assumptions.iter().map(|(c, a)| (c, a.id.as_str())).collect();
        assert_eq!(
            order,
            vec![
                (AssumptionCategory::Data, "DA-001"),
                (AssumptionCategory::Environment, "EA-001"),
                (AssumptionCategory::Authority, "AA-001"),
            ]
        );
        assert_eq!(assumptions.hard().count(), 2);
        assert!(assumptions.contains_id("EA-001"));
    }

    #[test]
    fn test_swappable_interfaces_skip_configurable_points() {
        let mut doc = crate::fixtures::card("inventory-rebalance-optimizer", "1.0.0");
        crate::fixtures::set(&mut doc, "/abc_version", serde_json::json!(1));
        let card: BehaviorCard = serde_json::from_value(doc).unwrap();

        assert_eq!(card.abc_version, "1");
        assert!(card.adaptation_points[0].is_swappable());
        assert!(!card.adaptation_points[1].is_swappable());
        assert_eq!(card.swappable_interfaces(), vec!["DemandForecaster"]);
    }

    #[test]
    fn test_parameter_range_forms() {
        let pair: ParameterRange = serde_json::from_str("[0.1, 0.9]").unwrap();
        let bounds: ParameterRange = serde_json::from_str(r#"{"min": 1, "max": 5}"#).unwrap();
        assert_eq!(pair.bounds(), (0.1, 0.9));
        assert_eq!(bounds.bounds(), (1.0, 5.0));
    }

    #[test]
    fn test_objective_forms() {
        let named: Objective = serde_json::from_str(r#""minimize stockouts""#).unwrap();
        let weighted: Objective =
            serde_json::from_str(r#"{"name": "minimize cost", "weight": 0.4}"#).unwrap();
        assert_eq!(named.weight(), None);
        assert_eq!(weighted.weight(), Some(0.4));
    }
}
