//! Card Schema Validation
//!
//! Checks a parsed card document before anything else looks at it.
//!
//! ## Passes
//! 1. **Structure**: required fields, value types, enum values, slug/semver/date/id formats
//! 2. **Uniqueness**: assumption ids across all three categories, adaptation point ids
//! 3. **Ranges**: analogous-domain similarity, objective weights, parameter bounds
//! 4. **Taxonomy**: problem category
//! 5. **Non-emptiness**: at least one assumption and one adaptation point
//!
//! Quality warnings run last. Every pass reports into the same [`Diagnostics`]
//! list; only a root that is not a mapping stops validation early.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::card::{
    AdaptationPointType, AssumptionCategory, AssumptionStrength, FailureSeverity,
    ProblemCategory, TriggerType,
};
use crate::config::ValidationConfig;
use crate::diagnostics::{child_path, index_path, Diagnostics};

type Mapping = Map<String, Value>;

const STRING: &str = "a string";
const MAPPING: &str = "a mapping";
const SEQUENCE: &str = "a sequence";
const NUMBER: &str = "a number";
const BOOLEAN: &str = "a boolean";

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    /// No blocking diagnostics; warnings may still be present
    Valid { warnings: Diagnostics },
    /// At least one error; carries every diagnostic found
    Invalid { diagnostics: Diagnostics },
}

impl ValidationResult {
    pub fn from_diagnostics(diagnostics: Diagnostics) -> Self {
        if diagnostics.has_errors() {
            Self::Invalid { diagnostics }
        } else {
            Self::Valid { warnings: diagnostics }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            Self::Valid { warnings } => warnings,
            Self::Invalid { diagnostics } => diagnostics,
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        match self {
            Self::Valid { warnings } => warnings,
            Self::Invalid { diagnostics } => diagnostics,
        }
    }
}

/// Validate a document with default settings
pub fn validate(document: &Value) -> ValidationResult {
    CardValidator::new().validate(document)
}

/// The card schema validator
pub struct CardValidator {
    /// Kebab-case card names
    slug: Regex,
    /// `XX-NNN` assumption ids
    assumption_id: Regex,
    /// Recommended `AP-NNN` adaptation point ids
    adaptation_point_id: Regex,
    /// Recommended `FM-NNN` failure mode ids
    failure_mode_id: Regex,
    /// Allowed distance of the objective weight sum from 1.0
    weight_tolerance: f64,
}

impl Default for CardValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CardValidator {
    pub fn new() -> Self {
        Self::with_config(&ValidationConfig::default())
    }

    pub fn with_config(config: &ValidationConfig) -> Self {
        Self {
            slug: Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap(),
            assumption_id: Regex::new(r"^[A-Z]{2}-\d{3}$").unwrap(),
            adaptation_point_id: Regex::new(r"^AP-\d{3}$").unwrap(),
            failure_mode_id: Regex::new(r"^FM-\d{3}$").unwrap(),
            weight_tolerance: config.weight_tolerance,
        }
    }

    /// Validate a parsed document tree
    pub fn validate(&self, document: &Value) -> ValidationResult {
        let mut diags = Diagnostics::new();

        let Some(root) = document.as_object() else {
            diags.structural("", "NOT_A_MAPPING", "Card document must be a mapping");
            return ValidationResult::from_diagnostics(diags);
        };

        self.check_structure(root, &mut diags);
        self.check_unique_ids(root, &mut diags);
        self.check_ranges(root, &mut diags);
        self.check_taxonomy(root, &mut diags);
        self.check_non_empty(root, &mut diags);
        self.check_quality(root, &mut diags);

        ValidationResult::from_diagnostics(diags)
    }

    // =========================================================================
    // Pass 1: structure
    // =========================================================================

    fn check_structure(&self, root: &Mapping, diags: &mut Diagnostics) {
        // Cards written as `abc_version: 0.1` parse to a number
        if let Some(version) = required(root, "", "abc_version", diags) {
            if !version.is_string() && !version.is_number() {
                diags.wrong_type("abc_version", "a string or a number");
            }
        }
        self.check_identity(root, diags);
        self.check_problem_pattern(root, diags);
        self.check_behavior(root, diags);
        self.check_assumptions(root, diags);
        self.check_adaptation_points(root, diags);
        self.check_composition(root, diags);
        self.check_trust(root, diags);
        self.check_provenance(root, diags);
    }

    fn check_identity(&self, root: &Mapping, diags: &mut Diagnostics) {
        let Some(identity) = req(root, "", "identity", MAPPING, Value::as_object, diags) else {
            return;
        };
        let path = "identity";

        if let Some(name) = req(identity, path, "name", STRING, Value::as_str, diags) {
            if !self.slug.is_match(name) {
                diags.structural(
                    &child_path(path, "name"),
                    "INVALID_SLUG",
                    format!("Name '{}' must be a kebab-case slug", name),
                );
            }
        }
        req(identity, path, "display_name", STRING, Value::as_str, diags);
        if let Some(version) = req(identity, path, "version", STRING, Value::as_str, diags) {
            check_semver(version, &child_path(path, "version"), diags);
        }
        if let Some(authors) = req(identity, path, "authors", SEQUENCE, Value::as_array, diags) {
            string_items(authors, &child_path(path, "authors"), diags);
        }
        if let Some(created) = req(identity, path, "created", STRING, Value::as_str, diags) {
            check_date(created, &child_path(path, "created"), diags);
        }
        opt(identity, path, "license", STRING, Value::as_str, diags);
        if let Some(tags) = opt(identity, path, "tags", SEQUENCE, Value::as_array, diags) {
            string_items(tags, &child_path(path, "tags"), diags);
        }
    }

    fn check_problem_pattern(&self, root: &Mapping, diags: &mut Diagnostics) {
        let Some(pattern) = req(root, "", "problem_pattern", MAPPING, Value::as_object, diags) else {
            return;
        };
        let path = "problem_pattern";

        // Category values are checked against the taxonomy in pass 4
        req(pattern, path, "category", STRING, Value::as_str, diags);
        req(pattern, path, "description", STRING, Value::as_str, diags);
        if let Some(subs) = opt(pattern, path, "sub_patterns", SEQUENCE, Value::as_array, diags) {
            string_items(subs, &child_path(path, "sub_patterns"), diags);
        }

        let analogs_path = child_path(path, "analogous_domains");
        if let Some(analogs) = opt(pattern, path, "analogous_domains", SEQUENCE, Value::as_array, diags) {
            for (item_path, analog) in mapping_items(analogs, &analogs_path, diags) {
                req(analog, &item_path, "domain", STRING, Value::as_str, diags);
                req_number(analog, &item_path, "similarity", diags);
                opt(analog, &item_path, "notes", STRING, Value::as_str, diags);
            }
        }
    }

    fn check_behavior(&self, root: &Mapping, diags: &mut Diagnostics) {
        let Some(behavior) = req(root, "", "behavior", MAPPING, Value::as_object, diags) else {
            return;
        };
        let path = "behavior";

        let trigger_path = child_path(path, "trigger");
        if let Some(trigger) = req(behavior, path, "trigger", MAPPING, Value::as_object, diags) {
            if let Some(kind) = req(trigger, &trigger_path, "type", STRING, Value::as_str, diags) {
                check_enum(kind, &TriggerType::NAMES, &child_path(&trigger_path, "type"), "UNKNOWN_TRIGGER_TYPE", diags);
            }
        }

        for key in ["inputs", "outputs"] {
            let ports_path = child_path(path, key);
            let Some(ports) = req(behavior, path, key, SEQUENCE, Value::as_array, diags) else {
                continue;
            };
            if ports.is_empty() {
                diags.structural(&ports_path, "EMPTY_SEQUENCE", format!("'{}' must list at least one entry", ports_path));
            }
            for (item_path, port) in mapping_items(ports, &ports_path, diags) {
                req(port, &item_path, "name", STRING, Value::as_str, diags);
                req(port, &item_path, "type", STRING, Value::as_str, diags);
                req(port, &item_path, "description", STRING, Value::as_str, diags);
            }
        }

        let reasoning_path = child_path(path, "reasoning");
        let Some(reasoning) = opt(behavior, path, "reasoning", MAPPING, Value::as_object, diags) else {
            return;
        };
        opt(reasoning, &reasoning_path, "method", STRING, Value::as_str, diags);
        opt(reasoning, &reasoning_path, "approach", STRING, Value::as_str, diags);

        let objectives_path = child_path(&reasoning_path, "objectives");
        if let Some(objectives) = opt(reasoning, &reasoning_path, "objectives", SEQUENCE, Value::as_array, diags) {
            for (i, objective) in objectives.iter().enumerate() {
                let item_path = index_path(&objectives_path, i);
                match objective {
                    Value::String(_) => {}
                    Value::Object(obj) => {
                        req(obj, &item_path, "name", STRING, Value::as_str, diags);
                        opt_number(obj, &item_path, "weight", diags);
                        opt(obj, &item_path, "description", STRING, Value::as_str, diags);
                    }
                    _ => diags.wrong_type(&item_path, "a string or a mapping"),
                }
            }
        }
    }

    fn check_assumptions(&self, root: &Mapping, diags: &mut Diagnostics) {
        let Some(assumptions) = req(root, "", "domain_assumptions", MAPPING, Value::as_object, diags) else {
            return;
        };
        let path = "domain_assumptions";

        for category in AssumptionCategory::ALL {
            let key = category.section_key();
            let section_path = child_path(path, key);
            let Some(section) = opt(assumptions, path, key, SEQUENCE, Value::as_array, diags) else {
                continue;
            };
            for (item_path, assumption) in mapping_items(section, &section_path, diags) {
                if let Some(id) = req(assumption, &item_path, "id", STRING, Value::as_str, diags) {
                    if !self.assumption_id.is_match(id) {
                        diags.structural(
                            &child_path(&item_path, "id"),
                            "INVALID_ASSUMPTION_ID",
                            format!("Assumption id '{}' must look like XX-NNN", id),
                        );
                    }
                }
                req(assumption, &item_path, "assumption", STRING, Value::as_str, diags);
                if let Some(strength) = req(assumption, &item_path, "strength", STRING, Value::as_str, diags) {
                    check_enum(strength, &AssumptionStrength::NAMES, &child_path(&item_path, "strength"), "UNKNOWN_STRENGTH", diags);
                }
                opt(assumption, &item_path, "adaptation_note", STRING, Value::as_str, diags);
            }
        }
    }

    fn check_adaptation_points(&self, root: &Mapping, diags: &mut Diagnostics) {
        let Some(points) = req(root, "", "adaptation_points", SEQUENCE, Value::as_array, diags) else {
            return;
        };

        for (path, point) in mapping_items(points, "adaptation_points", diags) {
            req(point, &path, "id", STRING, Value::as_str, diags);
            req(point, &path, "name", STRING, Value::as_str, diags);
            let kind = req(point, &path, "type", STRING, Value::as_str, diags);
            if let Some(kind) = kind {
                check_enum(kind, &AdaptationPointType::NAMES, &child_path(&path, "type"), "UNKNOWN_ADAPTATION_TYPE", diags);
            }

            let interface = opt(point, &path, "interface", STRING, Value::as_str, diags);
            if kind == Some("swappable_component") && present(point, "interface").is_none() {
                diags.structural(
                    &child_path(&path, "interface"),
                    "MISSING_FIELD",
                    "Swappable components must name the interface they implement",
                );
            } else if interface == Some("") {
                diags.structural(&child_path(&path, "interface"), "EMPTY_INTERFACE", "Interface name must not be empty");
            }

            let params_path = child_path(&path, "parameters");
            if let Some(params) = opt(point, &path, "parameters", SEQUENCE, Value::as_array, diags) {
                for (param_path, param) in mapping_items(params, &params_path, diags) {
                    req(param, &param_path, "name", STRING, Value::as_str, diags);
                    if let Some(range) = present(param, "range") {
                        if range_bounds(range).is_none() {
                            diags.structural(
                                &child_path(&param_path, "range"),
                                "INVALID_RANGE",
                                "Parameter range must be [min, max] or a mapping with numeric min and max",
                            );
                        }
                    }
                    opt(param, &param_path, "description", STRING, Value::as_str, diags);
                }
            }

            let alts_path = child_path(&path, "suggested_alternatives");
            if let Some(alts) = opt(point, &path, "suggested_alternatives", SEQUENCE, Value::as_array, diags) {
                for (alt_path, alt) in mapping_items(alts, &alts_path, diags) {
                    req(alt, &alt_path, "name", STRING, Value::as_str, diags);
                    opt(alt, &alt_path, "domain", STRING, Value::as_str, diags);
                    opt(alt, &alt_path, "description", STRING, Value::as_str, diags);
                }
            }
        }
    }

    fn check_composition(&self, root: &Mapping, diags: &mut Diagnostics) {
        let Some(composition) = opt(root, "", "composition", MAPPING, Value::as_object, diags) else {
            return;
        };
        let path = "composition";

        // Reference syntax is the resolver's concern; only shape is checked here
        for key in ["delegates_to", "orchestrated_by"] {
            let links_path = child_path(path, key);
            if let Some(links) = opt(composition, path, key, SEQUENCE, Value::as_array, diags) {
                for (link_path, link) in mapping_items(links, &links_path, diags) {
                    required(link, &link_path, "behavior", diags);
                    opt(link, &link_path, "interface", STRING, Value::as_str, diags);
                    opt(link, &link_path, "required", BOOLEAN, Value::as_bool_ref, diags);
                }
            }
        }

        let emits_path = child_path(path, "emits");
        if let Some(emits) = opt(composition, path, "emits", SEQUENCE, Value::as_array, diags) {
            for (item_path, emission) in mapping_items(emits, &emits_path, diags) {
                req(emission, &item_path, "event", STRING, Value::as_str, diags);
            }
        }

        let listens_path = child_path(path, "listens_to");
        if let Some(listens) = opt(composition, path, "listens_to", SEQUENCE, Value::as_array, diags) {
            for (item_path, subscription) in mapping_items(listens, &listens_path, diags) {
                req(subscription, &item_path, "event", STRING, Value::as_str, diags);
                opt(subscription, &item_path, "required", BOOLEAN, Value::as_bool_ref, diags);
            }
        }
    }

    fn check_trust(&self, root: &Mapping, diags: &mut Diagnostics) {
        let Some(trust) = req(root, "", "trust", MAPPING, Value::as_object, diags) else {
            return;
        };
        let path = "trust";

        let modes_path = child_path(path, "failure_modes");
        if let Some(modes) = opt(trust, path, "failure_modes", SEQUENCE, Value::as_array, diags) {
            for (item_path, mode) in mapping_items(modes, &modes_path, diags) {
                req(mode, &item_path, "id", STRING, Value::as_str, diags);
                req(mode, &item_path, "scenario", STRING, Value::as_str, diags);
                for key in ["impact", "mitigation", "category"] {
                    opt(mode, &item_path, key, STRING, Value::as_str, diags);
                }
                if let Some(severity) = opt(mode, &item_path, "severity", STRING, Value::as_str, diags) {
                    check_enum(severity, &FailureSeverity::NAMES, &child_path(&item_path, "severity"), "UNKNOWN_SEVERITY", diags);
                }
                let by_domain_path = child_path(&item_path, "severity_by_domain");
                if let Some(by_domain) = opt(mode, &item_path, "severity_by_domain", MAPPING, Value::as_object, diags) {
                    for (domain, severity) in by_domain {
                        if !severity.is_string() {
                            diags.wrong_type(&child_path(&by_domain_path, domain), STRING);
                        }
                    }
                }
            }
        }

        let flags_path = child_path(path, "ethical_flags");
        if let Some(flags) = opt(trust, path, "ethical_flags", SEQUENCE, Value::as_array, diags) {
            for (item_path, flag) in mapping_items(flags, &flags_path, diags) {
                opt(flag, &item_path, "concern", STRING, Value::as_str, diags);
                opt(flag, &item_path, "recommendation", STRING, Value::as_str, diags);
            }
        }

        opt(trust, path, "performance", MAPPING, Value::as_object, diags);
        opt(trust, path, "observability", MAPPING, Value::as_object, diags);
    }

    fn check_provenance(&self, root: &Mapping, diags: &mut Diagnostics) {
        let Some(provenance) = opt(root, "", "provenance", MAPPING, Value::as_object, diags) else {
            return;
        };
        let path = "provenance";

        let origin_path = child_path(path, "origin");
        if let Some(origin) = opt(provenance, path, "origin", MAPPING, Value::as_object, diags) {
            req(origin, &origin_path, "domain", STRING, Value::as_str, diags);
            opt(origin, &origin_path, "organization", STRING, Value::as_str, diags);
            opt(origin, &origin_path, "use_case", STRING, Value::as_str, diags);
        }

        let lineage_path = child_path(path, "lineage");
        if let Some(lineage) = opt(provenance, path, "lineage", SEQUENCE, Value::as_array, diags) {
            for (item_path, entry) in mapping_items(lineage, &lineage_path, diags) {
                if let Some(version) = req(entry, &item_path, "version", STRING, Value::as_str, diags) {
                    check_semver(version, &child_path(&item_path, "version"), diags);
                }
                if let Some(date) = req(entry, &item_path, "date", STRING, Value::as_str, diags) {
                    check_date(date, &child_path(&item_path, "date"), diags);
                }
                opt(entry, &item_path, "domain", STRING, Value::as_str, diags);
                opt(entry, &item_path, "notes", STRING, Value::as_str, diags);
                // Element ids are resolved against the card by the resolver
                opt(entry, &item_path, "adaptation_points_changed", SEQUENCE, Value::as_array, diags);
                opt(entry, &item_path, "assumptions_changed", SEQUENCE, Value::as_array, diags);
            }
        }

        let compat_path = child_path(path, "compatibility");
        if let Some(compat) = opt(provenance, path, "compatibility", SEQUENCE, Value::as_array, diags) {
            for (item_path, entry) in mapping_items(compat, &compat_path, diags) {
                req(entry, &item_path, "framework", STRING, Value::as_str, diags);
                opt(entry, &item_path, "versions", STRING, Value::as_str, diags);
            }
        }
    }

    // =========================================================================
    // Pass 2: identifier uniqueness
    // =========================================================================

    fn check_unique_ids(&self, root: &Mapping, diags: &mut Diagnostics) {
        if let Some(assumptions) = section(root, "domain_assumptions") {
            let ids = AssumptionCategory::ALL.into_iter().flat_map(|category| {
                let key = category.section_key();
                let base = child_path("domain_assumptions", key);
                items(assumptions, key).map(move |(i, item)| (child_path(&index_path(&base, i), "id"), item))
            });
            report_duplicates(ids, "Assumption", diags);
        }

        let points = items(root, "adaptation_points")
            .map(|(i, item)| (child_path(&index_path("adaptation_points", i), "id"), item));
        report_duplicates(points, "Adaptation point", diags);
    }

    // =========================================================================
    // Pass 3: ranges
    // =========================================================================

    fn check_ranges(&self, root: &Mapping, diags: &mut Diagnostics) {
        if let Some(pattern) = section(root, "problem_pattern") {
            for (i, analog) in items(pattern, "analogous_domains") {
                let Some(similarity) = analog.get("similarity").and_then(Value::as_f64) else {
                    continue;
                };
                if !(0.0..=1.0).contains(&similarity) {
                    diags.range(
                        &child_path(&index_path("problem_pattern.analogous_domains", i), "similarity"),
                        "SIMILARITY_OUT_OF_RANGE",
                        format!("Similarity {} must be between 0.0 and 1.0", similarity),
                    );
                }
            }
        }

        let objectives = section(root, "behavior")
            .and_then(|b| section(b, "reasoning"))
            .and_then(|r| r.get("objectives"))
            .and_then(Value::as_array);
        if let Some(objectives) = objectives {
            let path = "behavior.reasoning.objectives";
            let mut total = 0.0;
            let mut weighted = false;
            for (i, objective) in objectives.iter().enumerate() {
                let Some(weight) = objective.get("weight").and_then(Value::as_f64) else {
                    continue;
                };
                weighted = true;
                total += weight;
                if weight < 0.0 {
                    diags.range(
                        &child_path(&index_path(path, i), "weight"),
                        "NEGATIVE_WEIGHT",
                        format!("Objective weight {} must not be negative", weight),
                    );
                }
            }
            if weighted && (total - 1.0).abs() > self.weight_tolerance {
                diags.warning(
                    path,
                    "WEIGHT_SUM",
                    format!("Objective weights sum to {:.3}, expected 1.0", total),
                );
            }
        }

        for (i, point) in items(root, "adaptation_points") {
            let params_path = child_path(&index_path("adaptation_points", i), "parameters");
            for (j, param) in items(point, "parameters") {
                let Some((min, max)) = param.get("range").and_then(range_bounds) else {
                    continue;
                };
                if min > max {
                    diags.range(
                        &child_path(&index_path(&params_path, j), "range"),
                        "INVERTED_RANGE",
                        format!("Parameter range minimum {} exceeds maximum {}", min, max),
                    );
                }
            }
        }
    }

    // =========================================================================
    // Pass 4: taxonomy
    // =========================================================================

    fn check_taxonomy(&self, root: &Mapping, diags: &mut Diagnostics) {
        let category = section(root, "problem_pattern")
            .and_then(|p| p.get("category"))
            .and_then(Value::as_str);
        if let Some(category) = category {
            if ProblemCategory::parse(category).is_none() {
                diags.taxonomy(
                    "problem_pattern.category",
                    "UNKNOWN_CATEGORY",
                    format!("Unknown problem category '{}'; use a taxonomy category or 'custom'", category),
                );
            }
        }
    }

    // =========================================================================
    // Pass 5: cross-section non-emptiness
    // =========================================================================

    fn check_non_empty(&self, root: &Mapping, diags: &mut Diagnostics) {
        if let Some(assumptions) = section(root, "domain_assumptions") {
            let count: usize = AssumptionCategory::ALL
                .iter()
                .filter_map(|c| assumptions.get(c.section_key()).and_then(Value::as_array))
                .map(Vec::len)
                .sum();
            if count == 0 {
                diags.structural(
                    "domain_assumptions",
                    "NO_ASSUMPTIONS",
                    "A card must declare at least one domain assumption",
                );
            }
        }

        if root.get("adaptation_points").and_then(Value::as_array).is_some_and(Vec::is_empty) {
            diags.structural(
                "adaptation_points",
                "NO_ADAPTATION_POINTS",
                "A card must declare at least one adaptation point",
            );
        }
    }

    // =========================================================================
    // Quality warnings
    // =========================================================================

    fn check_quality(&self, root: &Mapping, diags: &mut Diagnostics) {
        if let Some(assumptions) = section(root, "domain_assumptions") {
            for category in AssumptionCategory::ALL {
                let key = category.section_key();
                let base = child_path("domain_assumptions", key);
                for (i, assumption) in items(assumptions, key) {
                    let hard = assumption.get("strength").and_then(Value::as_str) == Some("hard");
                    if hard && non_empty_str(assumption, "adaptation_note").is_none() {
                        diags.warning(
                            &child_path(&index_path(&base, i), "adaptation_note"),
                            "MISSING_ADAPTATION_NOTE",
                            "Hard assumptions should explain how to adapt when they do not hold",
                        );
                    }
                }
            }
        }

        for (i, point) in items(root, "adaptation_points") {
            let path = index_path("adaptation_points", i);
            if let Some(id) = point.get("id").and_then(Value::as_str) {
                if !self.adaptation_point_id.is_match(id) {
                    diags.warning(
                        &child_path(&path, "id"),
                        "AP_ID_FORMAT",
                        format!("Adaptation point id '{}' should look like AP-NNN", id),
                    );
                }
            }
            match point.get("type").and_then(Value::as_str) {
                Some("swappable_component") if is_empty_seq(point, "suggested_alternatives") => {
                    diags.warning(
                        &child_path(&path, "suggested_alternatives"),
                        "NO_ALTERNATIVES",
                        "Swappable components should suggest at least one alternative",
                    );
                }
                Some("configurable") if is_empty_seq(point, "parameters") => {
                    diags.warning(
                        &child_path(&path, "parameters"),
                        "NO_PARAMETERS",
                        "Configurable points should list their parameters",
                    );
                }
                _ => {}
            }
        }

        if let Some(trust) = section(root, "trust") {
            for (i, mode) in items(trust, "failure_modes") {
                let Some(id) = mode.get("id").and_then(Value::as_str) else {
                    continue;
                };
                if !self.failure_mode_id.is_match(id) {
                    diags.warning(
                        &child_path(&index_path("trust.failure_modes", i), "id"),
                        "FM_ID_FORMAT",
                        format!("Failure mode id '{}' should look like FM-NNN", id),
                    );
                }
            }
        }
    }
}

// =============================================================================
// Field helpers
// =============================================================================

/// Field value, treating an explicit null as absent
fn present<'a>(obj: &'a Mapping, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn required<'a>(obj: &'a Mapping, path: &str, key: &str, diags: &mut Diagnostics) -> Option<&'a Value> {
    let value = present(obj, key);
    if value.is_none() {
        diags.missing(&child_path(path, key));
    }
    value
}

/// Required field of a given shape
fn req<'a, T: ?Sized>(
    obj: &'a Mapping,
    path: &str,
    key: &str,
    expected: &str,
    cast: impl Fn(&'a Value) -> Option<&'a T>,
    diags: &mut Diagnostics,
) -> Option<&'a T> {
    let value = required(obj, path, key, diags)?;
    let cast = cast(value);
    if cast.is_none() {
        diags.wrong_type(&child_path(path, key), expected);
    }
    cast
}

/// Optional field of a given shape; absent is fine, the wrong shape is not
fn opt<'a, T: ?Sized>(
    obj: &'a Mapping,
    path: &str,
    key: &str,
    expected: &str,
    cast: impl Fn(&'a Value) -> Option<&'a T>,
    diags: &mut Diagnostics,
) -> Option<&'a T> {
    let value = present(obj, key)?;
    let cast = cast(value);
    if cast.is_none() {
        diags.wrong_type(&child_path(path, key), expected);
    }
    cast
}

fn req_number(obj: &Mapping, path: &str, key: &str, diags: &mut Diagnostics) -> Option<f64> {
    let value = required(obj, path, key, diags)?;
    number(value, &child_path(path, key), diags)
}

fn opt_number(obj: &Mapping, path: &str, key: &str, diags: &mut Diagnostics) -> Option<f64> {
    let value = present(obj, key)?;
    number(value, &child_path(path, key), diags)
}

fn number(value: &Value, path: &str, diags: &mut Diagnostics) -> Option<f64> {
    let n = value.as_f64();
    if n.is_none() {
        diags.wrong_type(path, NUMBER);
    }
    n
}

/// Sequence elements that are mappings, with their paths; reports the rest
fn mapping_items<'a>(seq: &'a [Value], path: &str, diags: &mut Diagnostics) -> Vec<(String, &'a Mapping)> {
    let mut out = Vec::with_capacity(seq.len());
    for (i, item) in seq.iter().enumerate() {
        let item_path = index_path(path, i);
        match item.as_object() {
            Some(obj) => out.push((item_path, obj)),
            None => diags.wrong_type(&item_path, MAPPING),
        }
    }
    out
}

fn string_items(seq: &[Value], path: &str, diags: &mut Diagnostics) {
    for (i, item) in seq.iter().enumerate() {
        if !item.is_string() {
            diags.wrong_type(&index_path(path, i), STRING);
        }
    }
}

fn check_enum(value: &str, allowed: &[&str], path: &str, code: &str, diags: &mut Diagnostics) {
    if !allowed.contains(&value) {
        diags.taxonomy(
            path,
            code,
            format!("Unknown value '{}'. Must be one of: {}", value, allowed.join(", ")),
        );
    }
}

fn check_semver(version: &str, path: &str, diags: &mut Diagnostics) {
    if semver::Version::parse(version).is_err() {
        diags.structural(
            path,
            "INVALID_SEMVER",
            format!("Version '{}' must be MAJOR.MINOR.PATCH", version),
        );
    }
}

fn check_date(date: &str, path: &str, diags: &mut Diagnostics) {
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        diags.structural(path, "INVALID_DATE", format!("Date '{}' must be YYYY-MM-DD", date));
    }
}

/// `[min, max]` or `{min, max}` with numeric bounds
fn range_bounds(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Array(pair) if pair.len() == 2 => Some((pair[0].as_f64()?, pair[1].as_f64()?)),
        Value::Object(obj) => Some((obj.get("min")?.as_f64()?, obj.get("max")?.as_f64()?)),
        _ => None,
    }
}

fn report_duplicates<'a>(
    entries: impl Iterator<Item = (String, &'a Mapping)>,
    what: &str,
    diags: &mut Diagnostics,
) {
    let mut seen: HashMap<&str, String> = HashMap::new();
    for (path, item) in entries {
        let Some(id) = item.get("id").and_then(Value::as_str) else {
            continue;
        };
        match seen.get(id) {
            Some(first) => diags.structural(
                &path,
                "DUPLICATE_ID",
                format!("{} id '{}' is already declared at {}", what, id, first),
            ),
            None => {
                seen.insert(id, path);
            }
        }
    }
}

// Lenient accessors for passes that run after the structure check

fn section<'a>(obj: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    obj.get(key).and_then(Value::as_object)
}

fn items<'a>(obj: &'a Mapping, key: &str) -> impl Iterator<Item = (usize, &'a Mapping)> {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(i, v)| v.as_object().map(|m| (i, m)))
}

fn non_empty_str<'a>(obj: &'a Mapping, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

fn is_empty_seq(obj: &Mapping, key: &str) -> bool {
    obj.get(key).and_then(Value::as_array).map_or(true, Vec::is_empty)
}

/// `Value::as_bool` returns by value; adapt it for [`opt`]
trait AsBoolRef {
    fn as_bool_ref(&self) -> Option<&bool>;
}

impl AsBoolRef for Value {
    fn as_bool_ref(&self) -> Option<&bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::fixtures::{card, remove, set};
    use serde_json::json;

    fn codes(result: &ValidationResult) -> Vec<&str> {
        result.diagnostics().all().iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_valid_card_has_no_diagnostics() {
        let result = validate(&card("inventory-rebalance-optimizer", "1.0.0"));
        assert!(result.is_valid());
        assert!(result.diagnostics().is_empty(), "{}", result.diagnostics());
    }

    #[test]
    fn test_non_mapping_root_short_circuits() {
        let result = validate(&json!(["not", "a", "card"]));
        assert!(!result.is_valid());
        assert_eq!(codes(&result), vec!["NOT_A_MAPPING"]);
        assert_eq!(result.diagnostics().all()[0].path, "");
    }

    #[test]
    fn test_missing_required_field_reports_path() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        remove(&mut doc, "/identity/authors");

        let result = validate(&doc);
        assert!(!result.is_valid());
        let diag = result.diagnostics().at_path("identity.authors").next().unwrap();
        assert_eq!(diag.kind, DiagnosticKind::Structural);
        assert_eq!(diag.code, "MISSING_FIELD");
    }

    #[test]
    fn test_wrong_type_is_structural() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/behavior/inputs", json!("stock levels"));

        let result = validate(&doc);
        let diag = result.diagnostics().at_path("behavior.inputs").next().unwrap();
        assert_eq!(diag.kind, DiagnosticKind::Structural);
        assert_eq!(diag.code, "WRONG_TYPE");
    }

    #[test]
    fn test_numeric_format_version_is_accepted() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/abc_version", json!(0.1));
        let result = validate(&doc);
        assert!(result.is_valid(), "{}", result.diagnostics());

        set(&mut doc, "/abc_version", json!(["0.1"]));
        let result = validate(&doc);
        let diag = result.diagnostics().at_path("abc_version").next().unwrap();
        assert_eq!(diag.code, "WRONG_TYPE");
    }

    #[test]
    fn test_similarity_out_of_range() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/problem_pattern/analogous_domains/0/similarity", json!(1.5));

        let result = validate(&doc);
        assert!(!result.is_valid());
        let diag = result
            .diagnostics()
            .at_path("problem_pattern.analogous_domains[0].similarity")
            .next()
            .unwrap();
        assert_eq!(diag.kind, DiagnosticKind::Range);
    }

    #[test]
    fn test_unknown_category_is_taxonomy_error() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/problem_pattern/category", json!("resource-juggling"));

        let result = validate(&doc);
        assert_eq!(result.diagnostics().of_kind(DiagnosticKind::Taxonomy).count(), 1);
        assert!(codes(&result).contains(&"UNKNOWN_CATEGORY"));
    }

    #[test]
    fn test_unknown_enum_values_are_taxonomy_errors() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/domain_assumptions/data_assumptions/0/strength", json!("firm"));
        set(&mut doc, "/behavior/trigger/type", json!("hourly"));
        set(&mut doc, "/adaptation_points/1/type", json!("tunable"));
        set(&mut doc, "/trust/failure_modes/0/severity", json!("catastrophic"));

        let result = validate(&doc);
        let taxonomy: Vec<_> = result
            .diagnostics()
            .of_kind(DiagnosticKind::Taxonomy)
            .map(|d| d.path.as_str())
            .collect();
        assert_eq!(
            taxonomy,
            vec![
                "behavior.trigger.type",
                "domain_assumptions.data_assumptions[0].strength",
                "adaptation_points[1].type",
                "trust.failure_modes[0].severity",
            ]
        );
    }

    #[test]
    fn test_duplicate_assumption_ids_across_categories() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/domain_assumptions/authority_assumptions/0/id", json!("DA-001"));

        let result = validate(&doc);
        let diag = result
            .diagnostics()
            .at_path("domain_assumptions.authority_assumptions[0].id")
            .next()
            .unwrap();
        assert_eq!(diag.code, "DUPLICATE_ID");
        assert!(diag.message.contains("domain_assumptions.data_assumptions[0].id"));
    }

    #[test]
    fn test_duplicate_adaptation_point_ids() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/adaptation_points/1/id", json!("AP-001"));

        let result = validate(&doc);
        assert!(!result.is_valid());
        assert_eq!(result.diagnostics().at_path("adaptation_points[1].id").count(), 1);
    }

    #[test]
    fn test_objective_weights() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(
            &mut doc,
            "/behavior/reasoning/objectives",
            json!([{"name": "a", "weight": 0.5}, {"name": "b", "weight": 0.3}]),
        );
        let result = validate(&doc);
        assert!(result.is_valid());
        assert_eq!(codes(&result), vec!["WEIGHT_SUM"]);

        set(
            &mut doc,
            "/behavior/reasoning/objectives",
            json!([{"name": "a", "weight": 1.2}, {"name": "b", "weight": -0.2}]),
        );
        let result = validate(&doc);
        assert!(!result.is_valid());
        assert_eq!(codes(&result), vec!["NEGATIVE_WEIGHT"]);
    }

    #[test]
    fn test_weight_sum_within_tolerance() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(
            &mut doc,
            "/behavior/reasoning/objectives",
            json!(["readable objective", {"name": "a", "weight": 0.505}, {"name": "b", "weight": 0.5}]),
        );
        assert!(validate(&doc).diagnostics().is_empty());
    }

    #[test]
    fn test_inverted_parameter_range() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/adaptation_points/1/parameters/0/range", json!({"min": 10, "max": 2}));

        let result = validate(&doc);
        let diag = result
            .diagnostics()
            .at_path("adaptation_points[1].parameters[0].range")
            .next()
            .unwrap();
        assert_eq!(diag.kind, DiagnosticKind::Range);
    }

    #[test]
    fn test_requires_assumption_and_adaptation_point() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/domain_assumptions", json!({"data_assumptions": []}));
        set(&mut doc, "/adaptation_points", json!([]));

        let result = validate(&doc);
        assert!(codes(&result).contains(&"NO_ASSUMPTIONS"));
        assert!(codes(&result).contains(&"NO_ADAPTATION_POINTS"));
    }

    #[test]
    fn test_swappable_component_needs_interface() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        remove(&mut doc, "/adaptation_points/0/interface");

        let result = validate(&doc);
        assert_eq!(result.diagnostics().at_path("adaptation_points[0].interface").count(), 1);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_quality_warnings() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        remove(&mut doc, "/domain_assumptions/data_assumptions/0/adaptation_note");
        remove(&mut doc, "/adaptation_points/0/suggested_alternatives");
        set(&mut doc, "/adaptation_points/1/parameters", json!([]));
        set(&mut doc, "/adaptation_points/1/id", json!("tuning"));
        set(&mut doc, "/trust/failure_modes/0/id", json!("F1"));

        let result = validate(&doc);
        assert!(result.is_valid());
        assert_eq!(
            codes(&result),
            vec![
                "MISSING_ADAPTATION_NOTE",
                "NO_ALTERNATIVES",
                "AP_ID_FORMAT",
                "NO_PARAMETERS",
                "FM_ID_FORMAT",
            ]
        );
    }

    #[test]
    fn test_collects_all_problems_in_one_pass() {
        let mut doc = card("Inventory Optimizer", "1.0");
        set(&mut doc, "/identity/created", json!("March 2024"));
        set(&mut doc, "/domain_assumptions/environment_assumptions/0/id", json!("env-1"));
        set(&mut doc, "/problem_pattern/analogous_domains/0/similarity", json!(-0.1));

        let result = validate(&doc);
        assert_eq!(
            codes(&result),
            vec![
                "INVALID_SLUG",
                "INVALID_SEMVER",
                "INVALID_DATE",
                "INVALID_ASSUMPTION_ID",
                "SIMILARITY_OUT_OF_RANGE",
            ]
        );
    }

    #[test]
    fn test_null_optional_fields_are_absent() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/identity/license", Value::Null);
        set(&mut doc, "/composition", Value::Null);
        assert!(validate(&doc).diagnostics().is_empty());
    }

    #[test]
    fn test_configured_tolerance() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(
            &mut doc,
            "/behavior/reasoning/objectives",
            json!([{"name": "a", "weight": 0.55}, {"name": "b", "weight": 0.5}]),
        );
        let strict = CardValidator::new();
        let loose = CardValidator::with_config(&ValidationConfig { weight_tolerance: 0.1 });
        assert_eq!(strict.validate(&doc).diagnostics().warning_count(), 1);
        assert!(loose.validate(&doc).diagnostics().is_empty());
    }
}
