//! Reference Resolver
//!
//! Checks every identifier a card uses to point at something else:
//!
//! - lineage entries name adaptation points and assumptions that must exist
//!   in the same card
//! - composition links and event sources name other behaviors; those only
//!   need to be well-formed, since the registry is never consulted here
//!
//! The document is never modified.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::card::AssumptionCategory;
use crate::diagnostics::{child_path, index_path, Diagnostics};

/// Prefix of a behavior reference naming a problem category instead of a card
pub const PATTERN_PREFIX: &str = "pattern:";

/// Outcome of resolving one document's references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub diagnostics: Diagnostics,
}

impl ResolutionResult {
    pub fn is_resolved(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Resolve a document's references with the default resolver
pub fn resolve(document: &Value) -> ResolutionResult {
    ReferenceResolver::new().resolve(document)
}

pub struct ReferenceResolver {
    /// Slug with optional `pattern:` prefix and `*` wildcard segments
    behavior_ref: Regex,
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self {
            behavior_ref: Regex::new(r"^(pattern:)?[a-z0-9*]+(-[a-z0-9*]+)*$").unwrap(),
        }
    }

    /// Check that a string is a well-formed behavior reference
    pub fn is_behavior_ref(&self, reference: &str) -> bool {
        self.behavior_ref.is_match(reference)
    }

    pub fn resolve(&self, document: &Value) -> ResolutionResult {
        let mut diags = Diagnostics::new();
        if let Some(root) = document.as_object() {
            self.resolve_lineage(root, &mut diags);
            self.resolve_composition(root, &mut diags);
        }
        ResolutionResult { diagnostics: diags }
    }

    fn resolve_lineage(&self, root: &Map<String, Value>, diags: &mut Diagnostics) {
        let Some(lineage) = root
            .get("provenance")
            .and_then(|p| p.get("lineage"))
            .and_then(Value::as_array)
        else {
            return;
        };

        let point_ids = adaptation_point_ids(root);
        let assumption_ids = assumption_ids(root);

        for (i, entry) in lineage.iter().enumerate() {
            let entry_path = index_path("provenance.lineage", i);
            let checks = [
                ("adaptation_points_changed", &point_ids, "adaptation point"),
                ("assumptions_changed", &assumption_ids, "assumption"),
            ];
            for (key, known, what) in checks {
                let Some(ids) = entry.get(key).and_then(Value::as_array) else {
                    continue;
                };
                let list_path = child_path(&entry_path, key);
                for (j, id) in ids.iter().enumerate() {
                    let path = index_path(&list_path, j);
                    match id.as_str() {
                        Some(id) if known.contains(id) => {}
                        Some(id) => diags.reference(
                            &path,
                            "DANGLING_REFERENCE",
                            format!("Lineage names {} '{}', which this card does not declare", what, id),
                        ),
                        None => diags.reference(
                            &path,
                            "MALFORMED_REFERENCE",
                            format!("Lineage {} references must be id strings", what),
                        ),
                    }
                }
            }
        }
    }

    fn resolve_composition(&self, root: &Map<String, Value>, diags: &mut Diagnostics) {
        let Some(composition) = root.get("composition").and_then(Value::as_object) else {
            return;
        };

        let targets = [
            ("delegates_to", "behavior"),
            ("orchestrated_by", "behavior"),
            ("listens_to", "source"),
        ];
        for (list, field) in targets {
            let Some(entries) = composition.get(list).and_then(Value::as_array) else {
                continue;
            };
            let list_path = child_path("composition", list);
            for (i, entry) in entries.iter().enumerate() {
                // Missing fields are the validator's concern
                let Some(reference) = entry.get(field).filter(|v| !v.is_null()) else {
                    continue;
                };
                let path = child_path(&index_path(&list_path, i), field);
                match reference.as_str() {
                    Some(r) if self.is_behavior_ref(r) => {}
                    Some(r) => diags.reference(
                        &path,
                        "MALFORMED_REFERENCE",
                        format!(
                            "'{}' is not a behavior reference (kebab-case name, optionally prefixed '{}')",
                            r, PATTERN_PREFIX
                        ),
                    ),
                    None => diags.reference(&path, "MALFORMED_REFERENCE", "Behavior references must be strings"),
                }
            }
        }
    }
}

fn adaptation_point_ids(root: &Map<String, Value>) -> HashSet<&str> {
    root.get("adaptation_points")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|ap| ap.get("id").and_then(Value::as_str))
        .collect()
}

fn assumption_ids(root: &Map<String, Value>) -> HashSet<&str> {
    let Some(assumptions) = root.get("domain_assumptions") else {
        return HashSet::new();
    };
    AssumptionCategory::ALL
        .iter()
        .filter_map(|c| assumptions.get(c.section_key()).and_then(Value::as_array))
        .flatten()
        .filter_map(|a| a.get("id").and_then(Value::as_str))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::fixtures::{card, set};
    use serde_json::json;

    #[test]
    fn test_clean_card_resolves() {
        let result = resolve(&card("inventory-rebalance-optimizer", "1.0.0"));
        assert!(result.is_resolved());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_dangling_lineage_ids() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/provenance/lineage/0/adaptation_points_changed", json!(["AP-001", "AP-009"]));
        set(&mut doc, "/provenance/lineage/0/assumptions_changed", json!(["EA-001", "XX-404"]));

        let result = resolve(&doc);
        let paths: Vec<_> = result.diagnostics.all().iter().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "provenance.lineage[0].adaptation_points_changed[1]",
                "provenance.lineage[0].assumptions_changed[1]",
            ]
        );
        assert!(result.diagnostics.all().iter().all(|d| d.kind == DiagnosticKind::Reference));
    }

    #[test]
    fn test_behavior_reference_syntax() {
        let resolver = ReferenceResolver::new();
        assert!(resolver.is_behavior_ref("demand-forecaster"));
        assert!(resolver.is_behavior_ref("pattern:anomaly-detection-and-response"));
        assert!(resolver.is_behavior_ref("inventory-*"));
        assert!(!resolver.is_behavior_ref("Demand Forecaster"));
        assert!(!resolver.is_behavior_ref("pattern:"));
        assert!(!resolver.is_behavior_ref("demand--forecaster"));
    }

    #[test]
    fn test_malformed_composition_references() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/composition/delegates_to/0/behavior", json!("Demand Forecaster"));
        set(
            &mut doc,
            "/composition/orchestrated_by",
            json!([{"behavior": 42}, {"behavior": "pattern:adaptive-communication"}]),
        );
        set(&mut doc, "/composition/listens_to/0/source", json!("inventory_sync"));

        let result = resolve(&doc);
        let paths: Vec<_> = result.diagnostics.all().iter().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "composition.delegates_to[0].behavior",
                "composition.orchestrated_by[0].behavior",
                "composition.listens_to[0].source",
            ]
        );
    }

    #[test]
    fn test_resolution_does_not_touch_document() {
        let doc = card("inventory-rebalance-optimizer", "1.0.0");
        let before = doc.clone();
        resolve(&doc);
        assert_eq!(doc, before);
    }
}
