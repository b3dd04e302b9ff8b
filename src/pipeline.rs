//! Card acceptance
//!
//! A document becomes an [`AcceptedCard`] only after it passed the schema
//! validator and the reference resolver and decoded into the typed model.
//! Nothing outside this module can construct one, so code that takes an
//! `AcceptedCard` never sees an unchecked card.

use serde_json::Value;
use std::fmt;

use crate::card::BehaviorCard;
use crate::checksum::Checksum;
use crate::config::ValidationConfig;
use crate::diagnostics::Diagnostics;
use crate::error::CardError;
use crate::resolve::ReferenceResolver;
use crate::validate::CardValidator;
use crate::version::CardIdentity;

/// A card that passed validation and reference resolution
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedCard {
    card: BehaviorCard,
    warnings: Diagnostics,
    checksum: Checksum,
}

impl AcceptedCard {
    pub fn card(&self) -> &BehaviorCard {
        &self.card
    }

    /// Non-blocking diagnostics found while accepting the card
    pub fn warnings(&self) -> &Diagnostics {
        &self.warnings
    }

    /// Fingerprint of the accepted document
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn identity(&self) -> CardIdentity {
        self.card.identity()
    }

    pub fn into_card(self) -> BehaviorCard {
        self.card
    }
}

/// A document that failed acceptance, with every diagnostic found
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// `name@version` when the document carries one
    pub label: String,
    pub diagnostics: Diagnostics,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rejected:\n{}", self.label, self.diagnostics)
    }
}

impl std::error::Error for Rejection {}

impl From<Rejection> for CardError {
    fn from(rejection: Rejection) -> Self {
        CardError::Rejected {
            identity: rejection.label,
            errors: rejection.diagnostics.error_count(),
        }
    }
}

/// Validate, resolve and decode a document with default settings
pub fn accept(document: &Value) -> Result<AcceptedCard, Rejection> {
    CardPipeline::new().accept(document)
}

/// Validator and resolver run in sequence
#[derive(Default)]
pub struct CardPipeline {
    validator: CardValidator,
    resolver: ReferenceResolver,
}

impl CardPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ValidationConfig) -> Self {
        Self {
            validator: CardValidator::with_config(config),
            resolver: ReferenceResolver::new(),
        }
    }

    /// Every diagnostic the validator and resolver report, in that order
    pub fn check(&self, document: &Value) -> Diagnostics {
        let mut diagnostics = self.validator.validate(document).into_diagnostics();
        diagnostics.merge(self.resolver.resolve(document).diagnostics);
        diagnostics
    }

    pub fn accept(&self, document: &Value) -> Result<AcceptedCard, Rejection> {
        let label = document_label(document);
        let diagnostics = self.check(document);

        if diagnostics.has_errors() {
            tracing::debug!(
                card = %label,
                errors = diagnostics.error_count(),
                "card rejected"
            );
            return Err(Rejection { label, diagnostics });
        }

        let card: BehaviorCard = match serde_json::from_value(without_nulls(document)) {
            Ok(card) => card,
            Err(e) => {
                let mut diagnostics = diagnostics;
                diagnostics.structural("", "DECODE_FAILED", format!("Card does not decode: {}", e));
                tracing::warn!(card = %label, error = %e, "validated card failed to decode");
                return Err(Rejection { label, diagnostics });
            }
        };

        tracing::debug!(
            card = %label,
            warnings = diagnostics.warning_count(),
            "card accepted"
        );

        Ok(AcceptedCard {
            card,
            warnings: diagnostics,
            checksum: Checksum::of_document(document),
        })
    }

    /// Re-run acceptance on an already typed card
    pub fn reaccept(&self, card: &BehaviorCard) -> Result<AcceptedCard, Rejection> {
        match serde_json::to_value(card) {
            Ok(document) => self.accept(&document),
            Err(e) => {
                let mut diagnostics = Diagnostics::new();
                diagnostics.structural("", "ENCODE_FAILED", format!("Card does not encode: {}", e));
                Err(Rejection {
                    label: card.identity().to_string(),
                    diagnostics,
                })
            }
        }
    }
}

/// `name@version` from an unchecked document, as far as it can be read
pub fn document_label(document: &Value) -> String {
    let name = document
        .pointer("/identity/name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>");
    match document.pointer("/identity/version").and_then(Value::as_str) {
        Some(version) => format!("{}@{}", name, version),
        None => name.to_string(),
    }
}

/// Copy of a document with null mapping entries dropped
///
/// The validator treats a null field as absent; the typed model must agree.
fn without_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), without_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(without_nulls).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{AssumptionStrength, ProblemCategory};
    use crate::fixtures::{card, set};
    use serde_json::json;

    #[test]
    fn test_accepts_valid_card() {
        let doc = card("inventory-rebalance-optimizer", "1.0.0");
        let accepted = accept(&doc).unwrap();

        assert_eq!(accepted.identity().to_string(), "inventory-rebalance-optimizer@1.0.0");
        assert_eq!(accepted.card().category(), ProblemCategory::ConstrainedResourceAllocation);
        assert_eq!(accepted.card().domain_assumptions.hard().count(), 2);
        assert_eq!(
            accepted.card().domain_assumptions.environment[0].strength,
            AssumptionStrength::Soft
        );
        assert!(accepted.warnings().is_empty());
        assert!(accepted.checksum().verify_document(&doc));
    }

    #[test]
    fn test_rejection_carries_validator_and_resolver_diagnostics() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/problem_pattern/analogous_domains/0/similarity", json!(2.0));
        set(&mut doc, "/provenance/lineage/0/assumptions_changed", json!(["ZZ-999"]));

        let rejection = accept(&doc).unwrap_err();
        assert_eq!(rejection.label, "inventory-rebalance-optimizer@1.0.0");
        assert_eq!(rejection.diagnostics.error_count(), 2);

        let error: CardError = rejection.into();
        assert!(matches!(error, CardError::Rejected { errors: 2, .. }));
    }

    #[test]
    fn test_warnings_do_not_block() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/trust/failure_modes/0/id", json!("F-1"));

        let accepted = accept(&doc).unwrap();
        assert_eq!(accepted.warnings().warning_count(), 1);
    }

    #[test]
    fn test_nulls_decode_as_absent() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/composition", Value::Null);
        set(&mut doc, "/identity/tags", Value::Null);

        let accepted = accept(&doc).unwrap();
        assert!(accepted.card().composition.delegates_to.is_empty());
        assert!(accepted.card().identity.tags.is_empty());
    }

    #[test]
    fn test_numeric_format_version_decodes_as_text() {
        let mut doc = card("inventory-rebalance-optimizer", "1.0.0");
        set(&mut doc, "/abc_version", json!(0.1));
        let accepted = accept(&doc).unwrap_or_else(|r| panic!("{}", r));
        assert_eq!(accepted.card().abc_version, "0.1");
    }

    #[test]
    fn test_reaccept_typed_card() {
        let accepted = accept(&card("inventory-rebalance-optimizer", "1.0.0")).unwrap();
        let pipeline = CardPipeline::new();
        assert!(pipeline.reaccept(accepted.card()).is_ok());

        let mut broken = accepted.into_card();
        broken.problem_pattern.analogous_domains[0].similarity = 3.0;
        assert!(pipeline.reaccept(&broken).is_err());
    }

    #[test]
    fn test_label_of_unreadable_document() {
        assert_eq!(document_label(&json!([])), "<unnamed>");
        assert_eq!(document_label(&json!({"identity": {"name": "x"}})), "x");
    }
}
