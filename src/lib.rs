//! Agent Behavior Cards
//!
//! Toolkit for Agent Behavior Cards: structured, versioned documents that
//! describe an automated decision behavior (the problem it solves, the domain
//! assumptions it relies on, where it can be adapted) so the behavior can be
//! reused in a different domain.
//!
//! ## Features
//!
//! - **Validation**: Every problem in a card document is reported at once, with its path
//! - **Reference Resolution**: Lineage and composition references are checked against the card
//! - **Compatibility Scoring**: Symmetric 0..1 score for reusing one card's behavior in another's domain
//! - **Registry Index**: Append-only, concurrently readable index with filtered and fuzzy queries
//! - **Composition Graph**: Which indexed cards delegate to or listen to each other
//! - **Compliance Scoring**: Documentation completeness and trust-framework grading
//!
//! ## Pipeline
//!
//! ```text
//! YAML/JSON ──► loader ──► validate ──► resolve ──► AcceptedCard
//!                                                       │
//!                              ┌────────────────────────┼──────────────┐
//!                              ▼                        ▼              ▼
//!                        score (pairs)         RegistryIndex      compliance
//!                                             (query, similar,
//!                                              composition graph)
//! ```
//!
//! Only an [`AcceptedCard`] can be scored or indexed.

pub mod card;
pub mod checksum;
pub mod compliance;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod resolve;
pub mod score;
pub mod validate;
pub mod version;

#[cfg(test)]
mod fixtures;

pub use card::{AssumptionCategory, AssumptionStrength, BehaviorCard, ProblemCategory};
pub use checksum::Checksum;
pub use compliance::{ComplianceChecker, ComplianceLevel, ComplianceReport};
pub use config::CardConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{CardError, Result};
pub use graph::{CompositionEdge, CompositionGraph};
pub use index::{CardFilter, IndexSnapshot, IndexedCard, RegistryIndex, SimilarCard, SortKey};
pub use loader::{load_dir, load_file, load_path, parse_document, DocumentFormat};
pub use pipeline::{accept, AcceptedCard, CardPipeline, Rejection};
pub use resolve::{resolve, ReferenceResolver, ResolutionResult};
pub use score::{score, CompatibilityReport, CompatibilityScorer};
pub use validate::{validate, CardValidator, ValidationResult};
pub use version::{CardIdentity, CardVersion};
