//! Diagnostics
//!
//! Collects errors and warnings found while validating and resolving a card.
//! Every check reports into a [`Diagnostics`] list instead of failing fast, so
//! a contributor sees every problem in a single pass.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Kinds
// =============================================================================

/// Kind of problem found in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Malformed, missing, or mistyped field
    Structural,
    /// Numeric value outside its declared bounds
    Range,
    /// Dangling or malformed reference
    Reference,
    /// Unrecognized enum or category value
    Taxonomy,
    /// Soft issue surfaced for human review
    Warning,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Range => "range",
            Self::Reference => "reference",
            Self::Taxonomy => "taxonomy",
            Self::Warning => "warning",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Structural | Self::Range | Self::Reference | Self::Taxonomy => Severity::Error,
            Self::Warning => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic
// =============================================================================

/// A single diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Dotted/indexed path into the document, e.g. `adaptation_points[1].interface`
    pub path: String,
    pub kind: DiagnosticKind,
    /// Stable machine-readable code, e.g. `MISSING_FIELD`
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        path: impl Into<String>,
        kind: DiagnosticKind,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        write!(f, "[{}] {} {}: {}", self.code, self.kind, path, self.message)
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Ordered collection of diagnostics from one validation or resolution pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Diagnostic) {
        self.items.push(item);
    }

    pub fn structural(&mut self, path: &str, code: &str, message: impl Into<String>) {
        self.push(Diagnostic::new(path, DiagnosticKind::Structural, code, message));
    }

    pub fn range(&mut self, path: &str, code: &str, message: impl Into<String>) {
        self.push(Diagnostic::new(path, DiagnosticKind::Range, code, message));
    }

    pub fn reference(&mut self, path: &str, code: &str, message: impl Into<String>) {
        self.push(Diagnostic::new(path, DiagnosticKind::Reference, code, message));
    }

    pub fn taxonomy(&mut self, path: &str, code: &str, message: impl Into<String>) {
        self.push(Diagnostic::new(path, DiagnosticKind::Taxonomy, code, message));
    }

    pub fn warning(&mut self, path: &str, code: &str, message: impl Into<String>) {
        self.push(Diagnostic::new(path, DiagnosticKind::Warning, code, message));
    }

    /// Record a missing required field
    pub fn missing(&mut self, path: &str) {
        self.structural(path, "MISSING_FIELD", format!("Required field '{}' is missing", path));
    }

    /// Record a field with the wrong type
    pub fn wrong_type(&mut self, path: &str, expected: &str) {
        self.structural(path, "WRONG_TYPE", format!("Field '{}' must be {}", path, expected));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_error())
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn at_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.items.iter().filter(move |d| d.path == path)
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another collection into this one, keeping order
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Split into (errors, warnings)
    pub fn partition(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        self.items.into_iter().partition(Diagnostic::is_error)
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(items: Vec<Diagnostic>) -> Self {
        Self { items }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// =============================================================================
// Path helpers
// =============================================================================

/// Path of a named child field
pub fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// Path of a sequence element
pub fn index_path(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_severity() {
        assert_eq!(DiagnosticKind::Structural.severity(), Severity::Error);
        assert_eq!(DiagnosticKind::Taxonomy.severity(), Severity::Error);
        assert_eq!(DiagnosticKind::Warning.severity(), Severity::Warning);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.missing("identity.name");
        diags.warning("behavior.reasoning.objectives", "WEIGHT_SUM", "weights sum to 0.9");

        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.has_errors());
        assert_eq!(diags.at_path("identity.name").count(), 1);

        let (errors, warnings) = diags.partition();
        assert_eq!(errors[0].code, "MISSING_FIELD");
        assert_eq!(warnings[0].kind, DiagnosticKind::Warning);
    }

    #[test]
    fn test_paths() {
        assert_eq!(child_path("", "identity"), "identity");
        assert_eq!(child_path("identity", "name"), "identity.name");
        assert_eq!(index_path("adaptation_points", 2), "adaptation_points[2]");
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::new("", DiagnosticKind::Structural, "NOT_A_MAPPING", "document must be a mapping");
        assert_eq!(d.to_string(), "[NOT_A_MAPPING] structural <root>: document must be a mapping");
    }
}
