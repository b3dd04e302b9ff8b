//! Error types for behavior card processing

use thiserror::Error;

/// Result type for card operations
pub type Result<T> = std::result::Result<T, CardError>;

/// Card toolkit errors
///
/// Malformed documents are not errors: the validator and resolver report them
/// as [`Diagnostic`](crate::diagnostics::Diagnostic) values. These variants
/// cover operational failures and programmer-error preconditions.
#[derive(Error, Debug)]
pub enum CardError {
    #[error("Card already indexed: {name} version {version}")]
    DuplicateIdentity { name: String, version: String },

    #[error("Card not found: {name} version {version}")]
    NotFound { name: String, version: String },

    #[error("Card {identity} has not been accepted ({errors} blocking diagnostic(s)); score only accepted cards")]
    Precondition { identity: String, errors: usize },

    #[error("Card {identity} rejected with {errors} error(s)")]
    Rejected { identity: String, errors: usize },

    #[error("Invalid document format: {0}")]
    InvalidFormat(String),

    #[error("Registry index lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
