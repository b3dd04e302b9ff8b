//! Card versioning and identity

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic version of a published card
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardVersion(pub Version);

impl CardVersion {
    /// Parse a version string, tolerating a leading `v`
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        Version::parse(version_str).map(Self)
    }
}

impl fmt::Display for CardVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a published card: `(name, version)`
///
/// Versions are append-only, so two cards with the same identity are the
/// same publication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardIdentity {
    pub name: String,
    pub version: CardVersion,
}

impl CardIdentity {
    pub fn new(name: impl Into<String>, version: CardVersion) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse `name@version`
    pub fn parse(s: &str) -> Option<Self> {
        let (name, version) = s.split_once('@')?;
        let version = CardVersion::parse(version).ok()?;
        Some(Self::new(name, version))
    }
}

impl fmt::Display for CardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
