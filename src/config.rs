//! Configuration management for the card toolkit
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (cards.toml)
//! - Environment variables (ABC__*)
//!
//! ## Example config file (cards.toml):
//! ```toml
//! [scoring]
//! pattern_weight = 0.4
//! assumption_weight = 0.4
//! coverage_weight = 0.2
//! soft_assumption_weight = 0.5
//! category_credit = 1.0
//! text_match_threshold = 0.5
//! max_text_tokens = 256
//!
//! [validation]
//! weight_tolerance = 0.01
//!
//! [registry]
//! cards_dir = "cards"
//! min_similar_score = 0.3
//! max_similar_results = 10
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the card toolkit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CardConfig {
    /// Compatibility scoring settings
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Registry index settings
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Compatibility scorer weights and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the problem-pattern component
    #[serde(default = "default_pattern_weight")]
    pub pattern_weight: f64,

    /// Weight of the assumption-overlap component
    #[serde(default = "default_assumption_weight")]
    pub assumption_weight: f64,

    /// Weight of the adaptation-coverage component
    #[serde(default = "default_coverage_weight")]
    pub coverage_weight: f64,

    /// Weight of a soft assumption relative to a hard one
    #[serde(default = "default_half")]
    pub soft_assumption_weight: f64,

    /// Credit for an assumption whose text has no match when the other card
    /// declares an assumption in the same category
    #[serde(default = "default_category_credit")]
    pub category_credit: f64,

    /// Text similarity at which two assumptions count as the same
    #[serde(default = "default_half")]
    pub text_match_threshold: f64,

    /// Tokens considered per text when comparing
    #[serde(default = "default_max_text_tokens")]
    pub max_text_tokens: usize,
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Allowed distance of the objective weight sum from 1.0
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,
}

/// Registry index configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory scanned for card documents
    #[serde(default = "default_cards_dir")]
    pub cards_dir: PathBuf,

    /// Lowest score reported by similar-card search
    #[serde(default = "default_min_similar_score")]
    pub min_similar_score: f64,

    /// Result cap for similar-card search
    #[serde(default = "default_max_similar_results")]
    pub max_similar_results: usize,
}

// Default value functions
fn default_pattern_weight() -> f64 {
    0.4
}

fn default_assumption_weight() -> f64 {
    0.4
}

fn default_coverage_weight() -> f64 {
    0.2
}

fn default_half() -> f64 {
    0.5
}

fn default_category_credit() -> f64 {
    1.0
}

fn default_max_text_tokens() -> usize {
    256
}

fn default_weight_tolerance() -> f64 {
    0.01
}

fn default_cards_dir() -> PathBuf {
    PathBuf::from("cards")
}

fn default_min_similar_score() -> f64 {
    0.3
}

fn default_max_similar_results() -> usize {
    10
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            pattern_weight: default_pattern_weight(),
            assumption_weight: default_assumption_weight(),
            coverage_weight: default_coverage_weight(),
            soft_assumption_weight: default_half(),
            category_credit: default_category_credit(),
            text_match_threshold: default_half(),
            max_text_tokens: default_max_text_tokens(),
        }
    }
}

impl ScoringConfig {
    /// Sum of the three component weights
    pub fn total_weight(&self) -> f64 {
        self.pattern_weight + self.assumption_weight + self.coverage_weight
    }

    /// Problems that make the scoring settings unusable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let weights = [
            ("pattern_weight", self.pattern_weight),
            ("assumption_weight", self.assumption_weight),
            ("coverage_weight", self.coverage_weight),
            ("soft_assumption_weight", self.soft_assumption_weight),
        ];
        for (name, weight) in weights {
            if weight < 0.0 {
                problems.push(format!("scoring.{} must not be negative", name));
            }
        }
        if self.total_weight() <= 0.0 {
            problems.push("scoring weights must sum to a positive value".to_string());
        }
        for (name, value) in [
            ("category_credit", self.category_credit),
            ("text_match_threshold", self.text_match_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("scoring.{} must be between 0 and 1", name));
            }
        }
        if self.max_text_tokens == 0 {
            problems.push("scoring.max_text_tokens must be at least 1".to_string());
        }
        problems
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            weight_tolerance: default_weight_tolerance(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cards_dir: default_cards_dir(),
            min_similar_score: default_min_similar_score(),
            max_similar_results: default_max_similar_results(),
        }
    }
}

impl CardConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["cards.toml", ".cards.toml", "config/cards.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(xdg_config) = Self::user_config_path() {
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // ABC__SCORING__PATTERN_WEIGHT=0.5
        builder = builder.add_source(
            Environment::with_prefix("ABC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Per-user config file in the XDG config directory
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "abc", "behavior-cards")
            .map(|dirs| dirs.config_dir().join("cards.toml"))
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Cards directory, resolved against the working directory
    pub fn cards_dir(&self) -> PathBuf {
        if self.registry.cards_dir.is_absolute() {
            self.registry.cards_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.registry.cards_dir)
        }
    }

    /// Every problem that makes this configuration unusable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = self.scoring.problems();
        if self.validation.weight_tolerance < 0.0 {
            problems.push("validation.weight_tolerance must not be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.registry.min_similar_score) {
            problems.push("registry.min_similar_score must be between 0 and 1".to_string());
        }
        problems
    }
}
