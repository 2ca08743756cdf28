//! Rubric parsing and validation.
//!
//! A rubric bounds what judges may return: per-domain maximum scores
//! plus the criteria text handed to each judge verbatim.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Fraction of the maximum score required to pass a judged run.
/// Convention carried over from the scoring rubric this replaces.
pub const DEFAULT_THRESHOLD: f64 = 0.70;

/// Errors from rubric loading.
#[derive(Error, Debug)]
pub enum RubricError {
    #[error("Failed to read rubric file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse rubric YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Rubric validation failed: {0}")]
    ValidationError(String),
}

/// One scoring domain within a rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Domain name (e.g. "backend", "security").
    pub name: String,

    /// Maximum score a judge may award for this domain.
    pub max_score: u32,

    /// Criteria text given to the judge. Opaque to the harness.
    #[serde(default)]
    pub criteria: String,
}

/// A full scoring rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    /// Scoring domains, in report order.
    pub domains: Vec<Domain>,

    /// Pass threshold as a fraction of the maximum total score.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Rubric {
    /// Parse a rubric from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, RubricError> {
        let rubric: Rubric = serde_yaml::from_str(yaml)?;
        rubric.validate()?;
        Ok(rubric)
    }

    /// Parse a rubric from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RubricError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Maximum total score across all domains.
    pub fn max_score(&self) -> u32 {
        self.domains.iter().map(|d| d.max_score).sum()
    }

    /// Look up a domain by name.
    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.name == name)
    }

    fn validate(&self) -> Result<(), RubricError> {
        if self.domains.is_empty() {
            return Err(RubricError::ValidationError("rubric has no domains".to_string()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(RubricError::ValidationError(format!(
                "threshold {} is not in [0, 1]",
                self.threshold
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for domain in &self.domains {
            if domain.name.is_empty() {
                return Err(RubricError::ValidationError("domain with empty name".to_string()));
            }
            if domain.max_score == 0 {
                return Err(RubricError::ValidationError(format!(
                    "domain '{}' has max_score 0",
                    domain.name
                )));
            }
            if !seen.insert(&domain.name) {
                return Err(RubricError::ValidationError(format!(
                    "duplicate domain: {}",
                    domain.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for Rubric {
    /// The conventional implementation-plan rubric: four domains at
    /// 50 points each, 70% threshold.
    fn default() -> Self {
        let domain = |name: &str, criteria: &str| Domain {
            name: name.to_string(),
            max_score: 50,
            criteria: criteria.to_string(),
        };
        Rubric {
            domains: vec![
                domain("backend", "Data model, migrations, jobs, service boundaries."),
                domain("frontend", "Views, interaction flow, accessibility."),
                domain("tests", "Coverage of happy paths, edge cases, and failure modes."),
                domain("security", "Authorization, input handling, data integrity constraints."),
            ],
            threshold: DEFAULT_THRESHOLD,
        }
    }
}
