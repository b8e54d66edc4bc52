//! Run configuration.
//!
//! Every knob of a run lives in [`MpckConfig`], loadable from TOML so that
//! experiments change without recompiling. Missing fields take their defaults.
//!
//! ```
//! use mpck::config::{MetricKind, MetricLearning, MpckConfig};
//!
//! let config = MpckConfig::from_toml_str(r#"
//!     k = 3
//!     random_seed = 7
//!     metric = "euclidean"
//!     learning = "global"
//!     cannot_link_weight = 2.0
//!
//!     [active]
//!     budget = 40
//!     consolidation = "random"
//! "#).unwrap();
//!
//! assert_eq!(config.k, 3);
//! assert_eq!(config.learning, MetricLearning::Global);
//! assert_eq!(config.metric, MetricKind::Euclidean);
//! assert_eq!(config.active.unwrap().budget, 40);
//! assert_eq!(config.max_iterations, 100);
//! ```

use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading or validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML text is malformed or has fields of the wrong type.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which metric family to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Diagonal weighted squared Euclidean.
    #[default]
    Euclidean,
    /// Weighted cosine similarity (unit-length data).
    Cosine,
    /// Weighted I-divergence with centroid smoothing (non-negative data).
    Kl,
}

/// How metric weights are re-estimated between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricLearning {
    /// Weights never change.
    Fixed,
    /// One metric shared by all clusters.
    Global,
    /// An independent metric per cluster.
    #[default]
    PerCluster,
}

/// Order in which the assignment step visits points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assigner {
    /// Index order.
    #[default]
    Sequential,
    /// A fresh shuffle every iteration, drawn from the run's RNG.
    RandomOrder,
}

/// How the K initial centroids are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    /// Neighborhood means, missing centroids perturbed from the global centroid.
    #[default]
    Neighborhoods,
    /// Neighborhood means, missing centroids drawn by k-means++ D² sampling.
    NeighborhoodsPlusPlus,
}

/// Scope of the cached cannot-link penalty bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CannotLinkBound {
    /// Bound over the whole dataset; never yields negative contributions.
    #[default]
    Dataset,
    /// Bound over current cluster members. Experimental: contributions can go
    /// negative while points move.
    PerCluster,
}

/// How the consolidation phase picks its next point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationOrder {
    /// The unassigned point nearest to the smallest neighborhood's centroid.
    #[default]
    NearestToSmallest,
    /// A uniformly random unassigned point.
    Random,
}

/// Active constraint acquisition settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActiveConfig {
    /// Maximum number of oracle queries.
    pub budget: usize,
    /// Point choice during consolidation.
    pub consolidation: ConsolidationOrder,
    /// Points the selector may query (defaults to all points). Points outside
    /// are typically held out for testing.
    pub permitted: Option<Range<usize>>,
}

impl Default for ActiveConfig {
    fn default() -> Self {
        Self {
            budget: 100,
            consolidation: ConsolidationOrder::default(),
            permitted: None,
        }
    }
}

/// Artifact destinations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where to write `index<TAB>cluster` lines.
    pub assignments: Option<PathBuf>,
    /// Where to write the per-iteration constraint-incoherence report.
    pub incoherence: Option<PathBuf>,
}

/// Full configuration of a clustering run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MpckConfig {
    /// Number of clusters.
    pub k: usize,
    /// Random seed; `None` draws one from the thread RNG.
    pub random_seed: Option<u64>,
    /// Metric family.
    pub metric: MetricKind,
    /// Metric learning policy.
    pub learning: MetricLearning,
    /// Assignment visiting order.
    pub assigner: Assigner,
    /// Initial centroid policy.
    pub initializer: Initializer,
    /// Scope of the cannot-link penalty bound.
    pub cannot_link_bound: CannotLinkBound,
    /// Weight of each violated must-link.
    pub must_link_weight: f64,
    /// Weight of each violated cannot-link.
    pub cannot_link_weight: f64,
    /// Weight of the log-normalizer term.
    pub log_term_weight: f64,
    /// Weight of the metric magnitude regularizer.
    pub regularizer_weight: f64,
    /// Hard cap on outer iterations.
    pub max_iterations: usize,
    /// Stop after this many consecutive iterations that move no point.
    pub max_blank_iterations: usize,
    /// Stop when the relative objective change falls below this.
    pub epsilon: f64,
    /// Relative objective movement in the wrong direction that is tolerated.
    pub oscillation_tolerance: f64,
    /// Treat oscillation as an error instead of a warning.
    pub strict: bool,
    /// Relative per-attribute perturbation for synthesized centroids.
    pub perturbation: f64,
    /// Record the constraint-incoherence value every iteration.
    pub track_incoherence: bool,
    /// Active constraint acquisition; disabled when `None`.
    pub active: Option<ActiveConfig>,
    /// Output paths.
    pub output: OutputConfig,
}

impl Default for MpckConfig {
    fn default() -> Self {
        Self {
            k: 2,
            random_seed: None,
            metric: MetricKind::default(),
            learning: MetricLearning::default(),
            assigner: Assigner::default(),
            initializer: Initializer::default(),
            cannot_link_bound: CannotLinkBound::default(),
            must_link_weight: 1.0,
            cannot_link_weight: 1.0,
            log_term_weight: 1.0,
            regularizer_weight: 0.0,
            max_iterations: 100,
            max_blank_iterations: 20,
            epsilon: 1e-6,
            oscillation_tolerance: 1e-9,
            strict: false,
            perturbation: 0.1,
            track_incoherence: false,
            active: None,
            output: OutputConfig::default(),
        }
    }
}

impl MpckConfig {
    /// Default configuration for `k` clusters.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.k == 0 {
            return invalid("k must be at least 1");
        }
        if self.must_link_weight < 0.0 || self.cannot_link_weight < 0.0 {
            return invalid("constraint weights must be non-negative");
        }
        if self.log_term_weight < 0.0 || self.regularizer_weight < 0.0 {
            return invalid("log-term and regularizer weights must be non-negative");
        }
        if self.learning != MetricLearning::Fixed && self.log_term_weight == 0.0 {
            return invalid("metric learning needs a positive log_term_weight");
        }
        if self.epsilon < 0.0 || self.oscillation_tolerance < 0.0 || self.perturbation < 0.0 {
            return invalid("epsilon, oscillation_tolerance and perturbation must be non-negative");
        }
        if self.max_iterations == 0 || self.max_blank_iterations == 0 {
            return invalid("max_iterations and max_blank_iterations must be at least 1");
        }
        if let Some(range) = self.active.as_ref().and_then(|a| a.permitted.as_ref()) {
            if range.is_empty() {
                return invalid("active.permitted must be a non-empty range");
            }
        }
        Ok(())
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Set the metric family.
    pub fn with_metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }

    /// Set the metric learning policy.
    pub fn with_learning(mut self, learning: MetricLearning) -> Self {
        self.learning = learning;
        self
    }

    /// Set the assignment order.
    pub fn with_assigner(mut self, assigner: Assigner) -> Self {
        self.assigner = assigner;
        self
    }

    /// Set the initializer.
    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    /// Set the cannot-link bound scope.
    pub fn with_cannot_link_bound(mut self, bound: CannotLinkBound) -> Self {
        self.cannot_link_bound = bound;
        self
    }

    /// Set must-link and cannot-link weights.
    pub fn with_constraint_weights(mut self, must_link: f64, cannot_link: f64) -> Self {
        self.must_link_weight = must_link;
        self.cannot_link_weight = cannot_link;
        self
    }

    /// Set the log-normalizer weight.
    pub fn with_log_term_weight(mut self, weight: f64) -> Self {
        self.log_term_weight = weight;
        self
    }

    /// Set the regularizer weight.
    pub fn with_regularizer_weight(mut self, weight: f64) -> Self {
        self.regularizer_weight = weight;
        self
    }

    /// Set maximum iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set maximum consecutive blank iterations.
    pub fn with_max_blank_iterations(mut self, max_blank: usize) -> Self {
        self.max_blank_iterations = max_blank;
        self
    }

    /// Set the convergence threshold.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Make oscillation fatal.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the relative perturbation for synthesized centroids.
    pub fn with_perturbation(mut self, perturbation: f64) -> Self {
        self.perturbation = perturbation;
        self
    }

    /// Record constraint incoherence every iteration.
    pub fn with_incoherence_tracking(mut self, track: bool) -> Self {
        self.track_incoherence = track;
        self
    }

    /// Enable active constraint acquisition.
    pub fn with_active(mut self, active: ActiveConfig) -> Self {
        self.active = Some(active);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = MpckConfig::from_toml_str("").unwrap();
        assert_eq!(config, MpckConfig::default());
    }

    #[test]
    fn test_nested_sections() {
        let config = MpckConfig::from_toml_str(
            r#"
            k = 4
            assigner = "random_order"
            initializer = "neighborhoods_plus_plus"
            cannot_link_bound = "per_cluster"
            strict = true

            [active]
            budget = 12
            permitted = { start = 0, end = 50 }

            [output]
            assignments = "out/assign.tsv"
            "#,
        )
        .unwrap();
        assert_eq!(config.assigner, Assigner::RandomOrder);
        assert_eq!(config.initializer, Initializer::NeighborhoodsPlusPlus);
        assert_eq!(config.cannot_link_bound, CannotLinkBound::PerCluster);
        assert!(config.strict);
        let active = config.active.unwrap();
        assert_eq!(active.budget, 12);
        assert_eq!(active.permitted, Some(0..50));
        assert_eq!(
            config.output.assignments,
            Some(PathBuf::from("out/assign.tsv"))
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            MpckConfig::from_toml_str("k = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MpckConfig::from_toml_str("must_link_weight = -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MpckConfig::from_toml_str("k = \"three\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = MpckConfig::new(5)
            .with_seed(9)
            .with_learning(MetricLearning::Fixed)
            .with_constraint_weights(2.0, 3.0);
        assert_eq!(config.k, 5);
        assert_eq!(config.random_seed, Some(9));
        assert_eq!(config.cannot_link_weight, 3.0);
        assert!(config.validate().is_ok());
    }
}
