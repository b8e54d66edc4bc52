//! Pluggable, learnable metrics.
//!
//! A [`Metric`] scores a point against a centroid, scores pairs of points for
//! constraint penalties, and re-estimates its per-attribute weights from
//! sufficient statistics gathered by the clusterer.
//!
//! ## Orientation
//!
//! Distance-based metrics return a *penalty* from [`Metric::score`] that the
//! assignment step minimizes. Similarity-based metrics return a *similarity*
//! that it maximizes. Pair penalties ([`Metric::penalty`]) are always
//! non-negative dissimilarities, so constraint costs read the same way for both:
//!
//! ```text
//! must-link violated:   w_ml · penalty(x_i, x_j)
//! cannot-link violated: w_cl · (max_penalty − penalty(x_i, x_j))
//! ```
//!
//! ## Weights
//!
//! All shipped metrics are diagonal: one weight `a_d` per attribute, and every
//! score is a weighted sum of per-attribute components. That decomposition is
//! what [`Metric::score_components`] and [`Metric::penalty_components`] expose
//! to the learner.

mod cosine;
mod euclidean;
mod kl;

pub use cosine::WeightedCosine;
pub use euclidean::WeightedEuclidean;
pub use kl::KlDivergence;

use crate::data::{Dataset, Instance};
use crate::error::Result;
use std::fmt::Debug;

/// Sufficient statistics for one weight update.
///
/// Every vector has one entry per attribute and holds *unweighted* components,
/// already multiplied by instance or constraint weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightStatistics {
    /// Total instance weight of the points scored by this metric.
    pub members: f64,
    /// Components of member-to-centroid scores.
    pub spread: Vec<f64>,
    /// Components of violated must-link penalties.
    pub must_link: Vec<f64>,
    /// Components of violated cannot-link penalties.
    pub cannot_link: Vec<f64>,
    /// Components of the penalty bound, summed once per violated cannot-link.
    pub cannot_link_bound: Vec<f64>,
    /// Weight of the log-normalizer term.
    pub log_term_weight: f64,
    /// Weight of the magnitude regularizer.
    pub regularizer_weight: f64,
}

impl WeightStatistics {
    /// Empty statistics for `dim` attributes.
    pub fn new(dim: usize, log_term_weight: f64, regularizer_weight: f64) -> Self {
        Self {
            members: 0.0,
            spread: vec![0.0; dim],
            must_link: vec![0.0; dim],
            cannot_link: vec![0.0; dim],
            cannot_link_bound: vec![0.0; dim],
            log_term_weight,
            regularizer_weight,
        }
    }
}

/// A parameterized metric with learnable per-attribute weights.
pub trait Metric: Clone + Debug + Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// `true` if [`Metric::score`] is a penalty to minimize, `false` if it is a
    /// similarity to maximize.
    fn is_distance_based(&self) -> bool;

    /// Whether instances and centroids must be unit length.
    fn requires_normalization(&self) -> bool {
        false
    }

    /// Whether [`Metric::smooth`] does anything.
    fn supports_smoothing(&self) -> bool {
        false
    }

    /// One-time fit to the data: sizes and resets the weights.
    fn build(&mut self, data: &Dataset) -> Result<()>;

    /// Current per-attribute weights.
    fn weights(&self) -> &[f64];

    /// Weighted distance.
    fn distance(&self, a: &Instance, b: &Instance) -> f64;

    /// Weighted similarity.
    fn similarity(&self, a: &Instance, b: &Instance) -> f64;

    /// Point-to-centroid score in the metric's own orientation.
    fn score(&self, point: &Instance, centroid: &Instance) -> f64;

    /// Per-attribute components of [`Metric::score`], scaled and added into `out`.
    fn score_components(&self, point: &Instance, centroid: &Instance, scale: f64, out: &mut [f64]);

    /// Non-negative pair dissimilarity used for constraint penalties.
    fn penalty(&self, a: &Instance, b: &Instance) -> f64;

    /// Per-attribute components of [`Metric::penalty`], scaled and added into `out`.
    fn penalty_components(&self, a: &Instance, b: &Instance, scale: f64, out: &mut [f64]);

    /// Per-attribute components of an upper bound on [`Metric::penalty`] over
    /// `members` (the whole dataset when `None`).
    fn max_penalty_components(&self, data: &Dataset, members: Option<&[usize]>) -> Vec<f64>;

    /// Upper bound on [`Metric::penalty`] over `members`.
    fn max_penalty(&self, data: &Dataset, members: Option<&[usize]>) -> f64 {
        self.max_penalty_components(data, members)
            .iter()
            .zip(self.weights())
            .map(|(c, a)| c * a)
            .sum()
    }

    /// Re-estimate the weights in place, then refresh the normalizer.
    fn train(&mut self, stats: &WeightStatistics) -> Result<()>;

    /// Log-normalizer of the weights (log-determinant for diagonal metrics).
    fn normalizer(&self) -> f64;

    /// Weight magnitude, before multiplication by the regularizer weight.
    fn regularizer(&self) -> f64;

    /// Smooth a freshly estimated centroid.
    fn smooth(&self, _centroid: &mut Instance) {}

    /// Advance the smoothing schedule once per outer iteration.
    fn anneal(&mut self) {}
}

/// Closed-form weight update shared by the diagonal divergence metrics.
///
/// Minimizes `Σ_d a_d·S_d − log_w·n·Σ_d ln a_d + λ·Σ_d a_d` per attribute, giving
/// `a_d = log_w·n / (S_d + λ)`. Attributes with a non-positive denominator keep
/// their weight.
pub(crate) fn closed_form_weights(weights: &mut [f64], stats: &WeightStatistics) {
    if stats.members <= 0.0 || stats.log_term_weight <= 0.0 {
        return;
    }
    for (d, a) in weights.iter_mut().enumerate() {
        let s = stats.spread[d]
            + stats.must_link[d]
            + (stats.cannot_link_bound[d] - stats.cannot_link[d]).max(0.0);
        let denom = s + stats.regularizer_weight;
        if denom > f64::EPSILON {
            *a = stats.log_term_weight * stats.members / denom;
        }
    }
}

/// `Σ_d ln a_d`, the log-determinant of a diagonal weight matrix.
pub(crate) fn log_det(weights: &[f64]) -> f64 {
    weights.iter().map(|a| a.ln()).sum()
}
