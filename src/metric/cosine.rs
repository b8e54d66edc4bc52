//! Weighted cosine similarity.
//!
//! ```text
//! sim(x, y) = Σ_d a_d x_d y_d / (‖x‖_a ‖y‖_a),   ‖x‖_a = sqrt(Σ_d a_d x_d²)
//! penalty(x, y) = 1 − sim(x, y)
//! ```
//!
//! Similarity based: the assignment step maximizes `sim(x, centroid)`. Vectors
//! are expected at unit length, so centroids are renormalized after every
//! M-step. Components exposed to the learner are the products `x_d y_d`, i.e.
//! the similarity side of the penalty.

use super::{Metric, WeightStatistics};
use crate::data::{Dataset, Instance};
use crate::error::{Error, Result};

/// Smallest weight kept after an update, relative to the mean weight.
const WEIGHT_FLOOR: f64 = 1e-3;

/// Cosine similarity with one learnable weight per attribute.
#[derive(Debug, Clone, Default)]
pub struct WeightedCosine {
    weights: Vec<f64>,
    non_negative: bool,
}

impl WeightedCosine {
    /// Create an unbuilt metric.
    pub fn new() -> Self {
        Self::default()
    }

    fn weighted_norm(&self, x: &Instance) -> f64 {
        let mut acc = 0.0;
        x.for_each_nonzero(|d, v| acc += self.weights[d] * v * v);
        acc.sqrt()
    }
}

impl Metric for WeightedCosine {
    fn name(&self) -> &'static str {
        "weighted-cosine"
    }

    fn is_distance_based(&self) -> bool {
        false
    }

    fn requires_normalization(&self) -> bool {
        true
    }

    fn build(&mut self, data: &Dataset) -> Result<()> {
        let d = data.num_attributes();
        if self.weights.len() != d {
            self.weights = vec![1.0; d];
        }
        let (lo, _) = data.bounds(None);
        self.non_negative = lo.iter().all(|&v| v >= 0.0);
        Ok(())
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn distance(&self, a: &Instance, b: &Instance) -> f64 {
        self.penalty(a, b)
    }

    fn similarity(&self, a: &Instance, b: &Instance) -> f64 {
        let na = self.weighted_norm(a);
        let nb = self.weighted_norm(b);
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        let mut dot = 0.0;
        a.zip_with(b, |d, x, y| dot += self.weights[d] * x * y);
        (dot / (na * nb)).clamp(-1.0, 1.0)
    }

    fn score(&self, point: &Instance, centroid: &Instance) -> f64 {
        self.similarity(point, centroid)
    }

    fn score_components(&self, point: &Instance, centroid: &Instance, scale: f64, out: &mut [f64]) {
        self.penalty_components(point, centroid, scale, out);
    }

    fn penalty(&self, a: &Instance, b: &Instance) -> f64 {
        (1.0 - self.similarity(a, b)).max(0.0)
    }

    fn penalty_components(&self, a: &Instance, b: &Instance, scale: f64, out: &mut [f64]) {
        a.zip_with(b, |d, x, y| out[d] += scale * x * y);
    }

    fn max_penalty_components(&self, data: &Dataset, _members: Option<&[usize]>) -> Vec<f64> {
        vec![0.0; data.num_attributes()]
    }

    fn max_penalty(&self, _data: &Dataset, _members: Option<&[usize]>) -> f64 {
        if self.non_negative {
            1.0
        } else {
            2.0
        }
    }

    /// Reweights attributes by how much they contribute to within-cluster and
    /// must-link similarity, minus their contribution to violated cannot-links.
    /// Weights are rescaled to mean one.
    fn train(&mut self, stats: &WeightStatistics) -> Result<()> {
        let dim = self.weights.len();
        if stats.spread.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: stats.spread.len(),
            });
        }
        if stats.members <= 0.0 || dim == 0 {
            return Ok(());
        }
        let raw: Vec<f64> = (0..dim)
            .map(|d| {
                (stats.spread[d] + stats.must_link[d] - stats.cannot_link[d]).max(0.0)
                    + stats.regularizer_weight
            })
            .collect();
        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return Ok(());
        }
        let mean = total / dim as f64;
        for (a, r) in self.weights.iter_mut().zip(raw) {
            *a = (r / mean).max(WEIGHT_FLOOR);
        }
        Ok(())
    }

    /// Weights are kept at mean one, so there is no log-determinant term.
    fn normalizer(&self) -> f64 {
        0.0
    }

    fn regularizer(&self) -> f64 {
        self.weights.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_bounds() {
        let data = Dataset::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 0.0]]).unwrap();
        let mut metric = WeightedCosine::new();
        metric.build(&data).unwrap();
        assert_eq!(metric.similarity(data.instance(0), data.instance(1)), 0.0);
        assert!((metric.similarity(data.instance(0), data.instance(2)) - 1.0).abs() < 1e-12);
        assert!(metric.penalty(data.instance(0), data.instance(2)).abs() < 1e-12);
        assert_eq!(metric.max_penalty(&data, None), 1.0);
        assert!(!metric.is_distance_based());
    }

    #[test]
    fn test_train_favours_shared_attributes() {
        let data = Dataset::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let mut metric = WeightedCosine::new();
        metric.build(&data).unwrap();
        let mut stats = WeightStatistics::new(2, 1.0, 0.0);
        stats.members = 2.0;
        stats.spread = vec![3.0, 1.0];
        metric.train(&stats).unwrap();
        assert_eq!(metric.weights(), &[1.5, 0.5]);
    }
}
