//! Diagonal weighted Euclidean metric.
//!
//! ```text
//! penalty(x, y) = Σ_d a_d (x_d − y_d)²
//! ```
//!
//! This is a Mahalanobis distance restricted to a diagonal matrix `A = diag(a)`.
//! Its log-normalizer is `ln det A = Σ_d ln a_d`, which stops the learner from
//! shrinking every weight to zero.

use super::{closed_form_weights, log_det, Metric, WeightStatistics};
use crate::data::{Dataset, Instance};
use crate::error::{Error, Result};

/// Weighted squared Euclidean metric with one learnable weight per attribute.
#[derive(Debug, Clone, Default)]
pub struct WeightedEuclidean {
    weights: Vec<f64>,
}

impl WeightedEuclidean {
    /// Create an unbuilt metric; weights are sized by [`Metric::build`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a metric with explicit starting weights.
    pub fn with_weights(weights: Vec<f64>) -> Result<Self> {
        if weights.iter().any(|&a| !(a > 0.0)) {
            return Err(Error::InvalidParameter {
                name: "weights",
                message: "weights must be strictly positive".into(),
            });
        }
        Ok(Self { weights })
    }
}

impl Metric for WeightedEuclidean {
    fn name(&self) -> &'static str {
        "weighted-euclidean"
    }

    fn is_distance_based(&self) -> bool {
        true
    }

    fn build(&mut self, data: &Dataset) -> Result<()> {
        let d = data.num_attributes();
        if self.weights.len() != d {
            self.weights = vec![1.0; d];
        }
        Ok(())
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn distance(&self, a: &Instance, b: &Instance) -> f64 {
        self.penalty(a, b).sqrt()
    }

    fn similarity(&self, a: &Instance, b: &Instance) -> f64 {
        1.0 / (1.0 + self.distance(a, b))
    }

    fn score(&self, point: &Instance, centroid: &Instance) -> f64 {
        self.penalty(point, centroid)
    }

    fn score_components(&self, point: &Instance, centroid: &Instance, scale: f64, out: &mut [f64]) {
        self.penalty_components(point, centroid, scale, out);
    }

    fn penalty(&self, a: &Instance, b: &Instance) -> f64 {
        let mut acc = 0.0;
        a.zip_with(b, |d, x, y| acc += self.weights[d] * (x - y) * (x - y));
        acc
    }

    fn penalty_components(&self, a: &Instance, b: &Instance, scale: f64, out: &mut [f64]) {
        a.zip_with(b, |d, x, y| out[d] += scale * (x - y) * (x - y));
    }

    fn max_penalty_components(&self, data: &Dataset, members: Option<&[usize]>) -> Vec<f64> {
        let (lo, hi) = data.bounds(members);
        lo.iter().zip(hi.iter()).map(|(l, h)| (h - l) * (h - l)).collect()
    }

    fn train(&mut self, stats: &WeightStatistics) -> Result<()> {
        if stats.spread.len() != self.weights.len() {
            return Err(Error::DimensionMismatch {
                expected: self.weights.len(),
                found: stats.spread.len(),
            });
        }
        closed_form_weights(&mut self.weights, stats);
        Ok(())
    }

    fn normalizer(&self) -> f64 {
        log_det(&self.weights)
    }

    fn regularizer(&self) -> f64 {
        self.weights.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(rows: &[Vec<f64>]) -> (Dataset, WeightedEuclidean) {
        let data = Dataset::from_rows(rows).unwrap();
        let mut metric = WeightedEuclidean::new();
        metric.build(&data).unwrap();
        (data, metric)
    }

    #[test]
    fn test_unit_weights_match_squared_euclidean() {
        let (data, metric) = built(&[vec![0.0, 0.0], vec![3.0, 4.0]]);
        assert_eq!(metric.penalty(data.instance(0), data.instance(1)), 25.0);
        assert_eq!(metric.distance(data.instance(0), data.instance(1)), 5.0);
        assert_eq!(metric.normalizer(), 0.0);
        assert_eq!(metric.regularizer(), 2.0);
    }

    #[test]
    fn test_max_penalty_bounds_every_pair() {
        let (data, metric) = built(&[vec![0.0, 1.0], vec![2.0, -1.0], vec![1.0, 3.0]]);
        let bound = metric.max_penalty(&data, None);
        for i in 0..3 {
            for j in 0..3 {
                assert!(metric.penalty(data.instance(i), data.instance(j)) <= bound);
            }
        }
        assert_eq!(bound, 4.0 + 16.0);
    }

    #[test]
    fn test_closed_form_update() {
        let (_, mut metric) = built(&[vec![0.0, 0.0], vec![1.0, 1.0]]);
        let mut stats = WeightStatistics::new(2, 1.0, 0.0);
        stats.members = 4.0;
        stats.spread = vec![2.0, 8.0];
        metric.train(&stats).unwrap();
        assert_eq!(metric.weights(), &[2.0, 0.5]);
        assert!((metric.normalizer() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_spread_keeps_weight() {
        let (_, mut metric) = built(&[vec![0.0, 0.0], vec![1.0, 1.0]]);
        let mut stats = WeightStatistics::new(2, 1.0, 0.0);
        stats.members = 2.0;
        stats.spread = vec![0.0, 1.0];
        metric.train(&stats).unwrap();
        assert_eq!(metric.weights(), &[1.0, 2.0]);
    }

    #[test]
    fn test_rejects_non_positive_weights() {
        assert!(WeightedEuclidean::with_weights(vec![1.0, 0.0]).is_err());
    }
}
