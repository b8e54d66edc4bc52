//! Weighted KL-style divergence for non-negative data.
//!
//! Points are scored against centroids with the generalized I-divergence and
//! pairs with a symmetric Jensen-Shannon style divergence:
//!
//! ```text
//! score(x, c)   = Σ_d a_d [x_d ln(x_d / c_d) − x_d + c_d]
//! penalty(x, y) = Σ_d a_d ½ [x_d ln(2x_d / (x_d + y_d)) + y_d ln(2y_d / (x_d + y_d))]
//! ```
//!
//! Both are non-negative per attribute, so the weights admit the same
//! closed-form update as [`super::WeightedEuclidean`].
//!
//! A centroid with a zero coordinate makes the divergence of any point that is
//! nonzero there infinite. Centroids are therefore smoothed towards the uniform
//! vector of the same mass, with a smoothing factor that decays every outer
//! iteration.

use super::{closed_form_weights, log_det, Metric, WeightStatistics};
use crate::data::{Dataset, Instance};
use crate::error::{Error, Result};

/// Floor applied to centroid coordinates inside the logarithm.
const MIN_CENTROID: f64 = 1e-12;

/// Weighted I-divergence with centroid smoothing.
#[derive(Debug, Clone)]
pub struct KlDivergence {
    weights: Vec<f64>,
    smoothing: f64,
    decay: f64,
}

impl Default for KlDivergence {
    fn default() -> Self {
        Self {
            weights: Vec::new(),
            smoothing: 0.1,
            decay: 0.9,
        }
    }
}

impl KlDivergence {
    /// Create an unbuilt metric with default smoothing (0.1, decaying by 0.9).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial smoothing factor in `[0, 1)`.
    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Set the per-iteration smoothing decay in `[0, 1]`.
    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    /// Current smoothing factor.
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }
}

fn divergence_term(x: f64, c: f64) -> f64 {
    let c = c.max(MIN_CENTROID);
    if x > 0.0 {
        x * (x / c).ln() - x + c
    } else {
        c
    }
}

fn js_term(x: f64, y: f64) -> f64 {
    let m = x + y;
    if m <= 0.0 {
        return 0.0;
    }
    let half = |v: f64| if v > 0.0 { v * (2.0 * v / m).ln() } else { 0.0 };
    0.5 * (half(x) + half(y))
}

impl Metric for KlDivergence {
    fn name(&self) -> &'static str {
        "kl-divergence"
    }

    fn is_distance_based(&self) -> bool {
        true
    }

    fn supports_smoothing(&self) -> bool {
        true
    }

    fn build(&mut self, data: &Dataset) -> Result<()> {
        if !(0.0..1.0).contains(&self.smoothing) || !(0.0..=1.0).contains(&self.decay) {
            return Err(Error::InvalidParameter {
                name: "smoothing",
                message: format!(
                    "smoothing must be in [0, 1) and decay in [0, 1], got {} and {}",
                    self.smoothing, self.decay
                ),
            });
        }
        let (lo, _) = data.bounds(None);
        if lo.iter().any(|&v| v < 0.0) {
            return Err(Error::InvalidParameter {
                name: "metric",
                message: "KL divergence requires non-negative attributes".into(),
            });
        }
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
        (-self.penalty(a, b)).exp()
    }

    fn score(&self, point: &Instance, centroid: &Instance) -> f64 {
        let mut acc = 0.0;
        point.zip_with(centroid, |d, x, c| acc += self.weights[d] * divergence_term(x, c));
        acc
    }

    fn score_components(&self, point: &Instance, centroid: &Instance, scale: f64, out: &mut [f64]) {
        point.zip_with(centroid, |d, x, c| out[d] += scale * divergence_term(x, c));
    }

    fn penalty(&self, a: &Instance, b: &Instance) -> f64 {
        let mut acc = 0.0;
        a.zip_with(b, |d, x, y| acc += self.weights[d] * js_term(x, y));
        acc
    }

    fn penalty_components(&self, a: &Instance, b: &Instance, scale: f64, out: &mut [f64]) {
        a.zip_with(b, |d, x, y| out[d] += scale * js_term(x, y));
    }

    /// The per-attribute term is jointly convex, so over a box it peaks at a
    /// corner: `(min_d, max_d)`.
    fn max_penalty_components(&self, data: &Dataset, members: Option<&[usize]>) -> Vec<f64> {
        let (lo, hi) = data.bounds(members);
        lo.iter().zip(hi.iter()).map(|(&l, &h)| js_term(l, h)).collect()
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

    fn smooth(&self, centroid: &mut Instance) {
        if self.smoothing <= 0.0 {
            return;
        }
        let mut dense = centroid.to_dense();
        if dense.is_empty() {
            return;
        }
        let uniform = dense.iter().sum::<f64>() / dense.len() as f64;
        for v in dense.iter_mut() {
            *v = (1.0 - self.smoothing) * *v + self.smoothing * uniform;
        }
        *centroid = Instance::dense(dense);
    }

    fn anneal(&mut self) {
        self.smoothing *= self.decay;
    }
}
