//! Initial centroids from must-link neighborhoods.
//!
//! The K largest neighborhoods seed the first K clusters. Missing centroids are
//! synthesized either by jittering the global centroid or, with
//! [`Initializer::NeighborhoodsPlusPlus`], by k-means++ D² sampling.
//!
//! # References
//!
//! - Basu, Banerjee, Mooney (2004). "Active Semi-Supervision for Pairwise
//!   Constrained Clustering"
//! - Arthur & Vassilvitskii (2007). "k-means++: The Advantages of Careful Seeding"

use super::model::UNASSIGNED;
use crate::config::Initializer;
use crate::constraints::Closure;
use crate::data::{Dataset, Instance};
use crate::error::{Error, Result};
use crate::metric::Metric;
use rand::Rng;
use tracing::debug;

/// Initial centroids plus the assignment implied by the kept neighborhoods.
#[derive(Debug, Clone)]
pub struct Seeding {
    /// Exactly K centroids.
    pub centroids: Vec<Instance>,
    /// Neighborhood members point at their cluster; all else is [`UNASSIGNED`].
    pub assignment: Vec<usize>,
    /// Neighborhoods dropped because more than K exist.
    pub dropped_neighborhoods: usize,
}

/// Build K initial centroids.
pub fn initial_centroids<M: Metric, R: Rng + ?Sized>(
    data: &Dataset,
    closure: &Closure,
    k: usize,
    metric: &M,
    initializer: Initializer,
    perturbation: f64,
    rng: &mut R,
) -> Result<Seeding> {
    let n = data.num_instances();
    let mut assignment = vec![UNASSIGNED; n];
    let mut centroids = Vec::with_capacity(k);

    let neighborhoods = closure.neighborhoods();
    for (c, members) in neighborhoods.iter().take(k).enumerate() {
        let Some(mean) = data.weighted_mean(members) else {
            continue;
        };
        for &i in members {
            assignment[i] = c;
        }
        centroids.push(mean);
    }
    let dropped_neighborhoods = neighborhoods.len().saturating_sub(k);
    if dropped_neighborhoods > 0 {
        let reverted: usize = neighborhoods[k..].iter().map(Vec::len).sum();
        debug!(
            dropped = dropped_neighborhoods,
            reverted, "more neighborhoods than clusters, keeping the largest"
        );
    }
    if centroids.len() < neighborhoods.len().min(k) {
        // a neighborhood with zero total weight has no mean
        return Err(Error::InvalidParameter {
            name: "weight",
            message: "neighborhood has zero total instance weight".into(),
        });
    }

    let missing = k - centroids.len();
    if missing > 0 {
        debug!(missing, ?initializer, "synthesizing missing centroids");
        match initializer {
            Initializer::Neighborhoods => {
                let global = data.mean().ok_or(Error::EmptyInput)?;
                let (lo, hi) = data.bounds(None);
                let spread: Vec<f64> = hi.iter().zip(&lo).map(|(h, l)| h - l).collect();
                for _ in 0..missing {
                    centroids.push(perturb(&global, &spread, perturbation, rng));
                }
            }
            Initializer::NeighborhoodsPlusPlus => {
                for _ in 0..missing {
                    let pick = sample_d2(data, &centroids, metric, rng);
                    centroids.push(data.instance(pick).clone().with_weight(1.0));
                }
            }
        }
    }

    for centroid in &mut centroids {
        if metric.requires_normalization() {
            centroid.normalize();
        }
        if metric.supports_smoothing() {
            metric.smooth(centroid);
        }
    }

    Ok(Seeding {
        centroids,
        assignment,
        dropped_neighborhoods,
    })
}

/// Move each coordinate of `global` by `p·u·scale`, `u ~ U[-1, 1]`.
///
/// `scale` is the coordinate itself, or the attribute's spread where the
/// coordinate is zero.
fn perturb<R: Rng + ?Sized>(
    global: &Instance,
    spread: &[f64],
    perturbation: f64,
    rng: &mut R,
) -> Instance {
    let values = global
        .to_dense()
        .into_iter()
        .zip(spread)
        .map(|(g, &s)| {
            let scale = if g != 0.0 { g } else { s };
            g + scale * perturbation * rng.random_range(-1.0..=1.0)
        })
        .collect();
    Instance::dense(values)
}

/// Pick a point with probability proportional to its squared distance to the
/// nearest existing centroid.
fn sample_d2<M: Metric, R: Rng + ?Sized>(
    data: &Dataset,
    centroids: &[Instance],
    metric: &M,
    rng: &mut R,
) -> usize {
    let n = data.num_instances();
    if centroids.is_empty() {
        return rng.random_range(0..n);
    }

    let distances: Vec<f64> = data
        .instances()
        .iter()
        .map(|x| {
            centroids
                .iter()
                .map(|c| {
                    let d = metric.distance(x, c);
                    d * d
                })
                .fold(f64::MAX, f64::min)
        })
        .collect();

    // Sample proportional to squared distance
    let total: f64 = distances.iter().sum();
    if !(total > 0.0) {
        return rng.random_range(0..n);
    }
    let threshold = rng.random::<f64>() * total;
    let mut cumsum = 0.0;
    for (j, &d) in distances.iter().enumerate() {
        cumsum += d;
        if cumsum >= threshold {
            return j;
        }
    }
    n - 1
}
