//! Centroid re-estimation (M-step).

use super::model::{partition, Model};
use crate::data::Dataset;
use crate::metric::Metric;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Replace each centroid by the weighted mean of its members.
///
/// Clusters with no members keep their previous centroid. Metrics that need
/// unit-length vectors get normalized centroids, and smoothing metrics smooth
/// the fresh mean and then advance their schedule. Returns the number of empty
/// clusters.
pub fn estimate_centroids<M: Metric>(data: &Dataset, assignment: &[usize], model: &mut Model<M>) -> usize {
    let members = partition(assignment, model.k());

    let estimate = |k: usize| {
        let mut centroid = data.weighted_mean(&members[k])?;
        let metric = model.metric(k);
        if metric.requires_normalization() {
            centroid.normalize();
        }
        if metric.supports_smoothing() {
            metric.smooth(&mut centroid);
        }
        Some(centroid)
    };

    #[cfg(feature = "parallel")]
    let fresh: Vec<_> = (0..model.k()).into_par_iter().map(estimate).collect();
    #[cfg(not(feature = "parallel"))]
    let fresh: Vec<_> = (0..model.k()).map(estimate).collect();

    let mut empty = 0;
    for (k, centroid) in fresh.into_iter().enumerate() {
        match centroid {
            Some(c) => model.centroids_mut()[k] = c,
            None => {
                empty += 1;
                debug!(cluster = k, "empty cluster keeps its centroid");
            }
        }
    }
    for metric in model.metrics_mut().iter_mut() {
        metric.anneal();
    }
    empty
}
