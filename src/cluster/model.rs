//! Shared clustering state: centroids, metrics and the cannot-link bound cache.

use crate::config::{CannotLinkBound, MpckConfig};
use crate::constraints::ConstraintSet;
use crate::data::{Dataset, Instance};
use crate::metric::Metric;

/// Assignment value of a point that belongs to no cluster yet.
pub const UNASSIGNED: usize = usize::MAX;

/// Weights of the objective terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveWeights {
    /// Multiplier of each violated must-link penalty.
    pub must_link: f64,
    /// Multiplier of each violated cannot-link penalty.
    pub cannot_link: f64,
    /// Multiplier of the log-normalizer term.
    pub log_term: f64,
    /// Multiplier of the metric regularizer.
    pub regularizer: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            must_link: 1.0,
            cannot_link: 1.0,
            log_term: 1.0,
            regularizer: 0.0,
        }
    }
}

impl From<&MpckConfig> for ObjectiveWeights {
    fn from(config: &MpckConfig) -> Self {
        Self {
            must_link: config.must_link_weight,
            cannot_link: config.cannot_link_weight,
            log_term: config.log_term_weight,
            regularizer: config.regularizer_weight,
        }
    }
}

/// Read-only inputs shared by every step of a run.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    /// The points.
    pub data: &'a Dataset,
    /// The closed constraint set.
    pub constraints: &'a ConstraintSet,
    /// Objective term weights.
    pub weights: ObjectiveWeights,
}

impl<'a> Context<'a> {
    /// Bundle the inputs of a run.
    pub fn new(data: &'a Dataset, constraints: &'a ConstraintSet, weights: ObjectiveWeights) -> Self {
        Self {
            data,
            constraints,
            weights,
        }
    }
}

/// Centroids plus either one shared metric or one metric per cluster.
#[derive(Debug, Clone)]
pub struct Model<M: Metric> {
    centroids: Vec<Instance>,
    metrics: Vec<M>,
    per_cluster: bool,
    max_penalties: Vec<f64>,
    bound_components: Vec<Vec<f64>>,
}

impl<M: Metric> Model<M> {
    /// Build a model; `per_cluster` clones `metric` once per centroid.
    pub fn new(centroids: Vec<Instance>, metric: M, per_cluster: bool) -> Self {
        let k = centroids.len();
        let metrics = if per_cluster {
            vec![metric; k]
        } else {
            vec![metric]
        };
        Self {
            centroids,
            metrics,
            per_cluster,
            max_penalties: vec![0.0; k],
            bound_components: vec![Vec::new(); k],
        }
    }

    /// Number of clusters.
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Whether each cluster owns its metric.
    pub fn is_per_cluster(&self) -> bool {
        self.per_cluster
    }

    /// Centroid of cluster `k`.
    pub fn centroid(&self, k: usize) -> &Instance {
        &self.centroids[k]
    }

    /// All centroids.
    pub fn centroids(&self) -> &[Instance] {
        &self.centroids
    }

    /// Metric used by cluster `k`.
    pub fn metric(&self, k: usize) -> &M {
        if self.per_cluster {
            &self.metrics[k]
        } else {
            &self.metrics[0]
        }
    }

    /// The distinct metrics (one when shared).
    pub fn metrics(&self) -> &[M] {
        &self.metrics
    }

    /// Cached upper bound on the pair penalty for cluster `k`.
    pub fn max_penalty(&self, k: usize) -> f64 {
        self.max_penalties[k]
    }

    /// Per-attribute components of the cached bound for cluster `k`.
    pub fn bound_components(&self, k: usize) -> &[f64] {
        &self.bound_components[k]
    }

    /// Whether scores are penalties (minimized) rather than similarities.
    pub fn is_distance_based(&self) -> bool {
        self.metrics[0].is_distance_based()
    }

    pub(crate) fn centroids_mut(&mut self) -> &mut Vec<Instance> {
        &mut self.centroids
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut Vec<M> {
        &mut self.metrics
    }

    /// Recompute the cannot-link bound cache.
    ///
    /// Must run after any weight or membership change that the next penalty
    /// computation should see.
    pub fn refresh_bounds(&mut self, data: &Dataset, assignment: &[usize], scope: CannotLinkBound) {
        let members: Option<Vec<Vec<usize>>> = match scope {
            CannotLinkBound::Dataset => None,
            CannotLinkBound::PerCluster => Some(partition(assignment, self.k())),
        };
        for k in 0..self.k() {
            let subset = members.as_ref().map(|m| m[k].as_slice());
            let metric = self.metric(k);
            let components = metric.max_penalty_components(data, subset);
            let bound = metric.max_penalty(data, subset);
            self.bound_components[k] = components;
            self.max_penalties[k] = bound;
        }
    }
}

/// Member lists per cluster, skipping unassigned points.
pub fn partition(assignment: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); k];
    for (i, &c) in assignment.iter().enumerate() {
        if c != UNASSIGNED {
            members[c].push(i);
        }
    }
    members
}
