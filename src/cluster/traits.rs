//! Clustering traits.

use crate::constraints::ConstraintSet;
use crate::data::Dataset;
use crate::error::Result;

/// Trait for clustering algorithms guided by pairwise constraints.
pub trait ConstrainedClustering {
    /// Fit the model to data under `constraints` and return cluster assignments.
    ///
    /// Returns one label per input point. A point that no step could place is
    /// reported as [`super::UNASSIGNED`].
    fn fit_predict(&self, data: &Dataset, constraints: &ConstraintSet) -> Result<Vec<usize>>;

    /// Get the number of clusters.
    fn n_clusters(&self) -> usize;
}
