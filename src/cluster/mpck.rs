//! Metric pairwise-constrained k-means (MPCK-means).
//!
//! Alternates four steps until the objective settles:
//!
//! 1. **Assign**: every point moves to its cheapest cluster, constraint
//!    penalties included ([`super::assign`]).
//! 2. **Estimate**: centroids become weighted member means ([`super::centroid`]).
//! 3. **Learn**: metric weights are re-fit to the assignment ([`super::learner`]).
//! 4. **Track**: the objective is recomputed and checked for oscillation
//!    ([`super::objective`]).
//!
//! # References
//!
//! - Bilenko, Basu, Mooney (2004). "Integrating Constraints and Metric Learning
//!   in Semi-Supervised Clustering"

use std::borrow::Cow;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::assign::assign_points;
use super::centroid::estimate_centroids;
use super::init::initial_centroids;
use super::learner::train_metrics;
use super::model::{Context, Model, ObjectiveWeights, UNASSIGNED};
use super::objective::{evaluate, ObjectiveTracker};
use super::traits::ConstrainedClustering;
use crate::config::{MetricLearning, MpckConfig};
use crate::constraints::{ConstraintSet, LinkType};
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::report::incoherence;

/// Why the outer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Relative objective change fell below epsilon.
    ObjectiveConverged,
    /// Too many consecutive iterations moved no point.
    BlankIterations,
    /// The iteration cap was reached.
    MaxIterations,
}

/// Result of a fit.
#[derive(Debug, Clone)]
pub struct MpckFit<M: Metric> {
    /// Cluster of every point.
    pub assignment: Vec<usize>,
    /// Final centroids and metrics.
    pub model: Model<M>,
    /// The transitively closed constraints the run used.
    pub constraints: ConstraintSet,
    /// Objective after every iteration.
    pub trace: Vec<f64>,
    /// Outer iterations run.
    pub iterations: usize,
    /// Stop reason.
    pub termination: Termination,
    /// Constraint incoherence after every iteration, when tracked.
    pub incoherence: Vec<f64>,
}

impl<M: Metric> MpckFit<M> {
    /// Final objective value.
    pub fn objective(&self) -> Option<f64> {
        self.trace.last().copied()
    }

    /// Closed constraints the final assignment breaks.
    pub fn violations(&self) -> usize {
        self.constraints
            .pairs()
            .filter(|p| {
                let (a, b) = (self.assignment[p.lower()], self.assignment[p.higher()]);
                match p.link() {
                    LinkType::MustLink => a != b,
                    LinkType::CannotLink => a == b,
                    LinkType::DontCare => false,
                }
            })
            .count()
    }
}

/// MPCK-means clusterer over a metric family `M`.
#[derive(Debug, Clone)]
pub struct Mpck<M: Metric> {
    config: MpckConfig,
    metric: M,
}

impl<M: Metric> Mpck<M> {
    /// Create a clusterer with default settings for `k` clusters.
    pub fn new(k: usize, metric: M) -> Self {
        Self {
            config: MpckConfig::new(k),
            metric,
        }
    }

    /// Create a clusterer from a full configuration.
    pub fn with_config(config: MpckConfig, metric: M) -> Self {
        Self { config, metric }
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = Some(seed);
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &MpckConfig {
        &self.config
    }

    /// Fit with an RNG seeded from the configuration (or from entropy).
    pub fn fit(&self, data: &Dataset, constraints: &ConstraintSet) -> Result<MpckFit<M>> {
        let mut rng = match self.config.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        self.fit_with_rng(data, constraints, &mut rng)
    }

    /// Fit, drawing every random choice from `rng`.
    pub fn fit_with_rng<R: Rng + ?Sized>(
        &self,
        data: &Dataset,
        constraints: &ConstraintSet,
        rng: &mut R,
    ) -> Result<MpckFit<M>> {
        let config = &self.config;
        config.validate().map_err(|e| Error::InvalidParameter {
            name: "config",
            message: e.to_string(),
        })?;

        let n = data.num_instances();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if config.k > n {
            return Err(Error::InvalidClusterCount {
                requested: config.k,
                n_items: n,
            });
        }
        if constraints.n_points() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: constraints.n_points(),
            });
        }

        let data: Cow<'_, Dataset> = if self.metric.requires_normalization() {
            let mut owned = data.clone();
            owned.normalize();
            Cow::Owned(owned)
        } else {
            Cow::Borrowed(data)
        };
        let data = data.as_ref();

        let mut metric = self.metric.clone();
        metric.build(data)?;

        let closure = constraints.transitive_close()?;
        let seeding = initial_centroids(
            data,
            &closure,
            config.k,
            &metric,
            config.initializer,
            config.perturbation,
            rng,
        )?;
        let mut assignment = seeding.assignment;
        let per_cluster = config.learning == MetricLearning::PerCluster;
        let mut model = Model::new(seeding.centroids, metric, per_cluster);
        model.refresh_bounds(data, &assignment, config.cannot_link_bound);

        let closed = closure.into_constraints();
        let ctx = Context::new(data, &closed, ObjectiveWeights::from(config));
        let mut tracker = ObjectiveTracker::new(
            model.is_distance_based(),
            config.oscillation_tolerance,
            config.strict,
        );
        let mut incoherence_trace = Vec::new();

        info!(
            n,
            k = config.k,
            metric = model.metric(0).name(),
            constraints = closed.len(),
            "starting MPCK-means"
        );

        let mut blank = 0usize;
        let mut iterations = 0usize;
        let mut termination = Termination::MaxIterations;
        while iterations < config.max_iterations {
            let outcome = assign_points(&ctx, &model, &mut assignment, config.assigner, rng);
            let empty = estimate_centroids(data, &assignment, &mut model);
            train_metrics(&ctx, &mut model, &assignment, config.learning)?;
            model.refresh_bounds(data, &assignment, config.cannot_link_bound);

            let state = evaluate(&ctx, &model, &assignment);
            let objective = tracker.record(iterations, &state)?;
            iterations += 1;

            if config.track_incoherence {
                let value = incoherence(&closed, |i, j| {
                    let k = match assignment[i] {
                        UNASSIGNED => 0,
                        k => k,
                    };
                    model.metric(k).distance(data.instance(i), data.instance(j))
                });
                incoherence_trace.push(value);
            }

            blank = if outcome.moved == 0 { blank + 1 } else { 0 };
            debug!(
                iteration = iterations,
                moved = outcome.moved,
                empty,
                objective,
                variance = state.variance,
                must_link = state.must_link,
                cannot_link = state.cannot_link,
                "iteration complete"
            );

            if tracker
                .relative_change()
                .is_some_and(|change| change < config.epsilon)
            {
                termination = Termination::ObjectiveConverged;
                break;
            }
            if blank >= config.max_blank_iterations {
                termination = Termination::BlankIterations;
                break;
            }
        }

        info!(
            iterations,
            ?termination,
            objective = tracker.trace().last().copied().unwrap_or(f64::NAN),
            oscillations = tracker.oscillations(),
            "MPCK-means finished"
        );

        Ok(MpckFit {
            assignment,
            model,
            constraints: closed,
            trace: tracker.into_trace(),
            iterations,
            termination,
            incoherence: incoherence_trace,
        })
    }
}

impl<M: Metric> ConstrainedClustering for Mpck<M> {
    fn fit_predict(&self, data: &Dataset, constraints: &ConstraintSet) -> Result<Vec<usize>> {
        Ok(self.fit(data, constraints)?.assignment)
    }

    fn n_clusters(&self) -> usize {
        self.config.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Assigner, Initializer};
    use crate::metric::{KlDivergence, WeightedCosine, WeightedEuclidean};

    fn blobs() -> Dataset {
        Dataset::from_rows(&[
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![0.2, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
            vec![10.0, 10.2],
        ])
        .unwrap()
    }

    #[test]
    fn test_mpck_basic() {
        let data = blobs();
        let labels = Mpck::new(2, WeightedEuclidean::new())
            .with_seed(42)
            .fit_predict(&data, &ConstraintSet::new(6))
            .unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_all_points_assigned_in_range() {
        let data = Dataset::from_rows(
            &(0..40)
                .map(|i| vec![i as f64 * 0.1, (i % 5) as f64])
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let config = MpckConfig::new(4)
            .with_seed(123)
            .with_assigner(Assigner::RandomOrder)
            .with_initializer(Initializer::NeighborhoodsPlusPlus);
        let fit = Mpck::with_config(config, WeightedEuclidean::new())
            .fit(&data, &ConstraintSet::new(40))
            .unwrap();
        assert_eq!(fit.assignment.len(), 40);
        assert!(fit.assignment.iter().all(|&k| k < 4));
        assert!(fit.iterations >= 1);
        assert_eq!(fit.trace.len(), fit.iterations);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let data = blobs();
        let mpck = Mpck::new(7, WeightedEuclidean::new());
        assert!(matches!(
            mpck.fit(&data, &ConstraintSet::new(6)),
            Err(Error::InvalidClusterCount { requested: 7, n_items: 6 })
        ));

        let mpck = Mpck::new(2, WeightedEuclidean::new());
        assert!(matches!(
            mpck.fit(&data, &ConstraintSet::new(5)),
            Err(Error::DimensionMismatch { expected: 6, found: 5 })
        ));

        let mpck = Mpck::new(0, WeightedEuclidean::new());
        assert!(matches!(
            mpck.fit(&data, &ConstraintSet::new(6)),
            Err(Error::InvalidParameter { name: "config", .. })
        ));
    }

    #[test]
    fn test_incoherent_input_is_fatal() {
        let data = blobs();
        let mut set = ConstraintSet::new(6);
        set.add_constraint(0, 1, LinkType::MustLink).unwrap();
        set.add_constraint(1, 2, LinkType::MustLink).unwrap();
        set.add_constraint(0, 2, LinkType::CannotLink).unwrap();
        let result = Mpck::new(2, WeightedEuclidean::new()).with_seed(1).fit(&data, &set);
        assert!(matches!(result, Err(Error::IncoherentConstraints { .. })));
    }

    #[test]
    fn test_constraints_are_honored() {
        let data = blobs();
        let set = ConstraintSet::from_triples(
            6,
            [(0, 3, LinkType::MustLink), (1, 2, LinkType::CannotLink)],
        )
        .unwrap();
        let config = MpckConfig::new(2)
            .with_seed(7)
            .with_constraint_weights(1000.0, 1000.0)
            .with_learning(MetricLearning::Fixed);
        let fit = Mpck::with_config(config, WeightedEuclidean::new())
            .fit(&data, &set)
            .unwrap();
        assert_eq!(fit.assignment[0], fit.assignment[3]);
        assert_ne!(fit.assignment[1], fit.assignment[2]);
        assert_eq!(fit.violations(), 0);
    }

    #[test]
    fn test_incoherence_is_tracked() {
        let data = blobs();
        let set = ConstraintSet::from_triples(
            6,
            [(0, 1, LinkType::MustLink), (2, 3, LinkType::CannotLink)],
        )
        .unwrap();
        let config = MpckConfig::new(2).with_seed(3).with_incoherence_tracking(true);
        let fit = Mpck::with_config(config, WeightedEuclidean::new())
            .fit(&data, &set)
            .unwrap();
        assert_eq!(fit.incoherence.len(), fit.iterations);
        assert!(fit.incoherence.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_cosine_and_kl_runs() {
        let data = Dataset::from_rows(&[
            vec![5.0, 0.1, 0.1],
            vec![4.0, 0.2, 0.1],
            vec![0.1, 0.2, 6.0],
            vec![0.2, 0.1, 5.0],
        ])
        .unwrap();
        let set = ConstraintSet::from_triples(4, [(0, 2, LinkType::CannotLink)]).unwrap();

        let cos = Mpck::new(2, WeightedCosine::new()).with_seed(11).fit(&data, &set).unwrap();
        assert_eq!(cos.assignment[0], cos.assignment[1]);
        assert_ne!(cos.assignment[0], cos.assignment[2]);

        let kl = Mpck::new(2, KlDivergence::new()).with_seed(11).fit(&data, &set).unwrap();
        assert_eq!(kl.assignment[0], kl.assignment[1]);
        assert_eq!(kl.assignment[2], kl.assignment[3]);
        assert_ne!(kl.assignment[0], kl.assignment[2]);
    }
}
