//! Objective evaluation and oscillation detection.
//!
//! The objective is recomputed from scratch after every iteration so that the
//! tracked value never depends on the order in which the assignment step met
//! the points. Each constraint is counted once (both endpoints see it, each
//! contributes half).

use super::assign::PointCost;
use super::model::{Context, Model, UNASSIGNED};
use crate::constraints::LinkType;
use crate::error::{Error, Result};
use crate::metric::Metric;
use tracing::warn;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Components of the MPCK objective.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObjectiveState {
    /// `Σ_i w_i · score(x_i, μ_{l_i})`.
    pub variance: f64,
    /// Weighted violated must-link penalties.
    pub must_link: f64,
    /// Weighted violated cannot-link penalties.
    pub cannot_link: f64,
    /// `Σ_i log_w · w_i · ln det A_{l_i}`.
    pub log_normalizer: f64,
    /// `λ · Σ_m regularizer(m)`.
    pub regularizer: f64,
}

impl ObjectiveState {
    /// Scalar objective.
    ///
    /// Distance-based metrics yield a cost that a correct run never increases.
    /// Similarity-based metrics yield a score that it never decreases.
    pub fn total(&self, distance_based: bool) -> f64 {
        if distance_based {
            self.variance + self.must_link + self.cannot_link - self.log_normalizer + self.regularizer
        } else {
            self.variance - self.must_link - self.cannot_link + self.log_normalizer - self.regularizer
        }
    }

    pub(crate) fn add_point(&mut self, cost: &PointCost) {
        self.variance += cost.score;
        self.must_link += cost.must_link;
        self.cannot_link += cost.cannot_link;
        self.log_normalizer += cost.log_normalizer;
    }

    fn merge(mut self, other: Self) -> Self {
        self.variance += other.variance;
        self.must_link += other.must_link;
        self.cannot_link += other.cannot_link;
        self.log_normalizer += other.log_normalizer;
        self.regularizer += other.regularizer;
        self
    }
}

/// Contribution of point `i` under the current assignment, constraint terms halved.
fn point_state<M: Metric>(
    ctx: &Context<'_>,
    model: &Model<M>,
    assignment: &[usize],
    i: usize,
) -> ObjectiveState {
    let k = assignment[i];
    if k == UNASSIGNED {
        return ObjectiveState::default();
    }
    let x = ctx.data.instance(i);
    let metric = model.metric(k);
    let mut state = ObjectiveState {
        variance: x.weight() * metric.score(x, model.centroid(k)),
        log_normalizer: ctx.weights.log_term * x.weight() * metric.normalizer(),
        ..ObjectiveState::default()
    };

    for pair in ctx.constraints.constraints_of(i) {
        let j = pair.partner(i);
        let other = assignment[j];
        if other == UNASSIGNED {
            continue;
        }
        let y = ctx.data.instance(j);
        match pair.link() {
            LinkType::MustLink if other != k => {
                let penalty = 0.5 * (metric.penalty(x, y) + model.metric(other).penalty(x, y));
                state.must_link += 0.5 * ctx.weights.must_link * penalty;
            }
            LinkType::CannotLink if other == k => {
                let term = model.max_penalty(k) - metric.penalty(x, y);
                state.cannot_link += 0.5 * ctx.weights.cannot_link * term;
            }
            _ => {}
        }
    }
    state
}

/// Recompute the full objective for `assignment`.
pub fn evaluate<M: Metric>(
    ctx: &Context<'_>,
    model: &Model<M>,
    assignment: &[usize],
) -> ObjectiveState {
    // summed in index order, independent of the thread schedule
    #[cfg(feature = "parallel")]
    let state = (0..assignment.len())
        .into_par_iter()
        .map(|i| point_state(ctx, model, assignment, i))
        .collect::<Vec<_>>()
        .into_iter()
        .fold(ObjectiveState::default(), ObjectiveState::merge);

    #[cfg(not(feature = "parallel"))]
    let state = (0..assignment.len())
        .map(|i| point_state(ctx, model, assignment, i))
        .fold(ObjectiveState::default(), ObjectiveState::merge);

    let regularizer: f64 = model.metrics().iter().map(|m| m.regularizer()).sum();
    ObjectiveState {
        regularizer: ctx.weights.regularizer * regularizer,
        ..state
    }
}

/// Records the objective per iteration and flags movement in the wrong direction.
#[derive(Debug, Clone)]
pub struct ObjectiveTracker {
    distance_based: bool,
    tolerance: f64,
    strict: bool,
    trace: Vec<f64>,
    oscillations: usize,
}

impl ObjectiveTracker {
    /// New tracker. `tolerance` is relative to the previous value.
    pub fn new(distance_based: bool, tolerance: f64, strict: bool) -> Self {
        Self {
            distance_based,
            tolerance,
            strict,
            trace: Vec::new(),
            oscillations: 0,
        }
    }

    /// Append the objective of `iteration` and return its scalar value.
    ///
    /// # Errors
    ///
    /// [`Error::Oscillation`] in strict mode when the objective moved the wrong
    /// way by more than the tolerance. The value is still recorded.
    pub fn record(&mut self, iteration: usize, state: &ObjectiveState) -> Result<f64> {
        let current = state.total(self.distance_based);
        let previous = self.trace.last().copied();
        self.trace.push(current);

        let Some(previous) = previous else {
            return Ok(current);
        };
        let worsened = if self.distance_based {
            current - previous
        } else {
            previous - current
        };
        if worsened > self.tolerance * previous.abs().max(1.0) {
            self.oscillations += 1;
            if self.strict {
                return Err(Error::Oscillation {
                    iteration,
                    previous,
                    current,
                });
            }
            warn!(iteration, previous, current, "objective moved in the wrong direction");
        }
        Ok(current)
    }

    /// Relative change between the last two recorded values, if there are two.
    pub fn relative_change(&self) -> Option<f64> {
        match self.trace.as_slice() {
            [.., previous, current] => {
                Some((current - previous).abs() / previous.abs().max(f64::EPSILON))
            }
            _ => None,
        }
    }

    /// Objective after every iteration.
    pub fn trace(&self) -> &[f64] {
        &self.trace
    }

    /// Number of wrong-direction movements seen.
    pub fn oscillations(&self) -> usize {
        self.oscillations
    }

    /// Consume the tracker, keeping the trace.
    pub fn into_trace(self) -> Vec<f64> {
        self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::model::ObjectiveWeights;
    use crate::config::CannotLinkBound;
    use crate::constraints::ConstraintSet;
    use crate::data::{Dataset, Instance};
    use crate::metric::WeightedEuclidean;

    fn setup(constraints: &ConstraintSet) -> (Dataset, Model<WeightedEuclidean>) {
        let data = Dataset::from_rows(&[vec![0.0], vec![1.0], vec![10.0]]).unwrap();
        let mut metric = WeightedEuclidean::new();
        metric.build(&data).unwrap();
        let mut model = Model::new(
            vec![Instance::dense(vec![0.5]), Instance::dense(vec![10.0])],
            metric,
            false,
        );
        model.refresh_bounds(&data, &[UNASSIGNED; 3], CannotLinkBound::Dataset);
        assert_eq!(constraints.n_points(), 3);
        (data, model)
    }

    #[test]
    fn test_unconstrained_objective_is_variance() {
        let constraints = ConstraintSet::new(3);
        let (data, model) = setup(&constraints);
        let ctx = Context::new(&data, &constraints, ObjectiveWeights::default());
        let state = evaluate(&ctx, &model, &[0, 0, 1]);
        assert_eq!(state.variance, 0.5);
        assert_eq!(state.must_link, 0.0);
        assert_eq!(state.cannot_link, 0.0);
        assert_eq!(state.total(true), 0.5);
    }

    #[test]
    fn test_constraints_counted_once() {
        let constraints = ConstraintSet::from_triples(
            3,
            [(0, 1, LinkType::CannotLink), (1, 2, LinkType::MustLink)],
        )
        .unwrap();
        let (data, model) = setup(&constraints);
        let ctx = Context::new(&data, &constraints, ObjectiveWeights::default());
        let state = evaluate(&ctx, &model, &[0, 0, 1]);
        assert_eq!(state.cannot_link, 100.0 - 1.0);
        assert_eq!(state.must_link, 81.0);
    }

    #[test]
    fn test_unassigned_points_contribute_nothing() {
        let constraints = ConstraintSet::from_triples(3, [(0, 2, LinkType::MustLink)]).unwrap();
        let (data, model) = setup(&constraints);
        let ctx = Context::new(&data, &constraints, ObjectiveWeights::default());
        let state = evaluate(&ctx, &model, &[0, UNASSIGNED, UNASSIGNED]);
        assert_eq!(state.variance, 0.25);
        assert_eq!(state.must_link, 0.0);
    }

    #[test]
    fn test_evaluate_sums_points_in_index_order() {
        let rows: Vec<Vec<f64>> = (0..4096)
            .map(|i| vec![(i as f64 * 0.7311).sin() * 1e3, (i as f64).sqrt() / 7.0])
            .collect();
        let data = Dataset::from_rows(&rows).unwrap();
        let constraints = ConstraintSet::new(rows.len());
        let mut metric = WeightedEuclidean::new();
        metric.build(&data).unwrap();
        let model = Model::new(
            vec![Instance::dense(vec![-300.0, 1.0]), Instance::dense(vec![400.0, 8.0])],
            metric,
            false,
        );
        let assignment: Vec<usize> = (0..rows.len()).map(|i| i % 2).collect();
        let ctx = Context::new(&data, &constraints, ObjectiveWeights::default());

        let mut expected = (0..rows.len())
            .map(|i| point_state(&ctx, &model, &assignment, i))
            .fold(ObjectiveState::default(), ObjectiveState::merge);
        expected.regularizer = ctx.weights.regularizer * model.metrics()[0].regularizer();

        for _ in 0..4 {
            assert_eq!(evaluate(&ctx, &model, &assignment), expected);
        }
    }

    #[test]
    fn test_tracker_warns_but_continues() {
        let mut tracker = ObjectiveTracker::new(true, 1e-9, false);
        let a = ObjectiveState {
            variance: 10.0,
            ..Default::default()
        };
        let b = ObjectiveState {
            variance: 12.0,
            ..Default::default()
        };
        tracker.record(0, &a).unwrap();
        assert_eq!(tracker.record(1, &b).unwrap(), 12.0);
        assert_eq!(tracker.oscillations(), 1);
        assert_eq!(tracker.trace(), &[10.0, 12.0]);
        assert_eq!(tracker.relative_change(), Some(0.2));
    }

    #[test]
    fn test_tracker_strict_mode_errors() {
        let mut tracker = ObjectiveTracker::new(true, 1e-9, true);
        let a = ObjectiveState {
            variance: 10.0,
            ..Default::default()
        };
        let b = ObjectiveState {
            variance: 11.0,
            ..Default::default()
        };
        tracker.record(0, &a).unwrap();
        let err = tracker.record(1, &b).unwrap_err();
        assert!(matches!(err, Error::Oscillation { iteration: 1, .. }));
    }

    #[test]
    fn test_similarity_orientation() {
        let mut tracker = ObjectiveTracker::new(false, 1e-9, true);
        let low = ObjectiveState {
            variance: 1.0,
            ..Default::default()
        };
        let high = ObjectiveState {
            variance: 2.0,
            ..Default::default()
        };
        tracker.record(0, &low).unwrap();
        assert!(tracker.record(1, &high).is_ok());
        assert!(tracker.record(2, &low).is_err());
    }
}
