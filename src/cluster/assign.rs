//! Constraint-aware assignment (E-step).
//!
//! Each point moves to the cluster minimizing
//!
//! ```text
//! cost_k(i) = sign·w_i·score(x_i, μ_k) − log_w·w_i·ln det A_k
//!           + Σ_{(i,j) ∈ ML, l_j ≠ k} w_ml · ½(penalty_k(i,j) + penalty_{l_j}(i,j))
//!           + Σ_{(i,j) ∈ CL, l_j = k} w_cl · (max_penalty_k − penalty_k(i,j))
//! ```
//!
//! where `sign` is +1 for distance-based metrics and −1 for similarity-based
//! ones. With a shared metric the must-link term reduces to
//! `w_ml · penalty(i,j)`.
//!
//! Points are updated in place as they are visited (iterated conditional
//! modes), so a point sees the moves made earlier in the same sweep. Every
//! pair term is symmetric in its endpoints, so each individual move can only
//! lower the objective.

use super::model::{Context, Model, UNASSIGNED};
use super::objective::ObjectiveState;
use crate::config::Assigner;
use crate::constraints::LinkType;
use crate::metric::Metric;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, instrument};

/// Decomposed cost of placing one point in one cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointCost {
    /// `w_i · score(x_i, μ_k)` in the metric's own orientation.
    pub score: f64,
    /// Violated must-link penalties, weighted.
    pub must_link: f64,
    /// Violated cannot-link penalties, weighted.
    pub cannot_link: f64,
    /// `log_w · w_i · ln det A_k`.
    pub log_normalizer: f64,
    /// Cannot-link terms that came out negative.
    pub negative_cannot_links: usize,
}

impl PointCost {
    /// Scalar cost to minimize.
    pub fn total(&self, distance_based: bool) -> f64 {
        let sign = if distance_based { 1.0 } else { -1.0 };
        sign * self.score + self.must_link + self.cannot_link - self.log_normalizer
    }
}

/// Cost of placing point `i` in cluster `k`, with every other point where
/// `assignment` says it is.
pub fn point_cost<M: Metric>(
    ctx: &Context<'_>,
    model: &Model<M>,
    assignment: &[usize],
    i: usize,
    k: usize,
) -> PointCost {
    let x = ctx.data.instance(i);
    let metric = model.metric(k);
    let mut cost = PointCost {
        score: x.weight() * metric.score(x, model.centroid(k)),
        log_normalizer: ctx.weights.log_term * x.weight() * metric.normalizer(),
        ..PointCost::default()
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
                let penalty = if model.is_per_cluster() {
                    0.5 * (metric.penalty(x, y) + model.metric(other).penalty(x, y))
                } else {
                    metric.penalty(x, y)
                };
                cost.must_link += ctx.weights.must_link * penalty;
            }
            LinkType::CannotLink if other == k => {
                let term = ctx.weights.cannot_link * (model.max_penalty(k) - metric.penalty(x, y));
                if term < 0.0 {
                    cost.negative_cannot_links += 1;
                    debug!(
                        point = i,
                        partner = j,
                        cluster = k,
                        value = term,
                        "negative cannot-link contribution"
                    );
                }
                cost.cannot_link += term;
            }
            _ => {}
        }
    }
    cost
}

/// Result of one assignment sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentOutcome {
    /// Points whose cluster changed (including first assignments).
    pub moved: usize,
    /// Objective components accumulated during the sweep. Constraint terms
    /// are seen from both endpoints and reflect the assignment at visit time,
    /// so these are approximate; the tracker recomputes the exact value.
    pub components: ObjectiveState,
    /// Negative cannot-link terms met in the chosen clusters.
    pub negative_cannot_links: usize,
}

/// Assign every point to its cheapest cluster, ties going to the lowest index.
#[instrument(skip_all, fields(n = assignment.len(), k = model.k()))]
pub fn assign_points<M: Metric, R: Rng + ?Sized>(
    ctx: &Context<'_>,
    model: &Model<M>,
    assignment: &mut [usize],
    order: Assigner,
    rng: &mut R,
) -> AssignmentOutcome {
    let distance_based = model.is_distance_based();
    let mut visit: Vec<usize> = (0..assignment.len()).collect();
    if order == Assigner::RandomOrder {
        visit.shuffle(rng);
    }

    let mut outcome = AssignmentOutcome::default();
    for i in visit {
        let mut best: Option<(usize, PointCost, f64)> = None;
        for k in 0..model.k() {
            let cost = point_cost(ctx, model, assignment, i, k);
            let total = cost.total(distance_based);
            if best.as_ref().map_or(true, |&(_, _, b)| total < b) {
                best = Some((k, cost, total));
            }
        }
        let Some((k, cost, _)) = best else {
            continue;
        };
        if assignment[i] != k {
            assignment[i] = k;
            outcome.moved += 1;
        }
        outcome.negative_cannot_links += cost.negative_cannot_links;
        outcome.components.add_point(&cost);
    }

    if outcome.negative_cannot_links > 0 {
        debug!(
            count = outcome.negative_cannot_links,
            "negative cannot-link contributions in chosen clusters"
        );
    }
    debug!(moved = outcome.moved, "assignment step complete");
    outcome
}
