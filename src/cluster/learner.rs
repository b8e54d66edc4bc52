//! Metric weight learning.
//!
//! Gathers per-attribute sufficient statistics from the current assignment and
//! hands them to [`Metric::train`]. Must-link violations spanning two clusters
//! charge half of their components to each side when metrics are per cluster.

use super::model::{Context, Model, UNASSIGNED};
use crate::config::MetricLearning;
use crate::constraints::LinkType;
use crate::error::Result;
use crate::metric::{Metric, WeightStatistics};
use tracing::{debug, instrument};

fn add_scaled(out: &mut [f64], from: &[f64], scale: f64) {
    out.iter_mut().zip(from).for_each(|(o, f)| *o += scale * f);
}

/// Re-estimate the metric weights from `assignment`.
///
/// With [`MetricLearning::Fixed`] nothing changes.
#[instrument(skip_all, fields(learning = ?learning))]
pub fn train_metrics<M: Metric>(
    ctx: &Context<'_>,
    model: &mut Model<M>,
    assignment: &[usize],
    learning: MetricLearning,
) -> Result<()> {
    if learning == MetricLearning::Fixed {
        return Ok(());
    }
    let dim = ctx.data.num_attributes();
    let n_stats = model.metrics().len();
    // index into `stats` for cluster k
    let slot = |k: usize| if n_stats == 1 { 0 } else { k };
    let mut stats =
        vec![WeightStatistics::new(dim, ctx.weights.log_term, ctx.weights.regularizer); n_stats];

    for (i, &k) in assignment.iter().enumerate() {
        if k == UNASSIGNED {
            continue;
        }
        let x = ctx.data.instance(i);
        let s = &mut stats[slot(k)];
        s.members += x.weight();
        model
            .metric(k)
            .score_components(x, model.centroid(k), x.weight(), &mut s.spread);
    }

    for pair in ctx.constraints.pairs() {
        let (i, j) = pair.key();
        let (ki, kj) = (assignment[i], assignment[j]);
        if ki == UNASSIGNED || kj == UNASSIGNED {
            continue;
        }
        let (x, y) = (ctx.data.instance(i), ctx.data.instance(j));
        match pair.link() {
            LinkType::MustLink if ki != kj => {
                if n_stats == 1 {
                    model
                        .metric(ki)
                        .penalty_components(x, y, ctx.weights.must_link, &mut stats[0].must_link);
                } else {
                    let half = 0.5 * ctx.weights.must_link;
                    model
                        .metric(ki)
                        .penalty_components(x, y, half, &mut stats[ki].must_link);
                    model
                        .metric(kj)
                        .penalty_components(x, y, half, &mut stats[kj].must_link);
                }
            }
            LinkType::CannotLink if ki == kj => {
                let s = &mut stats[slot(ki)];
                model
                    .metric(ki)
                    .penalty_components(x, y, ctx.weights.cannot_link, &mut s.cannot_link);
                add_scaled(
                    &mut s.cannot_link_bound,
                    model.bound_components(ki),
                    ctx.weights.cannot_link,
                );
            }
            _ => {}
        }
    }

    for (m, (metric, s)) in model.metrics_mut().iter_mut().zip(&stats).enumerate() {
        metric.train(s)?;
        debug!(
            metric = m,
            members = s.members,
            normalizer = metric.normalizer(),
            "metric weights updated"
        );
    }
    Ok(())
}
