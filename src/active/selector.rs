//! Explore / Consolidate query selection.

use std::collections::BTreeSet;
use std::ops::Range;

use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info, instrument};

use super::oracle::Oracle;
use crate::config::{ActiveConfig, ConsolidationOrder};
use crate::constraints::{Closure, ConstraintSet, LinkType};
use crate::data::{Dataset, Instance};
use crate::error::{Error, Result};
use crate::metric::Metric;

/// What a selection run produced.
#[derive(Debug, Clone)]
pub struct ActiveOutcome {
    /// Oracle questions actually asked.
    pub queries: usize,
    /// Disjoint neighborhoods discovered, in discovery order.
    pub neighborhoods: Vec<Vec<usize>>,
    /// Points visited by the farthest-first traversal, in order.
    pub traversal: Vec<usize>,
    /// Whether the budget ran out before both phases finished.
    pub budget_exhausted: bool,
    /// Closure of the constraint set after all answers were added.
    pub closure: Closure,
}

/// Mutable state shared by both phases.
struct Session<'s, O: ?Sized> {
    constraints: &'s mut ConstraintSet,
    oracle: &'s mut O,
    budget: usize,
    queries: usize,
    exhausted: bool,
    neighborhoods: Vec<Vec<usize>>,
    placed: Vec<bool>,
}

impl<O: Oracle + ?Sized> Session<'_, O> {
    /// Single oracle call site. `None` once the budget is spent.
    fn query(&mut self, i: usize, j: usize) -> Result<Option<LinkType>> {
        let known = self.constraints.link(i, j);
        if known != LinkType::DontCare {
            return Ok(Some(known));
        }
        if self.queries >= self.budget {
            self.exhausted = true;
            return Ok(None);
        }
        let answer = self.oracle.ask(i, j);
        self.queries += 1;
        if answer != LinkType::DontCare {
            self.constraints.add_constraint(i, j, answer)?;
        }
        debug!(i, j, %answer, queries = self.queries, "oracle answered");
        Ok(Some(answer))
    }

    fn budget_left(&mut self) -> bool {
        if self.queries >= self.budget {
            self.exhausted = true;
        }
        !self.exhausted
    }

    fn join(&mut self, point: usize, neighborhood: usize) {
        self.neighborhoods[neighborhood].push(point);
        self.placed[point] = true;
    }

    fn seed(&mut self, point: usize) {
        self.neighborhoods.push(vec![point]);
        self.placed[point] = true;
    }

    /// Ask `point` against each neighborhood in `order` until a must-link.
    ///
    /// Returns `Ok(true)` when the point was placed or seeded a neighborhood.
    fn place(&mut self, point: usize, order: &[usize], may_seed: bool) -> Result<bool> {
        let mut all_cannot = true;
        for &nb in order {
            let rep = self.neighborhoods[nb][0];
            match self.query(point, rep)? {
                None => return Ok(false),
                Some(LinkType::MustLink) => {
                    self.join(point, nb);
                    return Ok(true);
                }
                Some(LinkType::CannotLink) => {}
                Some(LinkType::DontCare) => all_cannot = false,
            }
        }
        if all_cannot && may_seed {
            self.seed(point);
            return Ok(true);
        }
        Ok(false)
    }
}

/// Budgeted active selection of pairwise constraints.
///
/// **Explore** walks the permitted points farthest-first, discovering up to K
/// disjoint neighborhoods by asking each new point against one representative
/// per neighborhood. **Consolidate** then grows the neighborhoods one point at
/// a time until the budget runs out.
///
/// # References
///
/// - Basu, Banerjee, Mooney (2004). "Active Semi-Supervision for Pairwise
///   Constrained Clustering"
#[derive(Debug, Clone)]
pub struct ActiveSelector<'a, M: Metric> {
    data: &'a Dataset,
    metric: &'a M,
    k: usize,
    budget: usize,
    consolidation: ConsolidationOrder,
    permitted: Range<usize>,
}

impl<'a, M: Metric> ActiveSelector<'a, M> {
    /// New selector over a built `metric`.
    pub fn new(data: &'a Dataset, metric: &'a M, k: usize, config: &ActiveConfig) -> Result<Self> {
        let n = data.num_instances();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if k == 0 {
            return Err(Error::InvalidClusterCount {
                requested: k,
                n_items: n,
            });
        }
        if metric.weights().len() != data.num_attributes() {
            return Err(Error::DimensionMismatch {
                expected: data.num_attributes(),
                found: metric.weights().len(),
            });
        }
        let permitted = config.permitted.clone().unwrap_or(0..n);
        if permitted.is_empty() {
            return Err(Error::InvalidParameter {
                name: "permitted",
                message: "permitted range is empty".into(),
            });
        }
        if permitted.end > n {
            return Err(Error::IndexOutOfRange {
                index: permitted.end - 1,
                len: n,
            });
        }
        Ok(Self {
            data,
            metric,
            k,
            budget: config.budget,
            consolidation: config.consolidation,
            permitted,
        })
    }

    fn check_permitted(&self, point: usize) -> Result<usize> {
        if self.permitted.contains(&point) {
            Ok(point)
        } else {
            Err(Error::QueryOutOfRange {
                index: point,
                start: self.permitted.start,
                end: self.permitted.end,
            })
        }
    }

    /// Lower is closer, for either metric orientation.
    fn closeness(&self, i: usize, centroid: &Instance) -> f64 {
        let x = self.data.instance(i);
        if self.metric.is_distance_based() {
            self.metric.distance(x, centroid)
        } else {
            -self.metric.similarity(x, centroid)
        }
    }

    /// Run both phases, adding every answer to `constraints`.
    ///
    /// Running out of budget is a normal outcome, flagged in
    /// [`ActiveOutcome::budget_exhausted`].
    ///
    /// # Errors
    ///
    /// - [`Error::QueryOutOfRange`] if a selected point lies outside the
    ///   permitted range.
    /// - [`Error::IncoherentConstraints`] if the oracle contradicts itself.
    #[instrument(skip_all, fields(k = self.k, budget = self.budget))]
    pub fn run<O, R>(
        &self,
        constraints: &mut ConstraintSet,
        oracle: &mut O,
        rng: &mut R,
    ) -> Result<ActiveOutcome>
    where
        O: Oracle + ?Sized,
        R: Rng + ?Sized,
    {
        let n = self.data.num_instances();
        if constraints.n_points() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: constraints.n_points(),
            });
        }
        let mut session = Session {
            constraints,
            oracle,
            budget: self.budget,
            queries: 0,
            exhausted: false,
            neighborhoods: Vec::new(),
            placed: vec![false; n],
        };

        let traversal = self.explore(&mut session, rng)?;
        debug!(
            neighborhoods = session.neighborhoods.len(),
            queries = session.queries,
            "explore phase complete"
        );
        if !session.exhausted {
            self.consolidate(&mut session, rng)?;
        }

        let Session {
            constraints,
            queries,
            exhausted,
            neighborhoods,
            ..
        } = session;
        let closure = constraints.transitive_close()?;
        info!(
            queries,
            neighborhoods = neighborhoods.len(),
            constraints = constraints.len(),
            budget_exhausted = exhausted,
            "active selection finished"
        );
        Ok(ActiveOutcome {
            queries,
            neighborhoods,
            traversal,
            budget_exhausted: exhausted,
            closure,
        })
    }

    fn explore<O, R>(&self, session: &mut Session<'_, O>, rng: &mut R) -> Result<Vec<usize>>
    where
        O: Oracle + ?Sized,
        R: Rng + ?Sized,
    {
        let distance_based = self.metric.is_distance_based();
        let first = self.check_permitted(rng.random_range(self.permitted.clone()))?;
        session.seed(first);
        let mut traversal = vec![first];

        // per permitted point: min distance (or minus max similarity) to the explored set
        let offset = self.permitted.start;
        let mut spread: Vec<f64> = self
            .permitted
            .clone()
            .map(|p| self.separation(p, first, distance_based))
            .collect();
        let mut explored = vec![false; spread.len()];
        explored[first - offset] = true;

        while session.neighborhoods.len() < self.k && session.budget_left() {
            let best = spread
                .iter()
                .zip(&explored)
                .filter(|&(_, &e)| !e)
                .map(|(&s, _)| s)
                .fold(f64::NEG_INFINITY, f64::max);
            let ties: Vec<usize> = (0..spread.len())
                .filter(|&p| !explored[p] && spread[p] == best)
                .collect();
            let Some(&pick) = ties.choose(rng) else {
                break;
            };
            let point = self.check_permitted(pick + offset)?;
            explored[pick] = true;
            traversal.push(point);
            for (p, s) in spread.iter_mut().enumerate() {
                *s = s.min(self.separation(p + offset, point, distance_based));
            }

            let order: Vec<usize> = (0..session.neighborhoods.len()).collect();
            session.place(point, &order, true)?;
        }
        Ok(traversal)
    }

    /// Larger means farther apart.
    fn separation(&self, a: usize, b: usize, distance_based: bool) -> f64 {
        let (x, y) = (self.data.instance(a), self.data.instance(b));
        if distance_based {
            self.metric.distance(x, y)
        } else {
            -self.metric.similarity(x, y)
        }
    }

    fn consolidate<O, R>(&self, session: &mut Session<'_, O>, rng: &mut R) -> Result<()>
    where
        O: Oracle + ?Sized,
        R: Rng + ?Sized,
    {
        let mut skipped = BTreeSet::new();
        while session.budget_left() {
            let candidates: Vec<usize> = self
                .permitted
                .clone()
                .filter(|&p| !session.placed[p] && !skipped.contains(&p))
                .collect();
            if candidates.is_empty() {
                break;
            }

            let centroids: Vec<_> = session
                .neighborhoods
                .iter()
                .map(|nb| self.data.weighted_mean(nb))
                .collect();
            let smallest = (0..session.neighborhoods.len())
                .min_by_key(|&nb| session.neighborhoods[nb].len());

            let pick = match (self.consolidation, smallest) {
                (ConsolidationOrder::NearestToSmallest, Some(s)) => match &centroids[s] {
                    Some(c) => candidates
                        .iter()
                        .copied()
                        .min_by(|&a, &b| self.closeness(a, c).total_cmp(&self.closeness(b, c))),
                    None => candidates.first().copied(),
                },
                _ => candidates.choose(rng).copied(),
            };
            let Some(point) = pick else {
                break;
            };
            let point = self.check_permitted(point)?;

            let mut order: Vec<usize> = (0..session.neighborhoods.len()).collect();
            if let Some(s) = smallest {
                order.retain(|&nb| nb != s);
                order.sort_by(|&a, &b| {
                    let ca = centroids[a].as_ref().map_or(f64::INFINITY, |c| self.closeness(point, c));
                    let cb = centroids[b].as_ref().map_or(f64::INFINITY, |c| self.closeness(point, c));
                    ca.total_cmp(&cb)
                });
                order.insert(0, s);
            }

            let may_seed = session.neighborhoods.len() < self.k;
            if !session.place(point, &order, may_seed)? && !session.exhausted {
                skipped.insert(point);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::LabelOracle;
    use crate::metric::WeightedEuclidean;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square() -> (Dataset, WeightedEuclidean) {
        let data = Dataset::from_rows(&[
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
        ])
        .unwrap();
        let mut metric = WeightedEuclidean::new();
        metric.build(&data).unwrap();
        (data, metric)
    }

    fn config(budget: usize) -> ActiveConfig {
        ActiveConfig {
            budget,
            ..ActiveConfig::default()
        }
    }

    #[test]
    fn test_farthest_first_on_square() {
        let (data, metric) = square();
        for seed in 0..8 {
            let selector = ActiveSelector::new(&data, &metric, 4, &config(3)).unwrap();
            let mut set = ConstraintSet::new(4);
            let mut oracle = LabelOracle::new(vec![0, 1, 2, 3]);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let outcome = selector.run(&mut set, &mut oracle, &mut rng).unwrap();

            let t = &outcome.traversal;
            assert_eq!(t.len(), 3);
            // opposite corner: index xor 3
            assert_eq!(t[1], t[0] ^ 3);
            assert!(t[2] != t[0] && t[2] != t[1]);
            assert_eq!(outcome.queries, 3);
            assert!(outcome.budget_exhausted);
            assert_eq!(outcome.neighborhoods.len(), 3);
            assert_eq!(set.cannot_links().count(), 3);
        }
    }

    #[test]
    fn test_explore_then_consolidate_recovers_groups() {
        let data = Dataset::from_rows(&[
            vec![0.0, 0.0],
            vec![0.2, 0.1],
            vec![0.1, 0.3],
            vec![9.0, 9.0],
            vec![9.2, 9.1],
            vec![9.1, 8.8],
        ])
        .unwrap();
        let mut metric = WeightedEuclidean::new();
        metric.build(&data).unwrap();
        let labels = vec![0, 0, 0, 1, 1, 1];
        let selector = ActiveSelector::new(&data, &metric, 2, &config(50)).unwrap();
        let mut set = ConstraintSet::new(6);
        let mut oracle = LabelOracle::new(labels.clone());
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let outcome = selector.run(&mut set, &mut oracle, &mut rng).unwrap();

        assert!(!outcome.budget_exhausted);
        assert_eq!(outcome.neighborhoods.len(), 2);
        for nb in &outcome.neighborhoods {
            assert!(nb.iter().all(|&p| labels[p] == labels[nb[0]]));
        }
        let covered: usize = outcome.neighborhoods.iter().map(Vec::len).sum();
        assert_eq!(covered, 6);
        assert_eq!(outcome.closure.neighborhoods().len(), 2);
    }

    #[test]
    fn test_zero_budget_only_picks_first_point() {
        let (data, metric) = square();
        let selector = ActiveSelector::new(&data, &metric, 2, &config(0)).unwrap();
        let mut set = ConstraintSet::new(4);
        let mut oracle = LabelOracle::new(vec![0, 0, 1, 1]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let outcome = selector.run(&mut set, &mut oracle, &mut rng).unwrap();
        assert_eq!(outcome.queries, 0);
        assert_eq!(outcome.traversal.len(), 1);
        assert!(outcome.budget_exhausted);
        assert!(set.is_empty());
    }

    #[test]
    fn test_permitted_range_respected() {
        let (data, metric) = square();
        let cfg = ActiveConfig {
            budget: 10,
            permitted: Some(0..2),
            ..ActiveConfig::default()
        };
        let selector = ActiveSelector::new(&data, &metric, 2, &cfg).unwrap();
        let mut set = ConstraintSet::new(4);
        let mut oracle = LabelOracle::new(vec![0, 1, 0, 1]);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let outcome = selector.run(&mut set, &mut oracle, &mut rng).unwrap();
        assert!(outcome.traversal.iter().all(|&p| p < 2));
        assert!(set.pairs().all(|p| p.higher() < 2));
    }

    #[test]
    fn test_bad_permitted_range() {
        let (data, metric) = square();
        let cfg = ActiveConfig {
            permitted: Some(2..9),
            ..ActiveConfig::default()
        };
        assert!(matches!(
            ActiveSelector::new(&data, &metric, 2, &cfg),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_unbuilt_metric_rejected() {
        let (data, _) = square();
        let metric = WeightedEuclidean::new();
        assert!(matches!(
            ActiveSelector::new(&data, &metric, 2, &config(3)),
            Err(Error::DimensionMismatch { expected: 2, found: 0 })
        ));
    }

    #[test]
    fn test_dont_care_answers_record_nothing() {
        let (data, metric) = square();
        let selector = ActiveSelector::new(&data, &metric, 2, &config(5)).unwrap();
        let mut set = ConstraintSet::new(4);
        let mut oracle = |_: usize, _: usize| LinkType::DontCare;
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let outcome = selector.run(&mut set, &mut oracle, &mut rng).unwrap();
        assert!(set.is_empty());
        assert_eq!(outcome.neighborhoods.len(), 1);
        assert!(outcome.queries <= 5);
    }
}
