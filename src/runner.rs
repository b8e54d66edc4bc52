//! End-to-end run driven by an [`MpckConfig`].
//!
//! Picks the metric family, optionally spends the active-query budget, clusters,
//! and writes the configured artifacts. One RNG, seeded once, feeds every
//! random choice of the run.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::active::{ActiveSelector, LabelOracle, Oracle};
use crate::cluster::{Mpck, Termination};
use crate::config::{ActiveConfig, MetricKind, MpckConfig};
use crate::constraints::ConstraintSet;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::metric::{KlDivergence, Metric, WeightedCosine, WeightedEuclidean};
use crate::report::{write_assignments, write_incoherence};

/// Active-selection summary of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSummary {
    /// Oracle questions asked.
    pub queries: usize,
    /// Neighborhoods discovered.
    pub neighborhoods: usize,
    /// Whether the budget ran out.
    pub budget_exhausted: bool,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Cluster of every point.
    pub assignment: Vec<usize>,
    /// Objective after every iteration.
    pub trace: Vec<f64>,
    /// Outer iterations run.
    pub iterations: usize,
    /// Stop reason.
    pub termination: Termination,
    /// Constraint incoherence per iteration (empty unless tracked).
    pub incoherence: Vec<f64>,
    /// Constraints after active selection, before closure.
    pub constraints: ConstraintSet,
    /// Closed constraints broken by the final assignment.
    pub violations: usize,
    /// Present when active selection ran.
    pub active: Option<ActiveSummary>,
}

/// Run MPCK-means as configured.
///
/// When `config.active` is set, queries go to `oracle`, or to the dataset's
/// class labels when no oracle is given.
pub fn run(
    config: &MpckConfig,
    data: &Dataset,
    constraints: ConstraintSet,
    oracle: Option<&mut dyn Oracle>,
) -> Result<RunReport> {
    config.validate().map_err(|e| Error::InvalidParameter {
        name: "config",
        message: e.to_string(),
    })?;
    let mut rng = match config.random_seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    };
    match config.metric {
        MetricKind::Euclidean => {
            run_with(config, data, constraints, oracle, WeightedEuclidean::new(), &mut rng)
        }
        MetricKind::Cosine => {
            run_with(config, data, constraints, oracle, WeightedCosine::new(), &mut rng)
        }
        MetricKind::Kl => {
            run_with(config, data, constraints, oracle, KlDivergence::new(), &mut rng)
        }
    }
}

fn run_with<M: Metric, R: Rng + ?Sized>(
    config: &MpckConfig,
    data: &Dataset,
    mut constraints: ConstraintSet,
    oracle: Option<&mut dyn Oracle>,
    metric: M,
    rng: &mut R,
) -> Result<RunReport> {
    let active = match &config.active {
        Some(active) => {
            let summary = match oracle {
                Some(o) => select(config.k, active, data, &metric, &mut constraints, o, rng)?,
                None => {
                    let mut labels = LabelOracle::from_dataset(data)?;
                    select(config.k, active, data, &metric, &mut constraints, &mut labels, rng)?
                }
            };
            Some(summary)
        }
        None => None,
    };

    let fit = Mpck::with_config(config.clone(), metric).fit_with_rng(data, &constraints, rng)?;

    if let Some(path) = &config.output.assignments {
        write_artifact(path, |w| write_assignments(w, &fit.assignment))?;
    }
    if let Some(path) = &config.output.incoherence {
        write_artifact(path, |w| write_incoherence(w, &fit.incoherence))?;
    }

    let violations = fit.violations();
    info!(
        iterations = fit.iterations,
        violations,
        termination = ?fit.termination,
        "run complete"
    );
    Ok(RunReport {
        assignment: fit.assignment,
        trace: fit.trace,
        iterations: fit.iterations,
        termination: fit.termination,
        incoherence: fit.incoherence,
        constraints,
        violations,
        active,
    })
}

fn select<M: Metric, O: Oracle + ?Sized, R: Rng + ?Sized>(
    k: usize,
    config: &ActiveConfig,
    data: &Dataset,
    metric: &M,
    constraints: &mut ConstraintSet,
    oracle: &mut O,
    rng: &mut R,
) -> Result<ActiveSummary> {
    let mut prepared = None;
    if metric.requires_normalization() {
        let mut owned = data.clone();
        owned.normalize();
        prepared = Some(owned);
    }
    let data = prepared.as_ref().unwrap_or(data);
    let mut built = metric.clone();
    built.build(data)?;

    let outcome = ActiveSelector::new(data, &built, k, config)?.run(constraints, oracle, rng)?;
    Ok(ActiveSummary {
        queries: outcome.queries,
        neighborhoods: outcome.neighborhoods.len(),
        budget_exhausted: outcome.budget_exhausted,
    })
}

fn write_artifact(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<()> {
    let io_err = |e: std::io::Error| Error::Other(format!("{}: {e}", path.display()));
    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    write(&mut out).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::LinkType;

    fn labelled() -> Dataset {
        Dataset::from_rows(&[
            vec![0.0, 0.0],
            vec![0.3, 0.1],
            vec![0.1, 0.2],
            vec![6.0, 6.0],
            vec![6.2, 5.9],
            vec![5.9, 6.1],
        ])
        .unwrap()
        .with_labels(vec![0, 0, 0, 1, 1, 1])
        .unwrap()
    }

    #[test]
    fn test_run_without_active() {
        let data = labelled();
        let config = MpckConfig::new(2).with_seed(5);
        let report = run(&config, &data, ConstraintSet::new(6), None).unwrap();
        assert_eq!(report.assignment.len(), 6);
        assert!(report.active.is_none());
        assert_eq!(report.assignment[0], report.assignment[1]);
        assert_ne!(report.assignment[0], report.assignment[3]);
    }

    #[test]
    fn test_run_with_label_oracle_fallback() {
        let data = labelled();
        let config = MpckConfig::new(2).with_seed(5).with_active(ActiveConfig {
            budget: 8,
            ..ActiveConfig::default()
        });
        let report = run(&config, &data, ConstraintSet::new(6), None).unwrap();
        let active = report.active.unwrap();
        assert!(active.queries <= 8);
        assert_eq!(active.neighborhoods, 2);
        assert!(!report.constraints.is_empty());
        assert_eq!(report.violations, 0);
    }

    #[test]
    fn test_run_with_explicit_oracle() {
        let data = Dataset::from_rows(&[
            vec![1.0, 0.1],
            vec![0.9, 0.2],
            vec![1.0, 0.0],
            vec![0.1, 1.0],
            vec![0.2, 0.9],
            vec![0.0, 1.0],
        ])
        .unwrap();
        let config = MpckConfig::new(2)
            .with_seed(9)
            .with_metric(MetricKind::Cosine)
            .with_active(ActiveConfig {
                budget: 2,
                ..ActiveConfig::default()
            });
        let mut asked = 0;
        let mut oracle = |i: usize, j: usize| {
            asked += 1;
            if (i < 3) == (j < 3) {
                LinkType::MustLink
            } else {
                LinkType::CannotLink
            }
        };
        let report = run(&config, &data, ConstraintSet::new(6), Some(&mut oracle as &mut dyn Oracle)).unwrap();
        assert_eq!(report.active.unwrap().queries, 2);
        assert_eq!(asked, 2);
    }

    #[test]
    fn test_active_without_labels_or_oracle_fails() {
        let data = Dataset::from_rows(&[vec![0.0], vec![1.0]]).unwrap();
        let config = MpckConfig::new(2).with_active(ActiveConfig::default());
        assert!(matches!(
            run(&config, &data, ConstraintSet::new(2), None),
            Err(Error::InvalidParameter { name: "labels", .. })
        ));
    }

    #[test]
    fn test_writes_artifacts() {
        let dir = std::env::temp_dir().join(format!("mpck-runner-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = MpckConfig::new(2).with_seed(1).with_incoherence_tracking(true);
        config.output.assignments = Some(dir.join("assign.tsv"));
        config.output.incoherence = Some(dir.join("incoherence.tsv"));

        let data = labelled();
        let set = ConstraintSet::from_triples(6, [(0, 1, LinkType::MustLink), (2, 3, LinkType::CannotLink)])
            .unwrap();
        let report = run(&config, &data, set, None).unwrap();

        let assign = std::fs::read_to_string(dir.join("assign.tsv")).unwrap();
        assert_eq!(assign.lines().count(), 6);
        assert!(assign.starts_with("0\t"));
        let inco = std::fs::read_to_string(dir.join("incoherence.tsv")).unwrap();
        assert_eq!(inco.lines().count(), report.iterations);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
