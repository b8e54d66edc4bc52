//! # mpck
//!
//! Semi-supervised clustering: k-means guided by pairwise must-link /
//! cannot-link constraints, with a metric learned jointly from those
//! constraints (MPCK-means), plus budgeted active acquisition of constraints.
//!
//! **Default build** is single-threaded. The `parallel` feature shards the
//! M-step by cluster and the objective by point with rayon.
//!
//! ```rust
//! use mpck::{ConstraintSet, Dataset, LinkType, MpckConfig, runner};
//!
//! let data = Dataset::from_rows(&[
//!     vec![0.0, 0.0],
//!     vec![0.2, 0.1],
//!     vec![5.0, 5.0],
//!     vec![5.1, 4.9],
//! ]).unwrap();
//! let constraints = ConstraintSet::from_triples(4, [
//!     (0, 1, LinkType::MustLink),
//!     (1, 2, LinkType::CannotLink),
//! ]).unwrap();
//!
//! let report = runner::run(&MpckConfig::new(2).with_seed(7), &data, constraints, None).unwrap();
//! assert_eq!(report.assignment[0], report.assignment[1]);
//! assert_ne!(report.assignment[1], report.assignment[2]);
//! ```

pub mod active;
pub mod cluster;
pub mod config;
pub mod constraints;
pub mod data;
/// Error types used across `mpck`.
pub mod error;
pub mod metric;
pub mod report;
pub mod runner;


pub use active::{ActiveOutcome, ActiveSelector, LabelOracle, Oracle};
pub use cluster::{ConstrainedClustering, Mpck, MpckFit, Termination, UNASSIGNED};
pub use config::{ConfigError, MpckConfig};
pub use constraints::{Closure, ConstraintSet, InstancePair, LinkType};
pub use data::{Dataset, Instance};
pub use error::{Error, Result};
pub use metric::{KlDivergence, Metric, WeightedCosine, WeightedEuclidean};
pub use runner::{run, RunReport};
