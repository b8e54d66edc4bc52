//! Active acquisition of pairwise constraints under a query budget.
//!
//! Labels are expensive; pairwise questions ("same group?") are cheaper but
//! still limited. The selector spends a fixed budget where it helps most:
//!
//! 1. **Explore**: farthest-first traversal finds one point per cluster quickly,
//!    since a point far from everything seen so far likely starts a new group.
//! 2. **Consolidate**: each remaining point is asked against the neighborhoods,
//!    smallest first, to grow them evenly.
//!
//! Every answer lands in the caller's [`ConstraintSet`](crate::constraints::ConstraintSet),
//! which is closed transitively once selection ends.
//!
//! ```rust
//! use mpck::active::{ActiveSelector, LabelOracle};
//! use mpck::config::ActiveConfig;
//! use mpck::constraints::ConstraintSet;
//! use mpck::data::Dataset;
//! use mpck::metric::{Metric, WeightedEuclidean};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let data = Dataset::from_rows(&[
//!     vec![0.0], vec![0.1], vec![5.0], vec![5.1],
//! ]).unwrap();
//! let mut metric = WeightedEuclidean::new();
//! metric.build(&data).unwrap();
//!
//! let config = ActiveConfig { budget: 10, ..ActiveConfig::default() };
//! let selector = ActiveSelector::new(&data, &metric, 2, &config).unwrap();
//! let mut constraints = ConstraintSet::new(4);
//! let mut oracle = LabelOracle::new(vec![0, 0, 1, 1]);
//! let mut rng = ChaCha8Rng::seed_from_u64(0);
//!
//! let outcome = selector.run(&mut constraints, &mut oracle, &mut rng).unwrap();
//! assert_eq!(outcome.neighborhoods.len(), 2);
//! assert!(outcome.queries <= 10);
//! ```

mod oracle;
mod selector;

pub use oracle::{LabelOracle, Oracle};
pub use selector::{ActiveOutcome, ActiveSelector};
