//! Constrained clustering with metric learning.
//!
//! ## The objective
//!
//! MPCK-means minimizes (for distance-based metrics)
//!
//! ```text
//! J = Σ_i w_i · D_{A_{l_i}}(x_i, μ_{l_i})                     variance
//!   + Σ_{(i,j) ∈ ML, l_i ≠ l_j} w_ml · penalty(x_i, x_j)       violated must-links
//!   + Σ_{(i,j) ∈ CL, l_i = l_j} w_cl · (max − penalty(x_i, x_j)) violated cannot-links
//!   − Σ_i log_w · w_i · ln det A_{l_i}                         log-normalizer
//!   + λ · Σ_m ‖A_m‖                                            regularizer
//! ```
//!
//! A violated must-link costs more the farther apart its points are, so a far
//! pair pulls hard towards a shared cluster. A violated cannot-link costs more
//! the *closer* its points are, which pushes the metric to spread them. The
//! log-normalizer keeps the metric from collapsing all weights to zero.
//!
//! Similarity-based metrics flip the variance term into a similarity and the
//! objective is maximized instead; constraint penalties keep their sign.
//!
//! ## Loop
//!
//! | Step | Module | Effect |
//! |------|--------|--------|
//! | Assign | `assign` | ICM sweep, each point to its cheapest cluster |
//! | Estimate | `centroid` | weighted means, normalized or smoothed |
//! | Learn | `learner` | closed-form diagonal weight update |
//! | Track | `objective` | recompute J, flag oscillation |
//!
//! ## Usage
//!
//! ```rust
//! use mpck::cluster::{ConstrainedClustering, Mpck};
//! use mpck::constraints::{ConstraintSet, LinkType};
//! use mpck::data::Dataset;
//! use mpck::metric::WeightedEuclidean;
//!
//! let data = Dataset::from_rows(&[
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ]).unwrap();
//!
//! let mut constraints = ConstraintSet::new(4);
//! constraints.add_constraint(0, 1, LinkType::MustLink).unwrap();
//! constraints.add_constraint(1, 2, LinkType::CannotLink).unwrap();
//!
//! let labels = Mpck::new(2, WeightedEuclidean::new())
//!     .with_seed(42)
//!     .fit_predict(&data, &constraints)
//!     .unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[1], labels[2]);
//! ```

mod assign;
mod centroid;
mod init;
mod learner;
mod model;
mod mpck;
mod objective;
mod traits;

pub use assign::{assign_points, point_cost, AssignmentOutcome, PointCost};
pub use centroid::estimate_centroids;
pub use init::{initial_centroids, Seeding};
pub use learner::train_metrics;
pub use model::{partition, Context, Model, ObjectiveWeights, UNASSIGNED};
pub use mpck::{Mpck, MpckFit, Termination};
pub use objective::{evaluate, ObjectiveState, ObjectiveTracker};
pub use traits::ConstrainedClustering;
