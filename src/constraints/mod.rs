//! Pairwise must-link / cannot-link constraints.
//!
//! ## Usage
//!
//! ```rust
//! use mpck::constraints::{ConstraintSet, LinkType};
//!
//! let mut set = ConstraintSet::new(4);
//! set.add_constraint(0, 1, LinkType::MustLink).unwrap();
//! set.add_constraint(1, 2, LinkType::MustLink).unwrap();
//! set.add_constraint(2, 3, LinkType::CannotLink).unwrap();
//!
//! let closure = set.transitive_close().unwrap();
//! assert_eq!(closure.constraints().link(0, 2), LinkType::MustLink);
//! assert_eq!(closure.constraints().link(0, 3), LinkType::CannotLink);
//! assert_eq!(closure.neighborhoods(), &[vec![0, 1, 2], vec![3]]);
//! ```

mod closure;
mod pair;
mod set;

pub use closure::Closure;
pub use pair::{InstancePair, LinkType};
pub use set::ConstraintSet;
