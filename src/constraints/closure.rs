//! Transitive closure of pairwise constraints.
//!
//! Must-links are an equivalence relation: their connected components are the
//! *neighborhoods*. Cannot-links lift to neighborhoods: if any explicit
//! cannot-link crosses two neighborhoods, every pair across them is
//! cannot-linked. A cannot-link whose endpoints end up in the same
//! neighborhood is a contradiction and aborts the closure.
//!
//! Components are found with a union-find (no recursion), so the work is
//! `O(V + E·α(V))` before the closed pairs are materialized.

use super::pair::LinkType;
use super::set::ConstraintSet;
use crate::error::{Error, Result};
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Result of [`ConstraintSet::transitive_close`].
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    constraints: ConstraintSet,
    neighborhoods: Vec<Vec<usize>>,
    cannot_linked: BTreeSet<(usize, usize)>,
}

impl Closure {
    /// The closed constraint set (explicit plus inferred constraints).
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Consume the closure, keeping the closed set.
    pub fn into_constraints(self) -> ConstraintSet {
        self.constraints
    }

    /// Must-link components over constrained points, largest first.
    ///
    /// Ties in size are ordered by smallest member. Members are sorted.
    pub fn neighborhoods(&self) -> &[Vec<usize>] {
        &self.neighborhoods
    }

    /// Pairs of neighborhood positions known to be cannot-linked.
    pub fn cannot_linked(&self) -> &BTreeSet<(usize, usize)> {
        &self.cannot_linked
    }
}

impl ConstraintSet {
    /// Close the set transitively and discover neighborhoods.
    ///
    /// # Errors
    ///
    /// [`Error::IncoherentConstraints`] when a cannot-link joins two points of
    /// one must-link component.
    pub fn transitive_close(&self) -> Result<Closure> {
        let n = self.n_points();
        let mut components = UnionFind::<usize>::new(n);
        for pair in self.must_links() {
            let _ = components.union(pair.lower(), pair.higher());
        }

        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &seed in self.seeds() {
            by_root.entry(components.find(seed)).or_default().push(seed);
        }

        let mut root_links: BTreeSet<(usize, usize)> = BTreeSet::new();
        for pair in self.cannot_links() {
            let a = components.find(pair.lower());
            let b = components.find(pair.higher());
            if a == b {
                return Err(Error::IncoherentConstraints {
                    first: pair.lower(),
                    second: pair.higher(),
                    reason: "cannot-link inside a must-link neighborhood".into(),
                });
            }
            let _ = root_links.insert((a.min(b), a.max(b)));
        }

        let mut groups: Vec<(usize, Vec<usize>)> = by_root.into_iter().collect();
        groups.sort_by(|(_, a), (_, b)| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
        let position: BTreeMap<usize, usize> = groups
            .iter()
            .enumerate()
            .map(|(pos, (root, _))| (*root, pos))
            .collect();
        let neighborhoods: Vec<Vec<usize>> = groups.into_iter().map(|(_, m)| m).collect();

        let cannot_linked: BTreeSet<(usize, usize)> = root_links
            .iter()
            .map(|(a, b)| {
                let (pa, pb) = (position[a], position[b]);
                (pa.min(pb), pa.max(pb))
            })
            .collect();

        let mut closed = ConstraintSet::new(n);
        for members in &neighborhoods {
            for (k, &i) in members.iter().enumerate() {
                for &j in &members[k + 1..] {
                    let _ = closed.add_constraint(i, j, LinkType::MustLink)?;
                }
            }
        }
        for &(a, b) in &cannot_linked {
            for &i in &neighborhoods[a] {
                for &j in &neighborhoods[b] {
                    let _ = closed.add_constraint(i, j, LinkType::CannotLink)?;
                }
            }
        }

        debug!(
            explicit = self.len(),
            closed = closed.len(),
            neighborhoods = neighborhoods.len(),
            "transitive closure complete"
        );

        Ok(Closure {
            constraints: closed,
            neighborhoods,
            cannot_linked,
        })
    }
}
