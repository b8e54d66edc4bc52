//! Constraint storage with a symmetric per-point index.

use super::pair::{InstancePair, LinkType};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Must-link and cannot-link constraints over `n` points.
///
/// Each pair is stored once, keyed by `(lower, higher)`, and indexed from both
/// endpoints so that penalty computation walks only a point's own constraints.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    n_points: usize,
    links: BTreeMap<(usize, usize), LinkType>,
    index: Vec<Vec<InstancePair>>,
    seeds: BTreeSet<usize>,
}

impl PartialEq for ConstraintSet {
    fn eq(&self, other: &Self) -> bool {
        self.n_points == other.n_points && self.links == other.links
    }
}

impl ConstraintSet {
    /// Empty set over `n_points` points.
    pub fn new(n_points: usize) -> Self {
        Self {
            n_points,
            links: BTreeMap::new(),
            index: vec![Vec::new(); n_points],
            seeds: BTreeSet::new(),
        }
    }

    /// Build a set from `(i, j, link)` triples.
    pub fn from_triples(
        n_points: usize,
        triples: impl IntoIterator<Item = (usize, usize, LinkType)>,
    ) -> Result<Self> {
        let mut set = Self::new(n_points);
        for (i, j, link) in triples {
            let _ = set.add_constraint(i, j, link)?;
        }
        Ok(set)
    }

    /// Number of points the set ranges over.
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Add a constraint.
    ///
    /// Returns `Ok(false)` if the identical constraint was already present.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---------|-----------|
    /// | [`Error::SelfConstraint`] | `i == j` |
    /// | [`Error::IndexOutOfRange`] | either index `>= n_points` |
    /// | [`Error::InvalidParameter`] | `link` is `DontCare` |
    /// | [`Error::IncoherentConstraints`] | the pair already carries the opposite link |
    pub fn add_constraint(&mut self, i: usize, j: usize, link: LinkType) -> Result<bool> {
        let pair = InstancePair::new(i, j, link)?;
        if pair.higher() >= self.n_points {
            return Err(Error::IndexOutOfRange {
                index: pair.higher(),
                len: self.n_points,
            });
        }
        if link == LinkType::DontCare {
            return Err(Error::InvalidParameter {
                name: "link",
                message: "dont-care is a lookup answer, not a constraint".into(),
            });
        }
        match self.links.get(&pair.key()) {
            Some(&existing) if existing == link => return Ok(false),
            Some(&existing) => {
                return Err(Error::IncoherentConstraints {
                    first: pair.lower(),
                    second: pair.higher(),
                    reason: format!("{link} conflicts with existing {existing}"),
                });
            }
            None => {}
        }
        let _ = self.links.insert(pair.key(), link);
        self.index[pair.lower()].push(pair);
        self.index[pair.higher()].push(pair);
        let _ = self.seeds.insert(pair.lower());
        let _ = self.seeds.insert(pair.higher());
        Ok(true)
    }

    /// Link between `i` and `j`, `DontCare` when unconstrained.
    pub fn link(&self, i: usize, j: usize) -> LinkType {
        self.links
            .get(&(i.min(j), i.max(j)))
            .copied()
            .unwrap_or(LinkType::DontCare)
    }

    /// Constraints touching point `i`.
    pub fn constraints_of(&self, i: usize) -> &[InstancePair] {
        self.index.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All constraints in key order.
    pub fn pairs(&self) -> impl Iterator<Item = InstancePair> + '_ {
        self.links
            .iter()
            .map(|(&key, &link)| InstancePair::from_key(key, link))
    }

    /// All must-link constraints in key order.
    pub fn must_links(&self) -> impl Iterator<Item = InstancePair> + '_ {
        self.pairs().filter(|p| p.link() == LinkType::MustLink)
    }

    /// All cannot-link constraints in key order.
    pub fn cannot_links(&self) -> impl Iterator<Item = InstancePair> + '_ {
        self.pairs().filter(|p| p.link() == LinkType::CannotLink)
    }

    /// Number of constraints.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether there are no constraints.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Points taking part in at least one constraint.
    pub fn seeds(&self) -> &BTreeSet<usize> {
        &self.seeds
    }

    /// Whether point `i` takes part in a constraint.
    pub fn is_seed(&self, i: usize) -> bool {
        self.seeds.contains(&i)
    }
}
