//! Pairwise constraint records.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship between two points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// The points belong to the same cluster.
    MustLink,
    /// The points belong to different clusters.
    CannotLink,
    /// No information; returned by lookups and oracles, never stored.
    DontCare,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::MustLink => write!(f, "must-link"),
            LinkType::CannotLink => write!(f, "cannot-link"),
            LinkType::DontCare => write!(f, "dont-care"),
        }
    }
}

/// An unordered pair of points with its link type, stored as `lower < higher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstancePair {
    lower: usize,
    higher: usize,
    link: LinkType,
}

impl InstancePair {
    /// Create a pair; the endpoints may come in either order but must differ.
    pub fn new(i: usize, j: usize, link: LinkType) -> Result<Self> {
        if i == j {
            return Err(Error::SelfConstraint { index: i });
        }
        Ok(Self {
            lower: i.min(j),
            higher: i.max(j),
            link,
        })
    }

    /// Rebuild a pair from a stored `(lower, higher)` key.
    pub(crate) fn from_key((lower, higher): (usize, usize), link: LinkType) -> Self {
        debug_assert!(lower < higher);
        Self {
            lower,
            higher,
            link,
        }
    }

    /// Smaller endpoint.
    pub fn lower(&self) -> usize {
        self.lower
    }

    /// Larger endpoint.
    pub fn higher(&self) -> usize {
        self.higher
    }

    /// Link type.
    pub fn link(&self) -> LinkType {
        self.link
    }

    /// Lookup key `(lower, higher)`.
    pub fn key(&self) -> (usize, usize) {
        (self.lower, self.higher)
    }

    /// The endpoint that is not `i`.
    pub fn partner(&self, i: usize) -> usize {
        if i == self.lower {
            self.higher
        } else {
            self.lower
        }
    }
}
