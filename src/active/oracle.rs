//! Answer sources for pairwise queries.

use crate::constraints::LinkType;
use crate::data::Dataset;
use crate::error::{Error, Result};

/// Answers "do these two points belong together?".
///
/// Implementations may block, e.g. on a human annotator. Answering
/// [`LinkType::DontCare`] records nothing.
pub trait Oracle {
    /// Relation between points `i` and `j`.
    fn ask(&mut self, i: usize, j: usize) -> LinkType;
}

impl<F> Oracle for F
where
    F: FnMut(usize, usize) -> LinkType,
{
    fn ask(&mut self, i: usize, j: usize) -> LinkType {
        self(i, j)
    }
}

/// Oracle that answers from ground-truth class labels.
#[derive(Debug, Clone)]
pub struct LabelOracle {
    labels: Vec<usize>,
    asked: usize,
}

impl LabelOracle {
    /// Oracle over explicit labels.
    pub fn new(labels: Vec<usize>) -> Self {
        Self { labels, asked: 0 }
    }

    /// Oracle over the class labels carried by `data`.
    pub fn from_dataset(data: &Dataset) -> Result<Self> {
        let labels = data.labels().ok_or_else(|| Error::InvalidParameter {
            name: "labels",
            message: "dataset carries no class labels".into(),
        })?;
        Ok(Self::new(labels.to_vec()))
    }

    /// Number of questions answered so far.
    pub fn asked(&self) -> usize {
        self.asked
    }
}

impl Oracle for LabelOracle {
    fn ask(&mut self, i: usize, j: usize) -> LinkType {
        self.asked += 1;
        match (self.labels.get(i), self.labels.get(j)) {
            (Some(a), Some(b)) if a == b => LinkType::MustLink,
            (Some(_), Some(_)) => LinkType::CannotLink,
            _ => LinkType::DontCare,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_oracle() {
        let mut oracle = LabelOracle::new(vec![0, 0, 1]);
        assert_eq!(oracle.ask(0, 1), LinkType::MustLink);
        assert_eq!(oracle.ask(1, 2), LinkType::CannotLink);
        assert_eq!(oracle.ask(1, 9), LinkType::DontCare);
        assert_eq!(oracle.asked(), 3);
    }

    #[test]
    fn test_from_dataset_needs_labels() {
        let data = Dataset::from_rows(&[vec![0.0], vec![1.0]]).unwrap();
        assert!(LabelOracle::from_dataset(&data).is_err());
        let labelled = data.with_labels(vec![3, 3]).unwrap();
        let mut oracle = LabelOracle::from_dataset(&labelled).unwrap();
        assert_eq!(oracle.ask(0, 1), LinkType::MustLink);
    }

    #[test]
    fn test_closure_oracle() {
        let mut oracle = |i: usize, j: usize| {
            if (i + j) % 2 == 0 {
                LinkType::MustLink
            } else {
                LinkType::CannotLink
            }
        };
        assert_eq!(oracle.ask(1, 3), LinkType::MustLink);
        assert_eq!(Oracle::ask(&mut oracle, 1, 2), LinkType::CannotLink);
    }
}
