//! Feature-vector store.
//!
//! [`Dataset`] holds a fixed collection of [`Instance`]s, each either dense or
//! sparse, plus optional ground-truth class labels. Labels are informational:
//! nothing in the clustering core reads them, only [`crate::active::LabelOracle`]
//! and callers do.
//!
//! Sparse instances store sorted `(index, value)` pairs with zeros dropped.
//! Pairwise operations walk the union of nonzero coordinates, so a metric whose
//! per-coordinate term vanishes at `(0, 0)` never pays for the implicit zeros.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1};

#[derive(Debug, Clone, PartialEq)]
enum Values {
    Dense(Vec<f64>),
    Sparse {
        indices: Vec<usize>,
        values: Vec<f64>,
        dim: usize,
    },
}

/// A single feature vector with an instance weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    values: Values,
    weight: f64,
}

impl Instance {
    /// Create a dense instance with weight 1.
    pub fn dense(values: Vec<f64>) -> Self {
        Self {
            values: Values::Dense(values),
            weight: 1.0,
        }
    }

    /// Create a sparse instance of dimension `dim` from `(index, value)` entries.
    ///
    /// Entries may come in any order; repeated indices are summed and zeros dropped.
    pub fn sparse(dim: usize, mut entries: Vec<(usize, f64)>) -> Result<Self> {
        entries.sort_by_key(|&(d, _)| d);
        let mut indices: Vec<usize> = Vec::with_capacity(entries.len());
        let mut values: Vec<f64> = Vec::with_capacity(entries.len());
        for (d, v) in entries {
            if d >= dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: d + 1,
                });
            }
            match indices.last() {
                Some(&last) if last == d => {
                    if let Some(acc) = values.last_mut() {
                        *acc += v;
                    }
                }
                _ => {
                    indices.push(d);
                    values.push(v);
                }
            }
        }
        let (indices, values) = indices
            .into_iter()
            .zip(values)
            .filter(|&(_, v)| v != 0.0)
            .unzip();
        Ok(Self {
            values: Values::Sparse {
                indices,
                values,
                dim,
            },
            weight: 1.0,
        })
    }

    /// Set the instance weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Instance weight (1 unless the instance stands for a sum of points).
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Number of attributes.
    pub fn dim(&self) -> usize {
        match &self.values {
            Values::Dense(v) => v.len(),
            Values::Sparse { dim, .. } => *dim,
        }
    }

    /// Whether the instance is stored sparsely.
    pub fn is_sparse(&self) -> bool {
        matches!(self.values, Values::Sparse { .. })
    }

    /// Value of attribute `d` (zero when absent from a sparse instance).
    pub fn get(&self, d: usize) -> f64 {
        match &self.values {
            Values::Dense(v) => v.get(d).copied().unwrap_or(0.0),
            Values::Sparse { indices, values, .. } => {
                indices.binary_search(&d).map(|pos| values[pos]).unwrap_or(0.0)
            }
        }
    }

    /// Visit every stored coordinate (all of them when dense, nonzeros when sparse).
    pub fn for_each_nonzero(&self, mut f: impl FnMut(usize, f64)) {
        match &self.values {
            Values::Dense(v) => v.iter().enumerate().for_each(|(d, &x)| f(d, x)),
            Values::Sparse { indices, values, .. } => {
                indices.iter().zip(values.iter()).for_each(|(&d, &x)| f(d, x))
            }
        }
    }

    /// Visit the union of stored coordinates of `self` and `other`.
    ///
    /// Coordinates where both instances are implicitly zero are skipped.
    pub fn zip_with(&self, other: &Instance, mut f: impl FnMut(usize, f64, f64)) {
        match (&self.values, &other.values) {
            (Values::Dense(a), Values::Dense(b)) => {
                for (d, (&x, &y)) in a.iter().zip(b.iter()).enumerate() {
                    f(d, x, y);
                }
            }
            (
                Values::Sparse {
                    indices: ia,
                    values: va,
                    ..
                },
                Values::Sparse {
                    indices: ib,
                    values: vb,
                    ..
                },
            ) => {
                let (mut p, mut q) = (0, 0);
                while p < ia.len() || q < ib.len() {
                    let da = ia.get(p).copied().unwrap_or(usize::MAX);
                    let db = ib.get(q).copied().unwrap_or(usize::MAX);
                    if da == db {
                        f(da, va[p], vb[q]);
                        p += 1;
                        q += 1;
                    } else if da < db {
                        f(da, va[p], 0.0);
                        p += 1;
                    } else {
                        f(db, 0.0, vb[q]);
                        q += 1;
                    }
                }
            }
            (Values::Dense(a), Values::Sparse { indices, values, .. }) => {
                zip_dense_sparse(a, indices, values, |d, x, y| f(d, x, y))
            }
            (Values::Sparse { indices, values, .. }, Values::Dense(b)) => {
                zip_dense_sparse(b, indices, values, |d, y, x| f(d, x, y))
            }
        }
    }

    /// Dense copy of the coordinates.
    pub fn to_dense(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.dim()];
        self.for_each_nonzero(|d, x| out[d] = x);
        out
    }

    /// Plain dot product.
    pub fn dot(&self, other: &Instance) -> f64 {
        let mut acc = 0.0;
        self.zip_with(other, |_, x, y| acc += x * y);
        acc
    }

    /// Euclidean length.
    pub fn norm(&self) -> f64 {
        let mut acc = 0.0;
        self.for_each_nonzero(|_, x| acc += x * x);
        acc.sqrt()
    }

    /// Scale to unit Euclidean length. Zero vectors are left untouched.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            self.map_values(|x| x / norm);
        }
    }

    /// Apply `f` to every stored value in place.
    pub fn map_values(&mut self, mut f: impl FnMut(f64) -> f64) {
        match &mut self.values {
            Values::Dense(v) => v.iter_mut().for_each(|x| *x = f(*x)),
            Values::Sparse { values, .. } => values.iter_mut().for_each(|x| *x = f(*x)),
        }
    }
}

fn zip_dense_sparse(
    dense: &[f64],
    indices: &[usize],
    values: &[f64],
    mut f: impl FnMut(usize, f64, f64),
) {
    let mut cursor = 0;
    for (d, &x) in dense.iter().enumerate() {
        let y = if indices.get(cursor) == Some(&d) {
            cursor += 1;
            values[cursor - 1]
        } else {
            0.0
        };
        f(d, x, y);
    }
}

/// A fixed collection of equally sized instances.
#[derive(Debug, Clone)]
pub struct Dataset {
    instances: Vec<Instance>,
    n_attributes: usize,
    labels: Option<Vec<usize>>,
}

impl Dataset {
    /// Build a dataset, checking that every instance has the same dimension.
    pub fn new(instances: Vec<Instance>) -> Result<Self> {
        let first = instances.first().ok_or(Error::EmptyInput)?;
        let n_attributes = first.dim();
        if let Some(bad) = instances.iter().find(|x| x.dim() != n_attributes) {
            return Err(Error::DimensionMismatch {
                expected: n_attributes,
                found: bad.dim(),
            });
        }
        Ok(Self {
            instances,
            n_attributes,
            labels: None,
        })
    }

    /// Build a dense dataset from rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        Self::new(rows.iter().cloned().map(Instance::dense).collect())
    }

    /// Build a dense dataset from a row-major matrix.
    pub fn from_array(data: &Array2<f64>) -> Result<Self> {
        Self::new(
            data.rows()
                .into_iter()
                .map(|row| Instance::dense(row.to_vec()))
                .collect(),
        )
    }

    /// Attach ground-truth class labels.
    pub fn with_labels(mut self, labels: Vec<usize>) -> Result<Self> {
        if labels.len() != self.instances.len() {
            return Err(Error::DimensionMismatch {
                expected: self.instances.len(),
                found: labels.len(),
            });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Ground-truth class labels, if any.
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Number of instances.
    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    /// Number of attributes per instance.
    pub fn num_attributes(&self) -> usize {
        self.n_attributes
    }

    /// Instance `i`.
    pub fn instance(&self, i: usize) -> &Instance {
        &self.instances[i]
    }

    /// All instances in index order.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Whether every instance is sparse.
    pub fn is_sparse(&self) -> bool {
        self.instances.iter().all(Instance::is_sparse)
    }

    /// Scale every instance to unit length.
    pub fn normalize(&mut self) {
        self.instances.iter_mut().for_each(Instance::normalize);
    }

    /// Weighted coordinate-wise mean over `indices`.
    ///
    /// Returns `None` for an empty subset or one with zero total weight. When every
    /// member is sparse only stored entries are visited and the mean stays sparse.
    pub fn weighted_mean(&self, indices: &[usize]) -> Option<Instance> {
        let total: f64 = indices.iter().map(|&i| self.instances[i].weight()).sum();
        if !(total > 0.0) {
            return None;
        }
        if indices.iter().all(|&i| self.instances[i].is_sparse()) {
            let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
            for &i in indices {
                let x = &self.instances[i];
                let w = x.weight();
                x.for_each_nonzero(|d, v| *acc.entry(d).or_insert(0.0) += w * v);
            }
            let entries = acc
                .into_iter()
                .map(|(d, v)| (d, v / total))
                .filter(|&(_, v)| v != 0.0)
                .collect();
            return Instance::sparse(self.n_attributes, entries).ok();
        }

        let mut acc = Array1::<f64>::zeros(self.n_attributes);
        for &i in indices {
            let x = &self.instances[i];
            let w = x.weight();
            match &x.values {
                Values::Dense(v) => acc.scaled_add(w, &ArrayView1::from(v.as_slice())),
                Values::Sparse { indices, values, .. } => {
                    for (&d, &v) in indices.iter().zip(values.iter()) {
                        acc[d] += w * v;
                    }
                }
            }
        }
        acc /= total;
        Some(Instance::dense(acc.to_vec()))
    }

    /// Weighted mean of the whole dataset.
    pub fn mean(&self) -> Option<Instance> {
        let all: Vec<usize> = (0..self.instances.len()).collect();
        self.weighted_mean(&all)
    }

    /// Per-attribute `(min, max)` over `members` (the whole dataset when `None`).
    ///
    /// Implicit zeros of sparse instances take part in the bounds.
    pub fn bounds(&self, members: Option<&[usize]>) -> (Vec<f64>, Vec<f64>) {
        let d = self.n_attributes;
        let mut lo = vec![f64::INFINITY; d];
        let mut hi = vec![f64::NEG_INFINITY; d];
        let mut stored = vec![0usize; d];
        let mut count = 0usize;
        let mut visit = |x: &Instance| {
            count += 1;
            x.for_each_nonzero(|j, v| {
                lo[j] = lo[j].min(v);
                hi[j] = hi[j].max(v);
                stored[j] += 1;
            });
        };
        match members {
            Some(idx) => idx.iter().for_each(|&i| visit(&self.instances[i])),
            None => self.instances.iter().for_each(visit),
        }
        if count == 0 {
            return (vec![0.0; d], vec![0.0; d]);
        }
        for j in 0..d {
            if stored[j] < count {
                lo[j] = lo[j].min(0.0);
                hi[j] = hi[j].max(0.0);
            }
        }
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_merges_duplicates_and_drops_zeros() {
        let x = Instance::sparse(5, vec![(3, 1.0), (1, 2.0), (3, 0.5), (4, 0.0)]).unwrap();
        assert_eq!(x.to_dense(), vec![0.0, 2.0, 0.0, 1.5, 0.0]);
        assert_eq!(x.get(4), 0.0);
    }

    #[test]
    fn test_sparse_index_out_of_bounds() {
        assert!(Instance::sparse(2, vec![(2, 1.0)]).is_err());
    }

    #[test]
    fn test_zip_with_mixed_representations() {
        let a = Instance::sparse(4, vec![(1, 2.0), (3, 1.0)]).unwrap();
        let b = Instance::dense(vec![1.0, 1.0, 1.0, 1.0]);
        let c = Instance::sparse(4, vec![(0, 5.0), (3, 2.0)]).unwrap();
        assert_eq!(a.dot(&b), 3.0);
        assert_eq!(b.dot(&a), 3.0);
        assert_eq!(a.dot(&c), 2.0);

        let mut seen = Vec::new();
        a.zip_with(&c, |d, x, y| seen.push((d, x, y)));
        assert_eq!(seen, vec![(0, 0.0, 5.0), (1, 2.0, 0.0), (3, 1.0, 2.0)]);
    }

    #[test]
    fn test_weighted_mean_dense() {
        let data = Dataset::new(vec![
            Instance::dense(vec![0.0, 0.0]),
            Instance::dense(vec![4.0, 2.0]).with_weight(3.0),
        ])
        .unwrap();
        let mean = data.weighted_mean(&[0, 1]).unwrap();
        assert_eq!(mean.to_dense(), vec![3.0, 1.5]);
        assert!(data.weighted_mean(&[]).is_none());
    }

    #[test]
    fn test_weighted_mean_sparse_stays_sparse() {
        let data = Dataset::new(vec![
            Instance::sparse(3, vec![(0, 2.0)]).unwrap(),
            Instance::sparse(3, vec![(2, 4.0)]).unwrap(),
        ])
        .unwrap();
        let mean = data.weighted_mean(&[0, 1]).unwrap();
        assert!(mean.is_sparse());
        assert_eq!(mean.to_dense(), vec![1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_sparse_mean_visits_only_stored_entries() {
        // a dense accumulator of this dimension could not be allocated
        let dim = 1usize << 40;
        let data = Dataset::new(vec![
            Instance::sparse(dim, vec![(7, 2.0), (dim - 1, 1.0)]).unwrap(),
            Instance::sparse(dim, vec![(7, 4.0)]).unwrap().with_weight(2.0),
        ])
        .unwrap();
        let mean = data.weighted_mean(&[0, 1]).unwrap();
        assert!(mean.is_sparse());
        assert_eq!(mean.dim(), dim);
        assert_eq!(mean.get(7), 10.0 / 3.0);
        assert_eq!(mean.get(dim - 1), 1.0 / 3.0);
        assert_eq!(mean.get(8), 0.0);
    }

    #[test]
    fn test_bounds_include_implicit_zeros() {
        let data = Dataset::new(vec![
            Instance::sparse(2, vec![(0, 3.0)]).unwrap(),
            Instance::sparse(2, vec![(0, 5.0), (1, -1.0)]).unwrap(),
        ])
        .unwrap();
        let (lo, hi) = data.bounds(None);
        assert_eq!(lo, vec![3.0, -1.0]);
        assert_eq!(hi, vec![5.0, 0.0]);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let err = Dataset::from_rows(&[vec![0.0, 1.0], vec![1.0]]).unwrap_err();
        assert_eq!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_normalize() {
        let mut data = Dataset::from_rows(&[vec![3.0, 4.0], vec![0.0, 0.0]]).unwrap();
        data.normalize();
        assert_eq!(data.instance(0).to_dense(), vec![0.6, 0.8]);
        assert_eq!(data.instance(1).to_dense(), vec![0.0, 0.0]);
    }
}
