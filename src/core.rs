//! Dense containers for the evaluation pass.
//!
//! This module provides the two value types every stage of the pipeline
//! consumes:
//!
//! - EmbeddingSet: a dense, row-major container of embedding rows with
//!   parallel per-row identity and camera labels, supporting zero-copy row
//!   views and guarded L2 normalization.
//! - DistanceMatrix: the dense n_query × n_gallery matrix of
//!   cosine-derived distances, with deterministic per-row argsort.
//!
//! Design goals:
//! - Zero-copy access to rows for the per-query scoring loop.
//! - Pure construction: both containers are derived deterministically from
//!   their inputs and never mutated afterwards.
//!
//! # Examples
//!
//! Build a small set and normalize it:
//!
//! ```
//! use reid_eval::core::EmbeddingSet;
//!
//! let set = EmbeddingSet::from_rows(
//!     &[vec![3.0, 4.0], vec![1.0, 0.0]],
//!     &[7, 9],
//!     &[0, 1],
//! ).unwrap();
//!
//! let unit = set.l2_normalized().unwrap();
//! assert!((unit.row(0)[0] - 0.6).abs() < 1e-12);
//! ```
//!
//! # Panics
//!
//! - Row accessors panic on out-of-bounds indices.
//! - `DistanceMatrix::from_normalized` panics on dimensionality mismatch
//!   between the two sets.

use log::debug;
use rayon::prelude::*;

use crate::error::{EvalError, Result};
use crate::operators::{argsort_ascending, dot, norm};

/// Identity label marking an invalid/placeholder gallery entry. Such entries
/// never count as a valid match and are dropped during exclusion.
pub const JUNK_ID: i64 = -1;

/// A dense, row-major matrix of embedding rows with parallel identity and
/// camera labels.
///
/// All rows share one dimensionality `dim`; data is a flattened `Vec<f64>`
/// of length `n * dim`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmbeddingSet {
    pub n: usize,
    pub dim: usize,
    pub data: Vec<f64>, // row-major flattened
    pub ids: Vec<i64>,
    pub cams: Vec<i64>,
}

impl EmbeddingSet {
    /// Builds a set from equally-sized rows and parallel label arrays.
    ///
    /// Fails with [`EvalError::ShapeMismatch`] if the arrays disagree on
    /// length or the rows on dimensionality.
    pub fn from_rows(rows: &[Vec<f64>], ids: &[i64], cams: &[i64]) -> Result<Self> {
        if rows.len() != ids.len() || rows.len() != cams.len() {
            return Err(EvalError::ShapeMismatch(format!(
                "{} rows vs {} ids vs {} cams",
                rows.len(),
                ids.len(),
                cams.len()
            )));
        }
        let dim = rows.first().map_or(0, |r| r.len());
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            return Err(EvalError::ShapeMismatch(format!(
                "row {} has {} features, expected {}",
                bad,
                rows[bad].len(),
                dim
            )));
        }

        let mut data = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            data.extend_from_slice(row);
        }

        Ok(Self {
            n: rows.len(),
            dim,
            data,
            ids: ids.to_vec(),
            cams: cams.to_vec(),
        })
    }

    /// Number of rows in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Returns true if the set has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns a borrowed row slice (zero-copy).
    ///
    /// # Panics
    ///
    /// Panics if `i >= n`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        assert!(i < self.n, "Row index out of bounds");
        let start = i * self.dim;
        &self.data[start..start + self.dim]
    }

    /// Returns a copy of the set with every row scaled to unit L2 norm.
    ///
    /// Fails with [`EvalError::DegenerateEmbedding`] on the first zero-norm
    /// row; division is undefined there and no default can stand in without
    /// corrupting similarity semantics.
    pub fn l2_normalized(&self) -> Result<Self> {
        let mut out = self.clone();
        for i in 0..self.n {
            let nrm = norm(self.row(i));
            if nrm <= 0.0 {
                return Err(EvalError::DegenerateEmbedding { index: i, norm: nrm });
            }
            let start = i * self.dim;
            for v in &mut out.data[start..start + self.dim] {
                *v /= nrm;
            }
        }
        Ok(out)
    }
}

/// Dense n_query × n_gallery matrix of cosine-derived distances.
///
/// Smaller value means more similar. Cell (q, g) is `1 / (cos(q, g) + 1)`,
/// mapping cosine similarity in [-1, 1] monotonically onto [0.5, ∞); the
/// upper end is unbounded as cosine approaches -1.
#[derive(Clone, Debug)]
pub struct DistanceMatrix {
    pub nrows: usize, // queries
    pub ncols: usize, // gallery
    pub data: Vec<f64>, // row-major flattened
}

impl DistanceMatrix {
    /// Computes the full distance matrix from two unit-normalized sets.
    ///
    /// Rows must already be unit-norm (see [`EmbeddingSet::l2_normalized`]);
    /// the dot product of unit rows is their cosine similarity. Rows are
    /// filled in parallel, one gallery sweep per query.
    ///
    /// # Panics
    ///
    /// Panics if the two sets disagree on dimensionality.
    pub fn from_normalized(queries: &EmbeddingSet, gallery: &EmbeddingSet) -> Self {
        assert_eq!(
            queries.dim, gallery.dim,
            "query and gallery dimensionality must match"
        );
        let (nq, ng) = (queries.len(), gallery.len());
        debug!("computing {}x{} distance matrix", nq, ng);

        let mut data = vec![0.0; nq * ng];
        data.par_chunks_mut(ng.max(1))
            .enumerate()
            .for_each(|(q, row)| {
                let qrow = queries.row(q);
                for (g, cell) in row.iter_mut().enumerate() {
                    *cell = 1.0 / (dot(qrow, gallery.row(g)) + 1.0);
                }
            });

        Self {
            nrows: nq,
            ncols: ng,
            data,
        }
    }

    /// Returns a borrowed distance row for one query.
    ///
    /// # Panics
    ///
    /// Panics if `q >= nrows`.
    #[inline]
    pub fn row(&self, q: usize) -> &[f64] {
        assert!(q < self.nrows, "Query index out of bounds");
        let start = q * self.ncols;
        &self.data[start..start + self.ncols]
    }

    /// Gallery indices for query `q`, most similar first.
    ///
    /// Deterministic: equal distances keep ascending gallery-index order
    /// (see [`crate::operators::argsort_ascending`]).
    #[inline]
    pub fn argsort_row(&self, q: usize) -> Vec<usize> {
        argsort_ascending(self.row(q))
    }
}
