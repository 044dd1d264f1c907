//! Retrieval quality metrics
//!
//! Standard metrics over per-query match vectors:
//! - CMC (Cumulative Match Characteristic): probability the correct match
//!   appears within the top-k ranks, as a function of k
//! - AP / mAP (mean Average Precision): precision counted at the ranks
//!   where a true match occurs, normalized by the number of true matches
//!
//! Per-query results are folded into a [`MetricAccumulator`] — an explicit
//! accumulator value rather than shared mutable state, so the per-query map
//! stays embarrassingly parallel and the reduction order-independent.

use crate::error::{EvalError, Result};

/// Per-query CMC vector: cumulative match flags clamped to 1, cut or padded
/// to `max_rank` entries.
///
/// A query with fewer kept candidates than `max_rank` keeps its final state
/// at the deeper ranks: once satisfied it stays satisfied, and an
/// unsatisfied query has no remaining candidates that could satisfy it.
///
/// # Panics
///
/// Panics if `max_rank` is zero.
pub fn cmc_curve(matches: &[u8], max_rank: usize) -> Vec<f64> {
    assert!(max_rank > 0, "max_rank must be at least 1");
    let mut curve = Vec::with_capacity(max_rank);
    let mut hit = 0.0;
    for r in 0..max_rank {
        if r < matches.len() && matches[r] == 1 {
            hit = 1.0;
        }
        curve.push(hit);
    }
    curve
}

/// Per-query Average Precision.
///
/// With `C = cumsum(m)`, precision at rank i is `C[i] / (i + 1)`; AP sums
/// precision only at ranks where a true match occurs and divides by the
/// total number of true matches — not by the number of kept candidates.
///
/// # Panics
///
/// Panics if `matches` contains no true match; such queries are skipped
/// upstream and must never reach the metric.
pub fn average_precision(matches: &[u8]) -> f64 {
    let num_true = matches.iter().filter(|&&m| m == 1).count();
    assert!(
        num_true > 0,
        "match vector must contain at least one true match"
    );

    let mut cum = 0usize;
    let mut ap = 0.0;
    for (i, &m) in matches.iter().enumerate() {
        cum += m as usize;
        if m == 1 {
            ap += cum as f64 / (i as f64 + 1.0);
        }
    }
    ap / num_true as f64
}

/// Commutative accumulator for per-query CMC vectors and AP scores.
///
/// Supports `push` from the per-query map and `merge` for parallel
/// reduction; sums and counts are order-independent.
#[derive(Clone, Debug)]
pub struct MetricAccumulator {
    cmc_sum: Vec<f64>,
    ap_sum: f64,
    n_scored: usize,
    n_skipped: usize,
}

impl MetricAccumulator {
    pub fn new(max_rank: usize) -> Self {
        Self {
            cmc_sum: vec![0.0; max_rank],
            ap_sum: 0.0,
            n_scored: 0,
            n_skipped: 0,
        }
    }

    /// Folds one scored query into the accumulator.
    ///
    /// # Panics
    ///
    /// Panics if `cmc` length differs from the configured max rank.
    pub fn push(&mut self, cmc: &[f64], ap: f64) {
        assert_eq!(cmc.len(), self.cmc_sum.len(), "CMC length mismatch");
        for (acc, &c) in self.cmc_sum.iter_mut().zip(cmc.iter()) {
            *acc += c;
        }
        self.ap_sum += ap;
        self.n_scored += 1;
    }

    /// Records a query that had no valid gallery match.
    pub fn note_skip(&mut self) {
        self.n_skipped += 1;
    }

    /// Merges two accumulators (parallel reduce step).
    pub fn merge(mut self, other: Self) -> Self {
        assert_eq!(
            self.cmc_sum.len(),
            other.cmc_sum.len(),
            "CMC length mismatch"
        );
        for (acc, c) in self.cmc_sum.iter_mut().zip(other.cmc_sum) {
            *acc += c;
        }
        self.ap_sum += other.ap_sum;
        self.n_scored += other.n_scored;
        self.n_skipped += other.n_skipped;
        self
    }

    /// Number of queries folded in so far.
    #[inline]
    pub fn n_scored(&self) -> usize {
        self.n_scored
    }

    /// Number of skipped queries recorded so far.
    #[inline]
    pub fn n_skipped(&self) -> usize {
        self.n_skipped
    }

    /// Corpus CMC curve and mAP over the contributing queries.
    ///
    /// Fails with [`EvalError::NoValidQuery`] when every query was skipped;
    /// no partial metrics are emitted in that case.
    pub fn finalize(self) -> Result<(Vec<f64>, f64)> {
        if self.n_scored == 0 {
            return Err(EvalError::NoValidQuery);
        }
        let denom = self.n_scored as f64;
        let cmc = self.cmc_sum.into_iter().map(|c| c / denom).collect();
        Ok((cmc, self.ap_sum / denom))
    }
}
