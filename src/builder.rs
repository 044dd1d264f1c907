//! Evaluation driver: configure a pass with a builder, run it end to end.
//!
//! Pipeline per run: normalize both embedding sets, compute the
//! query × gallery distance matrix, then map over queries — argsort,
//! exclusion, optional top-N re-ranking, CMC/AP — and reduce the per-query
//! results into corpus metrics. The per-query map is independent work and
//! runs on rayon; aggregation uses commutative sums so the output does not
//! depend on scheduling order.

use log::{debug, info};
use rayon::prelude::*;

use crate::core::{DistanceMatrix, EmbeddingSet};
use crate::diffusion::{DiffusionTransform, SpectralSmoothing};
use crate::error::Result;
use crate::metrics::{average_precision, cmc_curve, MetricAccumulator};
use crate::ranking::rank_with_exclusion;
use crate::rerank::rerank_top_n;
use crate::store::EmbeddingDump;

/// Default bandwidth for the shipped diffusion transform.
pub const DEFAULT_BANDWIDTH: f64 = 0.1;

/// Corpus-level metrics for one evaluation pass.
#[derive(Clone, Debug)]
pub struct EvalReport {
    /// Mean CMC curve over contributing queries, `cmc_max_rank` entries.
    pub cmc: Vec<f64>,
    /// Mean Average Precision over contributing queries.
    pub map: f64,
    /// Total number of queries in the pass.
    pub n_queries: usize,
    /// Queries skipped for having no valid gallery match.
    pub n_skipped: usize,
}

impl EvalReport {
    /// Rank-1 CMC, the headline number of most benchmarks.
    #[inline]
    pub fn rank1(&self) -> f64 {
        self.cmc[0]
    }
}

pub struct EvaluatorBuilder {
    cmc_max_rank: usize,
    post_top_n: Option<usize>,
    bandwidth: f64,
    transform: Option<Box<dyn DiffusionTransform + Send + Sync>>,
}

impl Default for EvaluatorBuilder {
    fn default() -> Self {
        debug!("Creating EvaluatorBuilder with default parameters");
        Self {
            cmc_max_rank: 1,
            post_top_n: None,
            bandwidth: DEFAULT_BANDWIDTH,
            transform: None,
        }
    }
}

impl EvaluatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the reported CMC curve.
    ///
    /// # Panics
    ///
    /// Panics if `max_rank` is zero.
    pub fn with_cmc_max_rank(mut self, max_rank: usize) -> Self {
        assert!(max_rank > 0, "max_rank must be at least 1");
        self.cmc_max_rank = max_rank;
        self
    }

    /// Enables re-ranking of the leading `top_n` kept candidates per query;
    /// `None` disables the post-processor.
    pub fn with_post_top_n(mut self, top_n: Option<usize>) -> Self {
        info!("Configuring re-ranking: post_top_n={:?}", top_n);
        self.post_top_n = top_n;
        self
    }

    /// Bandwidth for the shipped diffusion transform. Ignored when a custom
    /// transform is supplied.
    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        info!("Configuring diffusion bandwidth: {}", bandwidth);
        self.bandwidth = bandwidth;
        self
    }

    /// Swaps in a custom refinement backend in place of
    /// [`SpectralSmoothing`].
    pub fn with_transform(mut self, transform: Box<dyn DiffusionTransform + Send + Sync>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Builds the evaluator; the diffusion transform is constructed once
    /// here and reused across the whole run.
    pub fn build(self) -> Evaluator {
        let transform = self
            .transform
            .unwrap_or_else(|| Box::new(SpectralSmoothing::new(self.bandwidth)));
        Evaluator {
            cmc_max_rank: self.cmc_max_rank,
            post_top_n: self.post_top_n,
            transform,
        }
    }
}

/// A configured evaluation pass over a query set and a gallery set.
pub struct Evaluator {
    cmc_max_rank: usize,
    post_top_n: Option<usize>,
    transform: Box<dyn DiffusionTransform + Send + Sync>,
}

impl Evaluator {
    /// Runs the full pass over a persisted embedding dump.
    ///
    /// Fails fast on a zero-norm embedding row or when no query has any
    /// valid gallery match; no partial metrics are emitted on failure.
    pub fn evaluate(&self, dump: &EmbeddingDump) -> Result<EvalReport> {
        let queries = dump.to_query_set()?.l2_normalized()?;
        let gallery = dump.to_gallery_set()?.l2_normalized()?;
        self.evaluate_sets(&queries, &gallery)
    }

    /// Runs the pass over already-normalized sets.
    pub fn evaluate_sets(
        &self,
        queries: &EmbeddingSet,
        gallery: &EmbeddingSet,
    ) -> Result<EvalReport> {
        info!("compute distance matrix");
        let dist = DistanceMatrix::from_normalized(queries, gallery);

        info!("start evaluating {} queries ...", queries.len());
        let acc = (0..queries.len())
            .into_par_iter()
            .map(|q| self.score_query(q, queries, gallery, &dist))
            .fold(
                || MetricAccumulator::new(self.cmc_max_rank),
                |mut acc, scored| {
                    match scored {
                        Some((cmc, ap)) => acc.push(&cmc, ap),
                        None => acc.note_skip(),
                    }
                    acc
                },
            )
            .reduce(
                || MetricAccumulator::new(self.cmc_max_rank),
                MetricAccumulator::merge,
            );

        let n_queries = queries.len();
        let n_skipped = acc.n_skipped();
        debug!(
            "{}/{} queries contributed, {} skipped",
            acc.n_scored(),
            n_queries,
            n_skipped
        );
        let (cmc, map) = acc.finalize()?;
        Ok(EvalReport {
            cmc,
            map,
            n_queries,
            n_skipped,
        })
    }

    /// CMC curve and AP for one query, or `None` when the query has no
    /// valid gallery match after exclusion.
    fn score_query(
        &self,
        q: usize,
        queries: &EmbeddingSet,
        gallery: &EmbeddingSet,
        dist: &DistanceMatrix,
    ) -> Option<(Vec<f64>, f64)> {
        let order = dist.argsort_row(q);
        let mut ranked = rank_with_exclusion(&order, queries.ids[q], queries.cams[q], gallery)?;

        if let Some(top_n) = self.post_top_n {
            rerank_top_n(
                &mut ranked,
                queries.row(q),
                gallery,
                self.transform.as_ref(),
                top_n,
            );
        }

        let cmc = cmc_curve(&ranked.matches, self.cmc_max_rank);
        let ap = average_precision(&ranked.matches);
        Some((cmc, ap))
    }
}
