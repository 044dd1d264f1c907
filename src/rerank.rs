//! Top-N re-ranking of filtered candidates
//!
//! - Gather the kept top-N gallery embeddings for a query
//! - Refine them through the diffusion transform
//! - Re-score the unit-norm query against each refined row
//! - Permute only the top-N slice of the match vector; the tail keeps its
//!   distance order

use crate::core::EmbeddingSet;
use crate::diffusion::DiffusionTransform;
use crate::operators::{argsort_descending, dot};
use crate::ranking::RankedQuery;

/// Reorders the leading `top_n` match flags of `ranked` by refined
/// similarity.
///
/// If fewer than `top_n` candidates survived exclusion the transform runs on
/// exactly the kept candidates; this is never an error. The permutation
/// touches only the match vector — which identities are matched cannot
/// change, only their order within the slice.
///
/// `query_row` must be the unit-normalized query embedding; its dot product
/// against each refined row is the re-ranking score.
pub fn rerank_top_n(
    ranked: &mut RankedQuery,
    query_row: &[f64],
    gallery: &EmbeddingSet,
    transform: &(dyn DiffusionTransform + Send + Sync),
    top_n: usize,
) {
    let n = top_n.min(ranked.order.len());
    if n < 2 {
        return;
    }

    let top_rows: Vec<Vec<f64>> = ranked.order[..n]
        .iter()
        .map(|&g| gallery.row(g).to_vec())
        .collect();
    let refined = transform.apply(&top_rows);
    assert_eq!(
        refined.len(),
        n,
        "transform must preserve the number of rows"
    );

    let scores: Vec<f64> = refined.iter().map(|r| dot(query_row, r)).collect();
    let perm = argsort_descending(&scores);

    let reordered: Vec<u8> = perm.iter().map(|&p| ranked.matches[p]).collect();
    ranked.matches[..n].copy_from_slice(&reordered);
}
