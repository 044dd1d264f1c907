//! Per-query ranking with duplicate-capture exclusion
//!
//! - Walk the distance-ordered gallery for one query
//! - Drop junk entries (sentinel identity) and trivial captures sharing both
//!   the query's identity and camera
//! - Emit the kept order and the 0/1 match vector over kept ranks
//! - A query with no true match left is a skip, not a zero contribution

use crate::core::{EmbeddingSet, JUNK_ID};

/// Filtered ranking for a single query: kept gallery indices (most similar
/// first) and the parallel 0/1 match flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedQuery {
    pub order: Vec<usize>,
    pub matches: Vec<u8>,
}

impl RankedQuery {
    /// Number of true matches among the kept candidates.
    #[inline]
    pub fn num_true(&self) -> usize {
        self.matches.iter().filter(|&&m| m == 1).count()
    }
}

/// Applies duplicate/junk exclusion to a distance-ordered gallery row.
///
/// A gallery entry is kept iff it is not the sentinel identity and it does
/// not share both identity and camera with the query; genuine cross-camera
/// captures of the query identity stay in and count as matches.
///
/// Returns `None` when no kept entry matches the query identity — the query
/// has no valid gallery match and must not contribute to any aggregate.
pub fn rank_with_exclusion(
    order: &[usize],
    query_id: i64,
    query_cam: i64,
    gallery: &EmbeddingSet,
) -> Option<RankedQuery> {
    let mut kept = Vec::with_capacity(order.len());
    let mut matches = Vec::with_capacity(order.len());
    let mut any_true = false;

    for &g in order {
        let gid = gallery.ids[g];
        if gid == JUNK_ID {
            continue;
        }
        if gid == query_id && gallery.cams[g] == query_cam {
            continue;
        }
        let hit = gid == query_id;
        any_true |= hit;
        kept.push(g);
        matches.push(hit as u8);
    }

    if !any_true {
        return None;
    }
    Some(RankedQuery {
        order: kept,
        matches,
    })
}
