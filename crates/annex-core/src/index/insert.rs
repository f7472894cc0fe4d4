//! Incremental graph growth.
//!
//! A new node is wired into the graph in three moves: a traversal with
//! the new vector as the query collects nearby nodes, the robust-prune
//! rule distills them into a diverse neighbor list bounded by the block
//! geometry, and each chosen neighbor gets a back-link to the new node
//! so the graph stays navigable in both directions.

use crate::error::{Error, Result};
use crate::index::file::{BlockFile, IndexFile};
use crate::index::layout::{BlockLayout, NeighborMeta};
use crate::index::params::SearchParams;
use crate::index::search::SearchContext;
use crate::vector::Vector;
use tracing::warn;

/// Diversification factor of the robust-prune rule.
pub(crate) const PRUNE_ALPHA: f32 = 1.2;

/// One pruning candidate: a vector, where it lives, and its distance to
/// the pruning target.
pub(crate) struct PruneCandidate {
    pub vec: Vector,
    pub id: i64,
    pub offset: u64,
    pub dist: f32,
}

/// Robust prune: keeps a diverse subset of at most `max_neighbors`
/// candidates.
///
/// Candidates are taken in ascending order of distance to the target; a
/// candidate survives only when no already-kept neighbor lies within a
/// factor `alpha` of it, which skips candidates that an existing
/// neighbor already covers on the way to the target.
pub(crate) fn robust_prune(
    mut candidates: Vec<PruneCandidate>,
    alpha: f32,
    max_neighbors: usize,
) -> Vec<PruneCandidate> {
    candidates.sort_by(|a, b| {
        a.dist
            .total_cmp(&b.dist)
            .then_with(|| a.offset.cmp(&b.offset))
    });
    let mut kept: Vec<PruneCandidate> = Vec::with_capacity(max_neighbors.min(candidates.len()));
    for cand in candidates {
        if kept.len() == max_neighbors {
            break;
        }
        let diverse = kept
            .iter()
            .all(|n| alpha * n.vec.distance_cos(&cand.vec) > cand.dist);
        if diverse {
            kept.push(cand);
        }
    }
    kept
}

/// Inserts a vector with its rowid into the graph.
///
/// Not transactional: an I/O failure after the append leaves an orphan
/// block, and a failure while back-linking leaves some neighbors
/// updated and others not. Both degrade recall without corrupting the
/// structure, and neither is rolled back.
pub(crate) fn insert<F: BlockFile>(
    index: &mut IndexFile<F>,
    vec: &Vector,
    id: i64,
    params: &SearchParams,
) -> Result<()> {
    let expected = usize::from(index.header().vector_dims);
    if vec.dims() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: vec.dims(),
        });
    }
    let layout = *index.layout();

    // Everything the traversal visited is a linking candidate.
    let mut ctx = SearchContext::new(vec.clone(), params);
    ctx.run(index)?;
    let candidates: Vec<PruneCandidate> = ctx
        .into_visited()
        .into_iter()
        .map(|scored| {
            let node = *scored.node;
            PruneCandidate {
                vec: node.vec,
                id: node.id,
                offset: node.offset,
                dist: scored.dist,
            }
        })
        .collect();
    let neighbors = robust_prune(candidates, PRUNE_ALPHA, layout.max_neighbors);

    let encoded: Vec<(&Vector, NeighborMeta)> = neighbors
        .iter()
        .map(|n| {
            (
                &n.vec,
                NeighborMeta {
                    id: n.id,
                    offset: n.offset,
                },
            )
        })
        .collect();
    let block = layout.encode_node_block(vec, id, &encoded)?;
    let new_offset = index.append_block(&block)?;

    for neighbor in &neighbors {
        if let Err(err) = back_link(index, &layout, neighbor.offset, vec, id, new_offset) {
            warn!(
                neighbor_offset = neighbor.offset,
                error = %err,
                "back-link failed, graph left partially linked"
            );
            return Err(err);
        }
    }

    if index.header().entry_offset == 0 {
        index.set_entry_offset(new_offset)?;
    }
    Ok(())
}

/// Adds the new node to an existing node's neighbor list, re-pruning
/// against that node's own vector when the list would overflow, and
/// rewrites its block in place.
fn back_link<F: BlockFile>(
    index: &mut IndexFile<F>,
    layout: &BlockLayout,
    target_offset: u64,
    new_vec: &Vector,
    new_id: i64,
    new_offset: u64,
) -> Result<()> {
    let node = index.read_node_at(target_offset)?;
    let mut entries: Vec<PruneCandidate> = Vec::with_capacity(node.neighbor_count() + 1);
    for i in 0..node.neighbor_count() {
        let meta = node.neighbor_meta(layout, i);
        let nvec = node.neighbor_vector(layout, i)?;
        entries.push(PruneCandidate {
            dist: node.vec.distance_cos(&nvec),
            vec: nvec,
            id: meta.id,
            offset: meta.offset,
        });
    }
    entries.push(PruneCandidate {
        vec: new_vec.clone(),
        id: new_id,
        offset: new_offset,
        dist: node.vec.distance_cos(new_vec),
    });

    let entries = if entries.len() > layout.max_neighbors {
        robust_prune(entries, PRUNE_ALPHA, layout.max_neighbors)
    } else {
        entries
    };

    let encoded: Vec<(&Vector, NeighborMeta)> = entries
        .iter()
        .map(|n| {
            (
                &n.vec,
                NeighborMeta {
                    id: n.id,
                    offset: n.offset,
                },
            )
        })
        .collect();
    let block = layout.encode_node_block(&node.vec, node.id, &encoded)?;
    index.write_block_at(&block, node.offset)
}
