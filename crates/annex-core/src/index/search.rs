//! Greedy best-first traversal over the on-disk graph.
//!
//! The traversal starts at the entry node and repeatedly expands the
//! closest unvisited candidate, reading one block per expansion. The
//! candidate pool is bounded by the search width, so the working set
//! never exceeds `width` pending blocks plus the visited list.

use crate::error::Result;
use crate::index::file::{BlockFile, IndexFile, VectorNode};
use crate::index::layout::NeighborMeta;
use crate::index::params::SearchParams;
use crate::vector::Vector;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// A read node together with its cached distance to the query.
pub(crate) struct Scored {
    pub node: Box<VectorNode>,
    pub dist: f32,
}

/// Bounded working state of one traversal.
///
/// `candidates` holds the pending (unvisited) nodes, at most `width` of
/// them; `visited` owns every node that has been expanded. A node moves
/// from the pool to the visited list exactly once, so the two lists are
/// disjoint and together own every block read during the traversal.
pub(crate) struct SearchContext {
    pub query: Vector,
    pub width: usize,
    pub candidates: Vec<Scored>,
    pub visited: Vec<Scored>,
    pub reads: usize,
    pub read_budget: usize,
}

impl SearchContext {
    pub fn new(query: Vector, params: &SearchParams) -> Self {
        Self {
            query,
            width: params.width.max(1),
            candidates: Vec::with_capacity(params.width.max(1)),
            visited: Vec::new(),
            reads: 0,
            read_budget: params.read_budget,
        }
    }

    /// Candidate ordering: ascending distance, ties broken by the
    /// smaller file offset.
    fn rank(a: &Scored, b: &Scored) -> Ordering {
        a.dist
            .total_cmp(&b.dist)
            .then_with(|| a.node.offset.cmp(&b.node.offset))
    }

    /// Adds a pending candidate.
    ///
    /// When the pool is full the worst entry is evicted, so the pool
    /// always holds the `width` closest candidates encountered. An
    /// arrival that ranks worse than everything in a full pool is
    /// dropped on the spot.
    pub fn add_candidate(&mut self, node: Box<VectorNode>) {
        let dist = self.query.distance_cos(&node.vec);
        let entry = Scored { node, dist };
        if self.candidates.len() < self.width {
            self.candidates.push(entry);
            return;
        }
        let Some(worst) = self
            .candidates
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| Self::rank(a, b))
            .map(|(i, _)| i)
        else {
            return;
        };
        if Self::rank(&entry, &self.candidates[worst]) == Ordering::Less {
            self.candidates[worst] = entry;
        }
    }

    /// Moves the closest pending candidate onto the visited list.
    ///
    /// Returns its index in the visited list, or `None` when the pool
    /// is empty.
    pub fn visit_closest(&mut self) -> Option<usize> {
        let best = self
            .candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| Self::rank(a, b))
            .map(|(i, _)| i)?;
        let mut entry = self.candidates.swap_remove(best);
        entry.node.visited = true;
        self.visited.push(entry);
        Some(self.visited.len() - 1)
    }

    /// True when a block at `offset` is already held by the pool or the
    /// visited list.
    pub fn contains_offset(&self, offset: u64) -> bool {
        self.candidates
            .iter()
            .chain(self.visited.iter())
            .any(|entry| entry.node.offset == offset)
    }

    /// Runs the traversal from the index's entry point.
    ///
    /// On an empty graph this is a no-op. When the read budget runs out
    /// the traversal stops early and whatever has been visited stands
    /// as the result.
    pub fn run<F: BlockFile>(&mut self, index: &IndexFile<F>) -> Result<()> {
        let entry = index.header().entry_offset;
        if entry == 0 {
            return Ok(());
        }
        let layout = *index.layout();
        self.add_candidate(Box::new(index.read_node_at(entry)?));
        self.reads = 1;

        'walk: while let Some(idx) = self.visit_closest() {
            let metas: Vec<NeighborMeta> = {
                let node = &self.visited[idx].node;
                (0..node.neighbor_count())
                    .map(|i| node.neighbor_meta(&layout, i))
                    .collect()
            };
            for meta in metas {
                if meta.offset == 0 || self.contains_offset(meta.offset) {
                    continue;
                }
                if self.reads >= self.read_budget {
                    warn!(
                        reads = self.reads,
                        "read budget exhausted, returning best-so-far"
                    );
                    break 'walk;
                }
                self.add_candidate(Box::new(index.read_node_at(meta.offset)?));
                self.reads += 1;
            }
        }
        debug!(
            visited = self.visited.len(),
            reads = self.reads,
            "traversal finished"
        );
        Ok(())
    }

    /// Consumes the context, returning every visited node ordered by
    /// ascending distance to the query.
    pub fn into_visited(mut self) -> Vec<Scored> {
        self.visited.sort_by(|a, b| Self::rank(a, b));
        self.visited
    }
}
