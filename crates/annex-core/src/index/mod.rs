//! Disk-resident DiskANN index.
//!
//! The index is a single sidecar file next to the main database file.
//! Every graph node occupies one fixed-size block carrying the node's
//! vector plus the vectors and locations of its out-neighbors, so both
//! search and insert touch one block per hop. One open handle owns the
//! file exclusively; all operations on a handle are serial, and the
//! behavior of concurrent writers on the same file is undefined.

mod file;
mod insert;
mod layout;
mod params;
mod search;

#[cfg(test)]
mod layout_tests;

pub use file::{BlockFile, IndexFile, VectorNode};
pub use layout::{
    BlockLayout, IndexHeader, NeighborMeta, SimilarityFunction, BLOCK_SIZE_SHIFT,
    DEFAULT_BLOCK_SIZE_UNITS, HEADER_BYTES, INDEX_MAGIC,
};
pub use params::{IndexOptions, SearchParams};

use crate::error::{Error, Result};
use crate::index::search::SearchContext;
use crate::vector::Vector;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An open DiskANN index.
///
/// This is the surface the host engine drives: open the sidecar file,
/// feed it `(vector, rowid)` pairs as rows arrive, and ask it for the
/// rowids closest to a query vector. The handle's lifetime is tied to
/// the host cursor; dropping it closes the file without a final sync,
/// [`DiskAnnIndex::close`] syncs first.
pub struct DiskAnnIndex {
    file: IndexFile,
}

impl DiskAnnIndex {
    /// Derives the sidecar file path for `index_name` next to the main
    /// database file.
    #[must_use]
    pub fn sidecar_path(db_path: &Path, index_name: &str) -> PathBuf {
        let mut name = db_path.as_os_str().to_os_string();
        name.push(format!("-vectoridx-{index_name}"));
        PathBuf::from(name)
    }

    /// Opens the index at `path`, creating the file when absent.
    ///
    /// # Errors
    ///
    /// See [`IndexFile::with_file`].
    pub fn open<P: AsRef<Path>>(path: P, options: IndexOptions) -> Result<Self> {
        Ok(Self {
            file: IndexFile::open(path.as_ref(), &options)?,
        })
    }

    /// Inserts a vector under the given rowid.
    ///
    /// Not transactional: an I/O failure mid-insert can leave an orphan
    /// block or a partially back-linked node behind. Both degrade
    /// recall without corrupting the structure; neither is rolled back.
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionMismatch`] when the vector does not match
    ///   the index dimension.
    /// - [`Error::Io`] / [`Error::CorruptIndex`] from the underlying
    ///   traversal and writes.
    pub fn insert(&mut self, vector: &Vector, rowid: i64) -> Result<()> {
        insert::insert(&mut self.file, vector, rowid, &SearchParams::default())
    }

    /// Parses a vector blob and inserts it under the given rowid.
    ///
    /// This is the path the host's index-write hook uses: the row's
    /// vector column arrives still in blob form.
    ///
    /// # Errors
    ///
    /// Everything [`Vector::parse_blob`] and [`DiskAnnIndex::insert`]
    /// return.
    pub fn insert_blob(&mut self, blob: &[u8], rowid: i64) -> Result<()> {
        let vector = Vector::parse_blob(blob)?;
        self.insert(&vector, rowid)
    }

    /// Returns up to `k` rowids ordered by ascending cosine distance to
    /// `query`.
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionMismatch`] when the query does not match the
    ///   index dimension.
    /// - [`Error::Io`] / [`Error::CorruptIndex`] from block reads.
    pub fn search(&self, query: &Vector, k: usize, params: &SearchParams) -> Result<Vec<i64>> {
        let expected = usize::from(self.file.header().vector_dims);
        if query.dims() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: query.dims(),
            });
        }
        let mut ctx = SearchContext::new(query.clone(), params);
        ctx.run(&self.file)?;
        let rowids = ctx
            .into_visited()
            .into_iter()
            .take(k)
            .map(|scored| scored.node.id)
            .collect();
        debug!(k, "search finished");
        Ok(rowids)
    }

    /// Flushes the file to durable storage and closes the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the final sync fails; the file is
    /// closed either way.
    pub fn close(self) -> Result<()> {
        self.file.sync()
    }

    /// Returns the declared vector dimension.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        usize::from(self.file.header().vector_dims)
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> u64 {
        self.file.file_size() / self.file.layout().block_bytes as u64 - 1
    }

    /// True while no vector has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file.header().entry_offset == 0
    }

    /// Returns the per-node fan-out bound derived from the block
    /// geometry.
    #[must_use]
    pub fn max_neighbors(&self) -> usize {
        self.file.layout().max_neighbors
    }

    /// Returns the cached header.
    #[must_use]
    pub fn header(&self) -> &IndexHeader {
        self.file.header()
    }

    /// Returns the index file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file.file_size()
    }
}
