//! Index file access.
//!
//! [`BlockFile`] is the seam to the host's I/O layer: positional reads
//! and writes over an abstract file handle. [`IndexFile`] layers the
//! header, block addressing, and node decoding on top of it. The handle
//! owns its file and cached header; it is created by open and mutated
//! only by insert.

use crate::error::{Error, Result};
use crate::index::layout::{BlockLayout, IndexHeader, NeighborMeta, HEADER_BYTES};
use crate::index::params::IndexOptions;
use crate::vector::{Vector, MAX_VECTOR_DIMS};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::debug;

/// Positional I/O over an abstract file handle.
///
/// Reads and writes carry their own offset, so implementations need no
/// seek state and the handle can stay `&self`.
pub trait BlockFile {
    /// Reads exactly `buf.len()` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// A short read is an error (`UnexpectedEof`), never a truncation.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;

    /// Writes all of `buf` at `offset`, extending the file if needed.
    ///
    /// # Errors
    ///
    /// A short write is an error (`WriteZero`), never a truncation.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()>;

    /// Returns the current file size in bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying metadata error.
    fn file_size(&self) -> io::Result<u64>;

    /// Flushes written data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns the underlying fsync error.
    fn sync(&self) -> io::Result<()>;
}

#[cfg(unix)]
impl BlockFile for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::write_all_at(self, buf, offset)
    }

    fn file_size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_all()
    }
}

#[cfg(windows)]
impl BlockFile for File {
    fn read_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.seek_read(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "short read of index block",
                    ))
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn write_at(&self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.seek_write(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "short write of index block",
                    ))
                }
                Ok(n) => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn file_size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_all()
    }
}

/// A graph node read from disk.
///
/// Owns a freshly decoded copy of its vector plus the raw block image,
/// so neighbor metadata and embedded neighbor vectors can be decoded on
/// demand without further I/O.
#[derive(Debug)]
pub struct VectorNode {
    /// The node's own vector.
    pub vec: Vector,
    /// Rowid supplied by the collaborator at insert time.
    pub id: i64,
    /// Offset of this node's block in the index file.
    pub offset: u64,
    /// Traversal bookkeeping flag.
    pub visited: bool,
    neighbor_count: usize,
    block: Vec<u8>,
}

impl VectorNode {
    /// Number of stored out-neighbors.
    #[must_use]
    pub fn neighbor_count(&self) -> usize {
        self.neighbor_count
    }

    /// Metadata record of neighbor `i`.
    #[must_use]
    pub fn neighbor_meta(&self, layout: &BlockLayout, i: usize) -> NeighborMeta {
        debug_assert!(i < self.neighbor_count);
        layout.neighbor_meta(&self.block, i)
    }

    /// Embedded vector of neighbor `i`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptIndex`] when the embedded dimension does
    /// not match the header.
    pub fn neighbor_vector(&self, layout: &BlockLayout, i: usize) -> Result<Vector> {
        debug_assert!(i < self.neighbor_count);
        layout.neighbor_vector(&self.block, i)
    }

    #[cfg(test)]
    pub(crate) fn synthetic(vec: Vector, id: i64, offset: u64) -> Self {
        Self {
            vec,
            id,
            offset,
            visited: false,
            neighbor_count: 0,
            block: Vec::new(),
        }
    }
}

/// An open index file: handle, cached header, cached geometry.
#[derive(Debug)]
pub struct IndexFile<F: BlockFile = File> {
    file: F,
    header: IndexHeader,
    layout: BlockLayout,
    file_size: u64,
}

impl IndexFile<File> {
    /// Opens `path` read-write, creating and initializing the file when
    /// it is absent or empty.
    ///
    /// # Errors
    ///
    /// See [`IndexFile::with_file`]; open failures surface as
    /// [`Error::Io`].
    pub fn open(path: &Path, options: &IndexOptions) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::with_file(file, options)
    }
}

impl<F: BlockFile> IndexFile<F> {
    /// Opens an index over an already-open block file.
    ///
    /// An empty file is initialized: a fresh header is written, padded
    /// to one full block so node offsets stay block-aligned. A
    /// non-empty file must carry a valid header whose dimension matches
    /// `options`, and its length must be a whole number of blocks.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] / [`Error::LimitExceeded`] when the
    ///   requested dimension is zero, above the maximum, or does not
    ///   fit the block size.
    /// - [`Error::CorruptIndex`] / [`Error::Unsupported`] from header
    ///   validation, or when the file length is not a whole number of
    ///   blocks.
    /// - [`Error::DimensionMismatch`] when an existing file declares a
    ///   different dimension than `options`.
    /// - [`Error::Io`] on any I/O failure.
    pub fn with_file(file: F, options: &IndexOptions) -> Result<Self> {
        let size = file.file_size()?;
        if size == 0 {
            Self::create(file, options)
        } else {
            Self::open_existing(file, options, size)
        }
    }

    fn create(file: F, options: &IndexOptions) -> Result<Self> {
        if options.dimension == 0 {
            return Err(Error::InvalidArgument(
                "vector dimension must be positive".to_string(),
            ));
        }
        if usize::from(options.dimension) > MAX_VECTOR_DIMS {
            return Err(Error::LimitExceeded(format!(
                "vector is larger than the maximum: ({MAX_VECTOR_DIMS})"
            )));
        }
        let header = IndexHeader::new(options.dimension, options.block_size_units);
        let layout = BlockLayout::for_header(&header).map_err(|_| {
            Error::InvalidArgument(format!(
                "dimension {} does not fit a {} byte block",
                options.dimension,
                header.block_bytes()
            ))
        })?;
        let mut block = vec![0u8; layout.block_bytes];
        header.encode(&mut block);
        file.write_at(&block, 0)?;
        debug!(
            dims = header.vector_dims,
            block_bytes = layout.block_bytes,
            "created index file"
        );
        Ok(Self {
            file,
            header,
            layout,
            file_size: layout.block_bytes as u64,
        })
    }

    fn open_existing(file: F, options: &IndexOptions, size: u64) -> Result<Self> {
        let mut buf = [0u8; HEADER_BYTES];
        file.read_at(&mut buf, 0)?;
        let header = IndexHeader::decode(&buf)?;
        if header.vector_dims != options.dimension {
            return Err(Error::DimensionMismatch {
                expected: usize::from(options.dimension),
                actual: usize::from(header.vector_dims),
            });
        }
        let layout = BlockLayout::for_header(&header)?;
        // The file is the header block plus one block per node, nothing
        // else; a ragged length means a torn write or truncation.
        let block_bytes = layout.block_bytes as u64;
        if size < block_bytes || size % block_bytes != 0 {
            return Err(Error::CorruptIndex(format!(
                "file size {size} is not a whole number of {block_bytes} byte blocks"
            )));
        }
        debug!(
            dims = header.vector_dims,
            file_size = size,
            entry_offset = header.entry_offset,
            "opened index file"
        );
        Ok(Self {
            file,
            header,
            layout,
            file_size: size,
        })
    }

    /// Returns the cached header.
    #[must_use]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// Returns the cached block geometry.
    #[must_use]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Returns the file size in bytes, tracked through appends.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Reads and decodes the node block at `offset`.
    ///
    /// Neighbor payloads stay in the returned node's block image and
    /// are decoded only when the traversal expands the node.
    ///
    /// # Errors
    ///
    /// - [`Error::CorruptIndex`] when `offset` is zero or beyond the
    ///   file, or when the block contents contradict the header.
    /// - [`Error::Io`] on a failed or short read.
    pub fn read_node_at(&self, offset: u64) -> Result<VectorNode> {
        if offset == 0 || offset >= self.file_size {
            return Err(Error::CorruptIndex(format!(
                "node offset {offset} out of range"
            )));
        }
        let mut block = vec![0u8; self.layout.block_bytes];
        self.file.read_at(&mut block, offset)?;
        let vec = self.layout.node_vector(&block)?;
        let id = self.layout.node_id(&block);
        let neighbor_count = self.layout.neighbor_count(&block)?;
        Ok(VectorNode {
            vec,
            id,
            offset,
            visited: false,
            neighbor_count,
            block,
        })
    }

    /// Appends a node block at the end of the file.
    ///
    /// Returns the offset of the new block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on a failed write; the tracked file size
    /// is only advanced after the write succeeds.
    pub fn append_block(&mut self, block: &[u8]) -> Result<u64> {
        debug_assert_eq!(block.len(), self.layout.block_bytes);
        let offset = self.file_size;
        self.file.write_at(block, offset)?;
        self.file_size += block.len() as u64;
        Ok(offset)
    }

    /// Rewrites an existing node block in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptIndex`] when `offset` does not address
    /// an existing block, or [`Error::Io`] on a failed write.
    pub fn write_block_at(&mut self, block: &[u8], offset: u64) -> Result<()> {
        debug_assert_eq!(block.len(), self.layout.block_bytes);
        if offset == 0 || offset >= self.file_size {
            return Err(Error::CorruptIndex(format!(
                "node offset {offset} out of range"
            )));
        }
        self.file.write_at(block, offset)?;
        Ok(())
    }

    /// Points the search entry at `offset` and persists the header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on a failed write.
    pub fn set_entry_offset(&mut self, offset: u64) -> Result<()> {
        self.header.entry_offset = offset;
        self.write_header()
    }

    /// Rewrites the cached header at offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on a failed write.
    pub fn write_header(&mut self) -> Result<()> {
        let mut buf = [0u8; HEADER_BYTES];
        self.header.encode(&mut buf);
        self.file.write_at(&buf, 0)?;
        Ok(())
    }

    /// Flushes written blocks to durable storage.
    ///
    /// The core never syncs on its own; the collaborator decides when
    /// durability points happen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on a failed fsync.
    pub fn sync(&self) -> Result<()> {
        self.file.sync()?;
        Ok(())
    }
}
