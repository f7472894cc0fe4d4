//! On-disk layout of the index file.
//!
//! The file starts with a 32-byte header padded out to one full block,
//! followed by fixed-size node blocks. Each node block embeds the
//! node's own vector, its rowid, and the vectors and locations of its
//! out-neighbors, so a traversal touches at most one block per hop.
//!
//! Node block layout:
//!
//! 1. Own vector blob (`4 + 4 * dims` bytes).
//! 2. Own id (8 bytes).
//! 3. Neighbor count `m` (2 bytes).
//! 4. `M` neighbor vector blobs; entries with index >= `m` are zero.
//! 5. `M` neighbor metadata records of 16 bytes each (`id`, `offset`);
//!    entries with index >= `m` are zero.
//! 6. Zero padding to the end of the block.

use crate::codec;
use crate::error::{Error, Result};
use crate::vector::{Vector, VectorType};
use serde::{Deserialize, Serialize};

/// Magic number at offset 0 ("DiskANN\0" when read as little-endian bytes).
pub const INDEX_MAGIC: u64 = 0x004E_4E41_6B73_6944;

/// Shift converting the header's block-size field to bytes.
pub const BLOCK_SIZE_SHIFT: u32 = 9;

/// Default block-size field value (4096-byte blocks).
pub const DEFAULT_BLOCK_SIZE_UNITS: u16 = 8;

/// Encoded header length in bytes.
pub const HEADER_BYTES: usize = 32;

const ID_BYTES: usize = 8;
const NEIGHBOR_COUNT_BYTES: usize = 2;
const NEIGHBOR_META_BYTES: usize = 16;

/// Similarity function baked into an index at creation.
///
/// One index uses exactly one function; the tag is stored in the header
/// and other values are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityFunction {
    /// Cosine distance (`1 - cosine similarity`).
    Cosine,
}

impl SimilarityFunction {
    /// Returns the on-disk tag for this function.
    #[must_use]
    pub const fn tag(self) -> u16 {
        0
    }

    /// Decodes an on-disk similarity tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for any tag other than cosine.
    pub fn from_tag(tag: u16) -> Result<Self> {
        match tag {
            0 => Ok(Self::Cosine),
            other => Err(Error::Unsupported(format!(
                "unknown similarity function: {other}"
            ))),
        }
    }
}

/// Identity and location of one out-neighbor.
///
/// Enough to reopen the neighbor's block directly, without walking the
/// graph from the entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborMeta {
    /// Rowid of the neighbor.
    pub id: i64,
    /// File offset of the neighbor's block.
    pub offset: u64,
}

/// Decoded index-file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Block size in 512-byte units.
    pub block_size_units: u16,
    /// Element type of every stored vector.
    pub vector_type: VectorType,
    /// Declared vector dimension; every inserted vector must match.
    pub vector_dims: u16,
    /// Similarity function used by traversal.
    pub similarity: SimilarityFunction,
    /// Offset of the search entry node, or 0 while the graph is empty.
    pub entry_offset: u64,
    /// Head of the free list. Reserved for deletion; always 0 today.
    pub first_free_offset: u64,
}

impl IndexHeader {
    /// Creates a fresh header for a new index file.
    #[must_use]
    pub const fn new(vector_dims: u16, block_size_units: u16) -> Self {
        Self {
            block_size_units,
            vector_type: VectorType::F32,
            vector_dims,
            similarity: SimilarityFunction::Cosine,
            entry_offset: 0,
            first_free_offset: 0,
        }
    }

    /// Returns the block size in bytes.
    #[must_use]
    pub const fn block_bytes(&self) -> usize {
        (self.block_size_units as usize) << BLOCK_SIZE_SHIFT
    }

    /// Encodes the header into the first [`HEADER_BYTES`] of `buf`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`HEADER_BYTES`].
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        let mut off = codec::write_u64(buf, INDEX_MAGIC);
        off += codec::write_u16(&mut buf[off..], self.block_size_units);
        off += codec::write_u16(&mut buf[off..], self.vector_type.tag());
        off += codec::write_u16(&mut buf[off..], self.vector_dims);
        off += codec::write_u16(&mut buf[off..], self.similarity.tag());
        off += codec::write_u64(&mut buf[off..], self.entry_offset);
        off += codec::write_u64(&mut buf[off..], self.first_free_offset);
        debug_assert_eq!(off, HEADER_BYTES);
        off
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// - [`Error::CorruptIndex`] on a bad magic number, a zero block
    ///   size, or an out-of-range dimension.
    /// - [`Error::Unsupported`] on unknown vector-type or similarity
    ///   tags.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let magic = codec::read_u64(buf);
        if magic != INDEX_MAGIC {
            return Err(Error::CorruptIndex(format!("bad magic: {magic:#x}")));
        }
        let block_size_units = codec::read_u16(&buf[8..]);
        let vector_type = VectorType::from_tag(codec::read_u16(&buf[10..]))?;
        let vector_dims = codec::read_u16(&buf[12..]);
        let similarity = SimilarityFunction::from_tag(codec::read_u16(&buf[14..]))?;
        if block_size_units == 0 {
            return Err(Error::CorruptIndex("zero block size".to_string()));
        }
        if vector_dims == 0 || usize::from(vector_dims) > crate::vector::MAX_VECTOR_DIMS {
            return Err(Error::CorruptIndex(format!(
                "dimension out of range: {vector_dims}"
            )));
        }
        Ok(Self {
            block_size_units,
            vector_type,
            vector_dims,
            similarity,
            entry_offset: codec::read_u64(&buf[16..]),
            first_free_offset: codec::read_u64(&buf[24..]),
        })
    }
}

/// Block geometry derived from the header, cached on the open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// Bytes per block.
    pub block_bytes: usize,
    /// Declared vector dimension.
    pub dims: usize,
    /// Encoded size of one vector blob (`4 + 4 * dims`).
    pub vector_blob_bytes: usize,
    /// Upper bound `M` on stored out-neighbors per node.
    pub max_neighbors: usize,
    /// Byte offset of the neighbor-metadata region within a block.
    pub neighbor_meta_offset: usize,
}

impl BlockLayout {
    /// Derives the block geometry for `header`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptIndex`] when the block is too small to
    /// hold a node of the declared dimension with at least one
    /// neighbor.
    pub fn for_header(header: &IndexHeader) -> Result<Self> {
        let block_bytes = header.block_bytes();
        let dims = usize::from(header.vector_dims);
        let vector_blob_bytes = 4 + 4 * dims;
        let fixed = vector_blob_bytes + ID_BYTES + NEIGHBOR_COUNT_BYTES;
        if fixed + vector_blob_bytes + NEIGHBOR_META_BYTES > block_bytes {
            return Err(Error::CorruptIndex(format!(
                "block size {block_bytes} cannot hold a dimension-{dims} node"
            )));
        }
        let max_neighbors = (block_bytes - fixed) / (vector_blob_bytes + NEIGHBOR_META_BYTES);
        Ok(Self {
            block_bytes,
            dims,
            vector_blob_bytes,
            max_neighbors,
            neighbor_meta_offset: fixed + max_neighbors * vector_blob_bytes,
        })
    }

    const fn id_offset(&self) -> usize {
        self.vector_blob_bytes
    }

    const fn neighbor_count_offset(&self) -> usize {
        self.vector_blob_bytes + ID_BYTES
    }

    const fn neighbor_vector_offset(&self, i: usize) -> usize {
        self.neighbor_count_offset() + NEIGHBOR_COUNT_BYTES + i * self.vector_blob_bytes
    }

    const fn neighbor_meta_slot(&self, i: usize) -> usize {
        self.neighbor_meta_offset + i * NEIGHBOR_META_BYTES
    }

    /// Serializes a node block: own vector, id, neighbor vectors and
    /// metadata, zero padding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptIndex`] when more than
    /// [`BlockLayout::max_neighbors`] neighbors are supplied; callers
    /// prune before encoding.
    ///
    /// # Panics
    ///
    /// Panics if `vec` or any neighbor vector does not match the
    /// layout's dimension. Dimensions are validated at the API
    /// boundary, so a mismatch here is a bug.
    pub fn encode_node_block(
        &self,
        vec: &Vector,
        id: i64,
        neighbors: &[(&Vector, NeighborMeta)],
    ) -> Result<Vec<u8>> {
        if neighbors.len() > self.max_neighbors {
            return Err(Error::CorruptIndex(format!(
                "{} neighbors exceed the block bound of {}",
                neighbors.len(),
                self.max_neighbors
            )));
        }
        assert_eq!(vec.dims(), self.dims, "node vector dimension");

        let mut block = vec![0u8; self.block_bytes];
        write_vector_blob(&mut block, vec);
        codec::write_i64(&mut block[self.id_offset()..], id);
        let count = u16::try_from(neighbors.len()).expect("neighbor count fits in u16");
        codec::write_u16(&mut block[self.neighbor_count_offset()..], count);
        for (i, (nvec, meta)) in neighbors.iter().enumerate() {
            assert_eq!(nvec.dims(), self.dims, "neighbor vector dimension");
            write_vector_blob(&mut block[self.neighbor_vector_offset(i)..], nvec);
            let slot = self.neighbor_meta_slot(i);
            codec::write_i64(&mut block[slot..], meta.id);
            codec::write_u64(&mut block[slot + 8..], meta.offset);
        }
        Ok(block)
    }

    /// Decodes the node's own vector, validating it against the header
    /// dimension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptIndex`] when the embedded dimension does
    /// not match the header.
    pub fn node_vector(&self, block: &[u8]) -> Result<Vector> {
        let vec = Vector::parse_blob(&block[..self.vector_blob_bytes])?;
        if vec.dims() != self.dims {
            return Err(Error::CorruptIndex(format!(
                "node vector has dimension {}, header declares {}",
                vec.dims(),
                self.dims
            )));
        }
        Ok(vec)
    }

    /// Decodes the node's rowid.
    #[must_use]
    pub fn node_id(&self, block: &[u8]) -> i64 {
        codec::read_i64(&block[self.id_offset()..])
    }

    /// Decodes and validates the stored neighbor count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptIndex`] when the count exceeds the
    /// geometric bound `M`.
    pub fn neighbor_count(&self, block: &[u8]) -> Result<usize> {
        let count = usize::from(codec::read_u16(&block[self.neighbor_count_offset()..]));
        if count > self.max_neighbors {
            return Err(Error::CorruptIndex(format!(
                "neighbor count {count} exceeds the block bound of {}",
                self.max_neighbors
            )));
        }
        Ok(count)
    }

    /// Decodes the metadata record of neighbor `i`.
    #[must_use]
    pub fn neighbor_meta(&self, block: &[u8], i: usize) -> NeighborMeta {
        let slot = self.neighbor_meta_slot(i);
        NeighborMeta {
            id: codec::read_i64(&block[slot..]),
            offset: codec::read_u64(&block[slot + 8..]),
        }
    }

    /// Decodes the embedded vector of neighbor `i`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptIndex`] when the embedded dimension does
    /// not match the header.
    pub fn neighbor_vector(&self, block: &[u8], i: usize) -> Result<Vector> {
        let start = self.neighbor_vector_offset(i);
        let vec = Vector::parse_blob(&block[start..start + self.vector_blob_bytes])?;
        if vec.dims() != self.dims {
            return Err(Error::CorruptIndex(format!(
                "neighbor vector has dimension {}, header declares {}",
                vec.dims(),
                self.dims
            )));
        }
        Ok(vec)
    }
}

fn write_vector_blob(buf: &mut [u8], vec: &Vector) {
    let dims = u32::try_from(vec.dims()).expect("dims bounded by MAX_VECTOR_DIMS");
    let mut off = codec::write_u32(buf, dims);
    for &elem in vec.as_slice() {
        off += codec::write_f32(&mut buf[off..], elem);
    }
}
