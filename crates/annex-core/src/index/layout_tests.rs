//! Tests for the header and node-block layout.

use super::layout::{
    BlockLayout, IndexHeader, NeighborMeta, DEFAULT_BLOCK_SIZE_UNITS, HEADER_BYTES, INDEX_MAGIC,
};
use crate::error::Error;
use crate::vector::Vector;

fn header(dims: u16) -> IndexHeader {
    IndexHeader::new(dims, DEFAULT_BLOCK_SIZE_UNITS)
}

#[test]
fn magic_spells_diskann_on_disk() {
    let mut buf = [0u8; HEADER_BYTES];
    header(3).encode(&mut buf);
    assert_eq!(&buf[..8], b"DiskANN\0");
    assert_eq!(u64::from_le_bytes(buf[..8].try_into().unwrap()), INDEX_MAGIC);
}

#[test]
fn header_round_trip() {
    let mut original = header(768);
    original.entry_offset = 4096;
    original.first_free_offset = 0;

    let mut buf = [0u8; HEADER_BYTES];
    assert_eq!(original.encode(&mut buf), HEADER_BYTES);
    let decoded = IndexHeader::decode(&buf).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn header_field_offsets() {
    let mut h = header(3);
    h.entry_offset = 0x1111_2222_3333_4444;
    h.first_free_offset = 0x5555_6666_7777_8888;
    let mut buf = [0u8; HEADER_BYTES];
    h.encode(&mut buf);

    assert_eq!(u16::from_le_bytes(buf[8..10].try_into().unwrap()), 8);
    assert_eq!(u16::from_le_bytes(buf[10..12].try_into().unwrap()), 0); // F32
    assert_eq!(u16::from_le_bytes(buf[12..14].try_into().unwrap()), 3);
    assert_eq!(u16::from_le_bytes(buf[14..16].try_into().unwrap()), 0); // cosine
    assert_eq!(
        u64::from_le_bytes(buf[16..24].try_into().unwrap()),
        0x1111_2222_3333_4444
    );
    assert_eq!(
        u64::from_le_bytes(buf[24..32].try_into().unwrap()),
        0x5555_6666_7777_8888
    );
}

#[test]
fn decode_rejects_bad_magic() {
    let mut buf = [0u8; HEADER_BYTES];
    header(3).encode(&mut buf);
    buf[0] ^= 0xFF;
    let err = IndexHeader::decode(&buf).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
}

#[test]
fn decode_rejects_unknown_vector_type() {
    let mut buf = [0u8; HEADER_BYTES];
    header(3).encode(&mut buf);
    buf[10] = 7;
    let err = IndexHeader::decode(&buf).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)), "{err}");
}

#[test]
fn decode_rejects_unknown_similarity() {
    let mut buf = [0u8; HEADER_BYTES];
    header(3).encode(&mut buf);
    buf[14] = 1;
    let err = IndexHeader::decode(&buf).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)), "{err}");
}

#[test]
fn decode_rejects_zero_dimension() {
    let mut buf = [0u8; HEADER_BYTES];
    header(3).encode(&mut buf);
    buf[12] = 0;
    buf[13] = 0;
    let err = IndexHeader::decode(&buf).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
}

#[test]
fn geometry_for_three_dims() {
    let layout = BlockLayout::for_header(&header(3)).unwrap();
    assert_eq!(layout.block_bytes, 4096);
    assert_eq!(layout.vector_blob_bytes, 16);
    // (4096 - 16 - 8 - 2) / (16 + 16)
    assert_eq!(layout.max_neighbors, 127);
    assert_eq!(layout.neighbor_meta_offset, 26 + 127 * 16);
}

#[test]
fn geometry_rejects_oversized_dimension() {
    // A 1000-dim vector blob is 4004 bytes; two of them plus metadata
    // cannot fit a 4096-byte block.
    let err = BlockLayout::for_header(&header(1000)).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
}

#[test]
fn node_block_round_trip() {
    let layout = BlockLayout::for_header(&header(3)).unwrap();
    let own = Vector::from_f32(vec![1.0, 2.0, 3.0]).unwrap();
    let n0 = Vector::from_f32(vec![4.0, 5.0, 6.0]).unwrap();
    let n1 = Vector::from_f32(vec![7.0, 8.0, 9.0]).unwrap();
    let neighbors = [
        (&n0, NeighborMeta { id: 10, offset: 8192 }),
        (&n1, NeighborMeta { id: -3, offset: 12288 }),
    ];

    let block = layout.encode_node_block(&own, 42, &neighbors).unwrap();
    assert_eq!(block.len(), layout.block_bytes);

    assert_eq!(layout.node_vector(&block).unwrap(), own);
    assert_eq!(layout.node_id(&block), 42);
    assert_eq!(layout.neighbor_count(&block).unwrap(), 2);
    assert_eq!(
        layout.neighbor_meta(&block, 0),
        NeighborMeta { id: 10, offset: 8192 }
    );
    assert_eq!(
        layout.neighbor_meta(&block, 1),
        NeighborMeta { id: -3, offset: 12288 }
    );
    assert_eq!(layout.neighbor_vector(&block, 0).unwrap(), n0);
    assert_eq!(layout.neighbor_vector(&block, 1).unwrap(), n1);
}

#[test]
fn unused_neighbor_slots_stay_zero() {
    let layout = BlockLayout::for_header(&header(3)).unwrap();
    let own = Vector::from_f32(vec![1.0, 0.0, 0.0]).unwrap();
    let block = layout.encode_node_block(&own, 7, &[]).unwrap();

    assert_eq!(layout.neighbor_count(&block).unwrap(), 0);
    // Every byte past the own-vector region is padding.
    assert!(block[layout.vector_blob_bytes + 8 + 2..]
        .iter()
        .all(|&b| b == 0));
}

#[test]
fn encode_rejects_too_many_neighbors() {
    let layout = BlockLayout::for_header(&header(3)).unwrap();
    let v = Vector::from_f32(vec![0.0, 0.0, 1.0]).unwrap();
    let meta = NeighborMeta { id: 1, offset: 4096 };
    let too_many: Vec<_> = (0..layout.max_neighbors + 1).map(|_| (&v, meta)).collect();
    assert!(layout.encode_node_block(&v, 1, &too_many).is_err());
}

#[test]
fn neighbor_count_above_bound_is_corruption() {
    let layout = BlockLayout::for_header(&header(3)).unwrap();
    let own = Vector::from_f32(vec![1.0, 0.0, 0.0]).unwrap();
    let mut block = layout.encode_node_block(&own, 7, &[]).unwrap();
    // Forge a count beyond the geometric bound.
    let count = u16::try_from(layout.max_neighbors + 1).unwrap();
    block[layout.vector_blob_bytes + 8..layout.vector_blob_bytes + 10]
        .copy_from_slice(&count.to_le_bytes());
    let err = layout.neighbor_count(&block).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
}
