//! End-to-end scenarios over the public facade.
#![allow(clippy::cast_precision_loss)]

use annex_core::index::IndexFile;
use annex_core::{DiskAnnIndex, IndexOptions, SearchParams, Vector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const BLOCK: u64 = 4096;

fn vec_f32(elems: &[f32]) -> Vector {
    Vector::from_f32(elems.to_vec()).unwrap()
}

fn sidecar(dir: &tempfile::TempDir) -> PathBuf {
    DiskAnnIndex::sidecar_path(&dir.path().join("app.db"), "embedding_idx")
}

#[test]
fn sidecar_path_follows_the_naming_convention() {
    let path = DiskAnnIndex::sidecar_path(Path::new("/data/app.db"), "idx");
    assert_eq!(path, Path::new("/data/app.db-vectoridx-idx"));
}

#[test]
fn open_fresh_writes_a_single_header_block() {
    let dir = tempdir().unwrap();
    let path = sidecar(&dir);

    let index = DiskAnnIndex::open(&path, IndexOptions::new(3)).unwrap();
    assert!(index.is_empty());
    assert_eq!(index.node_count(), 0);
    assert_eq!(index.header().entry_offset, 0);
    index.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len() as u64, BLOCK);
    assert_eq!(
        u64::from_le_bytes(bytes[..8].try_into().unwrap()),
        0x004E_4E41_6B73_6944
    );
}

#[test]
fn first_insert_grows_the_file_and_sets_the_entry() {
    let dir = tempdir().unwrap();
    let path = sidecar(&dir);

    let mut index = DiskAnnIndex::open(&path, IndexOptions::new(3)).unwrap();
    index.insert(&vec_f32(&[1.0, 0.0, 0.0]), 7).unwrap();

    assert_eq!(index.file_size(), 2 * BLOCK);
    assert_eq!(index.header().entry_offset, BLOCK);
    assert_eq!(index.node_count(), 1);
    index.close().unwrap();

    let file = IndexFile::open(&path, &IndexOptions::new(3)).unwrap();
    let node = file.read_node_at(BLOCK).unwrap();
    assert_eq!(node.id, 7);
    assert_eq!(node.vec, vec_f32(&[1.0, 0.0, 0.0]));
    assert_eq!(node.neighbor_count(), 0);
}

#[test]
fn second_insert_back_links_the_first_node() {
    let dir = tempdir().unwrap();
    let path = sidecar(&dir);

    let mut index = DiskAnnIndex::open(&path, IndexOptions::new(3)).unwrap();
    index.insert(&vec_f32(&[1.0, 0.0, 0.0]), 7).unwrap();
    index.insert(&vec_f32(&[0.0, 1.0, 0.0]), 8).unwrap();
    assert_eq!(index.file_size(), 3 * BLOCK);
    index.close().unwrap();

    let file = IndexFile::open(&path, &IndexOptions::new(3)).unwrap();
    let layout = *file.layout();

    let first = file.read_node_at(BLOCK).unwrap();
    assert_eq!(first.neighbor_count(), 1);
    let meta = first.neighbor_meta(&layout, 0);
    assert_eq!((meta.id, meta.offset), (8, 2 * BLOCK));

    let second = file.read_node_at(2 * BLOCK).unwrap();
    assert_eq!(second.neighbor_count(), 1);
    let meta = second.neighbor_meta(&layout, 0);
    assert_eq!((meta.id, meta.offset), (7, BLOCK));
}

#[test]
fn insert_blob_parses_the_wire_form() {
    let dir = tempdir().unwrap();
    let mut index = DiskAnnIndex::open(sidecar(&dir), IndexOptions::new(3)).unwrap();

    index
        .insert_blob(&vec_f32(&[0.5, 0.5, 0.0]).to_blob(), 21)
        .unwrap();
    let found = index
        .search(&vec_f32(&[0.5, 0.5, 0.0]), 1, &SearchParams::default())
        .unwrap();
    assert_eq!(found, vec![21]);
}

#[test]
fn search_on_an_empty_index_returns_nothing() {
    let dir = tempdir().unwrap();
    let index = DiskAnnIndex::open(sidecar(&dir), IndexOptions::new(3)).unwrap();
    let found = index
        .search(&vec_f32(&[1.0, 0.0, 0.0]), 5, &SearchParams::default())
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn mismatched_dimensions_are_rejected() {
    let dir = tempdir().unwrap();
    let mut index = DiskAnnIndex::open(sidecar(&dir), IndexOptions::new(3)).unwrap();

    assert!(index.insert(&vec_f32(&[1.0, 0.0]), 1).is_err());
    assert!(index
        .search(&vec_f32(&[1.0, 0.0]), 1, &SearchParams::default())
        .is_err());
}

#[test]
fn file_size_tracks_the_insert_count() {
    let dir = tempdir().unwrap();
    let mut index = DiskAnnIndex::open(sidecar(&dir), IndexOptions::new(4)).unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    for i in 0..25i64 {
        let v: Vec<f32> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();
        index.insert(&vec_f32(&v), i).unwrap();
        assert_eq!(index.file_size(), (u64::try_from(i).unwrap() + 2) * BLOCK);
    }
    assert_eq!(index.node_count(), 25);
    let entry = index.header().entry_offset;
    assert!(entry >= BLOCK && entry <= 25 * BLOCK);
    assert_eq!(entry % BLOCK, 0);
}

#[test]
fn every_inserted_node_stays_reachable() {
    let dir = tempdir().unwrap();
    let path = sidecar(&dir);
    let mut rng = StdRng::seed_from_u64(42);
    let count = 60i64;

    {
        let mut index = DiskAnnIndex::open(&path, IndexOptions::new(8)).unwrap();
        for i in 0..count {
            let v: Vec<f32> = (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect();
            index.insert(&vec_f32(&v), i).unwrap();
        }
        index.close().unwrap();
    }

    // Breadth-first walk over stored neighbor metadata.
    let file = IndexFile::open(&path, &IndexOptions::new(8)).unwrap();
    let layout = *file.layout();
    let mut seen: HashSet<u64> = HashSet::new();
    let mut queue = VecDeque::from([file.header().entry_offset]);
    while let Some(offset) = queue.pop_front() {
        if !seen.insert(offset) {
            continue;
        }
        let node = file.read_node_at(offset).unwrap();
        for i in 0..node.neighbor_count() {
            let meta = node.neighbor_meta(&layout, i);
            if !seen.contains(&meta.offset) {
                queue.push_back(meta.offset);
            }
        }
    }
    assert_eq!(seen.len(), usize::try_from(count).unwrap());

    // Every block decodes with the declared dimension and a bounded
    // fan-out (read_node_at validates both).
    for i in 0..count {
        let offset = (u64::try_from(i).unwrap() + 1) * BLOCK;
        let node = file.read_node_at(offset).unwrap();
        assert!(node.neighbor_count() <= layout.max_neighbors);
        assert_eq!(node.vec.dims(), 8);
    }
}

#[test]
fn recall_tracks_brute_force_on_random_unit_vectors() {
    let dir = tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let dims = 16;
    let count = 1000;

    let mut dataset: Vec<Vector> = Vec::with_capacity(count);
    for _ in 0..count {
        let mut v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter_mut().for_each(|x| *x /= norm);
        dataset.push(vec_f32(&v));
    }

    let mut index = DiskAnnIndex::open(sidecar(&dir), IndexOptions::new(16)).unwrap();
    for (i, v) in dataset.iter().enumerate() {
        index.insert(v, i64::try_from(i).unwrap()).unwrap();
    }

    let params = SearchParams {
        width: 32,
        read_budget: 2048,
    };
    let mut ratio_sum = 0.0f64;
    let queries = 10;
    for _ in 0..queries {
        let q: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        let query = vec_f32(&q);

        let found = index.search(&query, 10, &params).unwrap();
        assert_eq!(found.len(), 10);
        let ann_avg: f64 = found
            .iter()
            .map(|&id| {
                f64::from(query.distance_cos(&dataset[usize::try_from(id).unwrap()]))
            })
            .sum::<f64>()
            / 10.0;

        let mut exact: Vec<f32> = dataset.iter().map(|v| query.distance_cos(v)).collect();
        exact.sort_by(f32::total_cmp);
        let exact_avg: f64 = exact[..10].iter().map(|&d| f64::from(d)).sum::<f64>() / 10.0;

        // Guard against a degenerate exact average.
        let ratio = ann_avg / exact_avg.max(1e-6);
        ratio_sum += ratio;
    }
    let avg_ratio = ratio_sum / f64::from(queries);
    assert!(avg_ratio <= 1.5, "average distance ratio {avg_ratio}");
}

#[test]
fn reopen_preserves_search_results() {
    let dir = tempdir().unwrap();
    let path = sidecar(&dir);

    {
        let mut index = DiskAnnIndex::open(&path, IndexOptions::new(3)).unwrap();
        index.insert(&vec_f32(&[1.0, 0.0, 0.0]), 1).unwrap();
        index.insert(&vec_f32(&[0.0, 1.0, 0.0]), 2).unwrap();
        index.insert(&vec_f32(&[0.0, 0.0, 1.0]), 3).unwrap();
        index.close().unwrap();
    }

    let index = DiskAnnIndex::open(&path, IndexOptions::new(3)).unwrap();
    assert_eq!(index.node_count(), 3);
    let found = index
        .search(&vec_f32(&[0.0, 0.9, 0.1]), 1, &SearchParams::default())
        .unwrap();
    assert_eq!(found, vec![2]);
}
