//! # Annex Core
//!
//! Disk-native approximate nearest-neighbor index engine written in
//! Rust.
//!
//! Annex keeps a vector search graph in a single sidecar file next to a
//! relational database. Each graph node occupies one fixed-size block
//! holding the node's vector together with the vectors and locations of
//! its out-neighbors (the LM-DiskANN layout), so a search reads at most
//! one block per hop and the resident set stays a tiny fraction of the
//! corpus.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use annex_core::{DiskAnnIndex, IndexOptions, SearchParams, Vector};
//!
//! let path = DiskAnnIndex::sidecar_path("app.db".as_ref(), "embedding_idx");
//! let mut index = DiskAnnIndex::open(&path, IndexOptions::new(768))?;
//!
//! index.insert(&Vector::parse_text("[0.1, 0.7, ...]")?, 42)?;
//!
//! let nearest = index.search(&query, 10, &SearchParams::default())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod codec;
pub mod error;
pub mod index;
pub mod vector;

pub use error::{Error, Result};
pub use index::{DiskAnnIndex, IndexOptions, SearchParams};
pub use vector::{distance_cos, ValueRef, Vector, VectorType};
