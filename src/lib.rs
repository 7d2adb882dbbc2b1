//! Chunked N-dimensional typed arrays for scientific data access.
//!
//! `hyperslab` is the array/storage core of a scientific data library: typed
//! N-dimensional arrays with zero-copy strided views, a [`Range`]/[`Section`]
//! selection algebra, shape/stride [`Index`] addressing, and a chunk indexer
//! mapping strided read requests onto the equally-shaped chunks a storage
//! format keeps on disk. Format specifics (chunk address tables, byte
//! transport, compression) sit behind the capability traits of [`storage`].
//!
//! [`Range`]: section::Range
//! [`Section`]: section::Section
//! [`Index`]: index::Index
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use hyperslab::array::Value;
//! use hyperslab::chunk::ChunkedDataset;
//! use hyperslab::section::{Range, Section};
//! use hyperslab::storage::MemoryChunkStore;
//!
//! // A 10-element dataset of 32-bit ints stored in chunks of 4.
//! let store = Arc::new(MemoryChunkStore::new());
//! for (chunk, first) in [0u64, 1, 2].into_iter().zip([0i32, 4, 8]) {
//!     let bytes: Vec<u8> = (first..first + 4).flat_map(i32::to_ne_bytes).collect();
//!     store.insert_chunk(&[chunk], &bytes, Vec::new());
//! }
//! let dataset = ChunkedDataset::new(store, vec![10], vec![4], Value::Int(-1))?;
//!
//! // Every other element of [2, 7]: indices 2, 4 and 6.
//! let section = Section::new(vec![Range::new(2, 7, 2)?]);
//! let result = dataset.read(&section)?;
//! assert_eq!(result.to_vec::<i32>()?, vec![2, 4, 6]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Licence
//!
//! `hyperslab` is licensed under either of
//!  - the Apache License, Version 2.0 ([LICENSE-APACHE](https://www.apache.org/licenses/LICENSE-2.0)), or
//!  - the MIT license ([LICENSE-MIT](https://opensource.org/licenses/MIT)),
//!
//! at your option.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]

pub mod array;
pub mod chunk;
pub mod index;
pub mod section;
pub mod storage;
