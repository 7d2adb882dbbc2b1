//! Storage collaborator boundary.
//!
//! The chunked read path in [`crate::chunk`] is format-agnostic: everything
//! format-specific sits behind the three capability traits here. A
//! [`RangeReader`] fetches raw byte ranges, a [`ChunkLayout`] resolves chunk
//! coordinates to [`ChunkDescriptor`]s (abstracting whatever B-tree or
//! address table the format keeps on disk), and a [`FilterPipeline`] decodes
//! compressed chunk payloads.
//!
//! Layout implementations must be immutable, or externally synchronised, for
//! the lifetime of any read session consulting them.

#[cfg(feature = "deflate")]
mod deflate;
mod file;
mod memory;

#[cfg(feature = "deflate")]
pub use deflate::DeflatePipeline;
pub use file::FileRangeReader;
pub use memory::MemoryChunkStore;

use thiserror::Error;

use crate::chunk::{ChunkDescriptor, FilterSpec};

/// A failure fetching bytes from backing storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The storage held fewer bytes than the requested range.
    #[error("short read at offset {offset}: requested {requested} bytes, got {got}")]
    ShortRead {
        /// The requested byte offset.
        offset: u64,
        /// The requested length.
        requested: u64,
        /// The number of bytes actually available.
        got: u64,
    },
}

/// A corrupt or unresolvable chunk layout lookup.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageLayoutError {
    /// A chunk required by the missing-chunk policy is absent.
    #[error("chunk {0:?} is absent from the chunk layout")]
    MissingChunk(Vec<u64>),
    /// The layout structure itself is corrupt.
    #[error("corrupt chunk layout: {0}")]
    Corrupt(String),
}

/// A failure decoding a filtered chunk payload.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A filter id no pipeline stage handles.
    #[error("unsupported filter id {0}")]
    UnsupportedFilter(u32),
    /// A pipeline stage failed to decode the payload.
    #[error("filter {id} failed to decode chunk payload")]
    Decode {
        /// The filter id of the failing stage.
        id: u32,
        /// The underlying decode failure.
        #[source]
        source: std::io::Error,
    },
}

/// Reads raw byte ranges from backing storage.
pub trait RangeReader: Send + Sync {
    /// Read exactly `length` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`StorageError`] on an I/O failure or a short read.
    fn read_bytes(&self, offset: u64, length: u64) -> Result<Vec<u8>, StorageError>;
}

/// Resolves chunk-grid coordinates to stored chunk descriptors.
pub trait ChunkLayout: Send + Sync {
    /// Look up the descriptor of the chunk at `chunk_indices`, or [`None`]
    /// if no chunk was ever written there.
    ///
    /// # Errors
    /// Returns [`StorageLayoutError`] if the layout structure is corrupt.
    fn resolve(&self, chunk_indices: &[u64])
        -> Result<Option<ChunkDescriptor>, StorageLayoutError>;
}

/// Decodes filtered chunk payloads back to raw element bytes.
pub trait FilterPipeline: Send + Sync {
    /// Decode `bytes` through `filters`, innermost filter last.
    ///
    /// # Errors
    /// Returns [`FilterError`] if a filter is unsupported or its payload is
    /// corrupt.
    fn decode(&self, bytes: Vec<u8>, filters: &[FilterSpec]) -> Result<Vec<u8>, FilterError>;
}

/// The pipeline for unfiltered data: passes payloads through untouched and
/// refuses every filter id.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPipeline;

impl FilterPipeline for NullPipeline {
    fn decode(&self, bytes: Vec<u8>, filters: &[FilterSpec]) -> Result<Vec<u8>, FilterError> {
        match filters.first() {
            None => Ok(bytes),
            Some(filter) => Err(FilterError::UnsupportedFilter(filter.id)),
        }
    }
}
