//! Chunked dataset reads.
//!
//! Chunked formats shard an array into equally-shaped chunks laid out
//! independently on disk. Servicing a strided [`Section`](crate::section::Section)
//! request means finding the chunks the request intersects, fetching and
//! decoding each one, and scattering the selected elements into the
//! destination. The [`ChunkIndexer`] computes the per-chunk transfers; the
//! [`ChunkedDataset`] drives them against the storage collaborators of
//! [`crate::storage`].

mod dataset;
mod indexer;

pub use dataset::{
    ChunkedDataset, DatasetCreateError, MissingChunkPolicy, ReadError, ReadOptions, ReadStatus,
};
pub use indexer::{ChunkIndexer, ChunkTransfer, IteratorExhaustedError};

/// One stage of a stored chunk's filter pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterSpec {
    /// The format-assigned filter id.
    pub id: u32,
    /// Filter-specific parameters.
    pub client_data: Vec<u32>,
}

impl FilterSpec {
    /// The deflate (zlib) compression filter id.
    pub const DEFLATE: u32 = 1;

    /// Create a filter stage with no parameters.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self {
            id,
            client_data: Vec::new(),
        }
    }
}

/// The stored location and encoding of one chunk, resolved by a
/// [`ChunkLayout`](crate::storage::ChunkLayout).
///
/// Consumed opaquely by the read path: the byte range is handed to the
/// [`RangeReader`](crate::storage::RangeReader) and the filters to the
/// [`FilterPipeline`](crate::storage::FilterPipeline).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// The chunk-grid coordinates.
    pub chunk_indices: Vec<u64>,
    /// The byte offset of the stored payload.
    pub byte_offset: u64,
    /// The stored payload size in bytes (after filtering).
    pub stored_size: u64,
    /// The filter pipeline applied at write time, outermost first.
    pub filters: Vec<FilterSpec>,
}

impl ChunkDescriptor {
    /// Returns true if the stored payload must pass through a filter
    /// pipeline before use.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        !self.filters.is_empty()
    }
}
