//! An in-memory store, primarily for tests and fixtures.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{ChunkLayout, RangeReader, StorageError, StorageLayoutError};
use crate::chunk::{ChunkDescriptor, FilterSpec};

/// An in-memory chunk store: an append-only byte arena plus a chunk table.
///
/// Implements both [`RangeReader`] and [`ChunkLayout`], so it can back a
/// [`ChunkedDataset`](crate::chunk::ChunkedDataset) on its own. Interior
/// locking makes it shareable across threads; the parallel read path takes
/// only read locks.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    arena: RwLock<Vec<u8>>,
    table: RwLock<BTreeMap<Vec<u64>, ChunkDescriptor>>,
}

impl MemoryChunkStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk payload to the arena and record its descriptor.
    ///
    /// `bytes` is the stored (post-filter) payload; `filters` lists the
    /// pipeline applied to it, outermost first. Re-inserting a chunk leaves
    /// the old payload in the arena and repoints the table.
    pub fn insert_chunk(&self, chunk_indices: &[u64], bytes: &[u8], filters: Vec<FilterSpec>) {
        let mut arena = self.arena.write();
        let byte_offset = arena.len() as u64;
        arena.extend_from_slice(bytes);
        self.table.write().insert(
            chunk_indices.to_vec(),
            ChunkDescriptor {
                chunk_indices: chunk_indices.to_vec(),
                byte_offset,
                stored_size: bytes.len() as u64,
                filters,
            },
        );
    }
}

impl RangeReader for MemoryChunkStore {
    fn read_bytes(&self, offset: u64, length: u64) -> Result<Vec<u8>, StorageError> {
        let arena = self.arena.read();
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.checked_add(usize::try_from(length).unwrap_or(usize::MAX));
        match end {
            Some(end) if end <= arena.len() => Ok(arena[start..end].to_vec()),
            _ => Err(StorageError::ShortRead {
                offset,
                requested: length,
                got: (arena.len() as u64).saturating_sub(offset),
            }),
        }
    }
}

impl ChunkLayout for MemoryChunkStore {
    fn resolve(
        &self,
        chunk_indices: &[u64],
    ) -> Result<Option<ChunkDescriptor>, StorageLayoutError> {
        Ok(self.table.read().get(chunk_indices).cloned())
    }
}
