//! Sectioned reads over a chunked dataset.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use thiserror::Error;

use super::indexer::{ChunkIndexer, ChunkTransfer};
use crate::array::{Buffer, DataKind, TypedArray, Value};
use crate::index::Index;
use crate::section::{InvalidRangeError, Section};
use crate::storage::{
    ChunkLayout, FilterError, FilterPipeline, NullPipeline, RangeReader, StorageError,
    StorageLayoutError,
};

/// An invalid dataset definition.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DatasetCreateError {
    /// The chunk shape rank does not match the array rank.
    #[error("chunk rank {0} does not match array rank {1}")]
    IncompatibleRank(usize, usize),
    /// A chunk dimension has zero length.
    #[error("chunk dimension {0} has zero length")]
    ZeroChunkLength(usize),
    /// The element kind has no fixed size, so chunk payloads cannot be laid
    /// out as flat element bytes.
    #[error("element kind {0} has no fixed size and cannot be chunked")]
    UnsizedKind(DataKind),
    /// The fill value kind does not match the element kind.
    #[error("fill value kind {0} does not match element kind {1}")]
    FillValueKind(DataKind, DataKind),
}

/// A failure servicing a sectioned read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The request section is invalid against the dataset shape.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),
    /// The chunk layout lookup failed, or a chunk required by
    /// [`MissingChunkPolicy::Error`] is absent.
    #[error(transparent)]
    Layout(#[from] StorageLayoutError),
    /// Fetching a chunk's byte range failed.
    #[error("reading chunk {chunk_indices:?} failed")]
    Storage {
        /// The chunk being fetched.
        chunk_indices: Vec<u64>,
        /// The underlying storage failure.
        #[source]
        source: StorageError,
    },
    /// Decoding a chunk's filtered payload failed.
    #[error("decoding chunk {chunk_indices:?} failed")]
    Filter {
        /// The chunk being decoded.
        chunk_indices: Vec<u64>,
        /// The underlying filter failure.
        #[source]
        source: FilterError,
    },
    /// A decoded chunk payload disagrees with the chunk extent. Corrupt
    /// layouts are surfaced, never skipped.
    #[error("chunk {chunk_indices:?} decoded to {got} bytes, expected {expected}")]
    UnexpectedChunkSize {
        /// The offending chunk.
        chunk_indices: Vec<u64>,
        /// The byte count the chunk extent requires.
        expected: u64,
        /// The byte count actually decoded.
        got: u64,
    },
    /// The caller-owned destination has the wrong element kind.
    #[error("destination kind {0} does not match dataset kind {1}")]
    DestinationKind(DataKind, DataKind),
    /// The caller-owned destination has the wrong shape.
    #[error("destination shape {0:?} does not match request shape {1:?}")]
    DestinationShape(Vec<u64>, Vec<u64>),
}

/// What a read does when a requested chunk was never written.
///
/// Declared per dataset, the way the on-disk format declares it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MissingChunkPolicy {
    /// Treat the chunk as a virtual chunk of fill values. Never an error.
    #[default]
    FillValue,
    /// Fail the read with [`StorageLayoutError::MissingChunk`].
    Error,
}

/// Per-read options.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOptions<'a> {
    cancel: Option<&'a AtomicBool>,
}

impl<'a> ReadOptions<'a> {
    /// Create default options: no cancellation.
    #[must_use]
    pub const fn new() -> Self {
        Self { cancel: None }
    }

    /// Attach a cooperative cancellation flag, checked once per chunk
    /// boundary.
    #[must_use]
    pub const fn cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// The outcome of a cancellable read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadStatus {
    /// Every requested element was written.
    Complete,
    /// The read stopped at a chunk boundary: the destination holds every
    /// chunk completed before the cancellation flag was observed, and no
    /// partial chunk.
    Cancelled,
}

/// A chunked dataset bound to its storage collaborators.
///
/// Holds the dataset geometry (shape, chunk shape, element kind), the
/// declared fill value and missing-chunk policy, a store providing
/// [`RangeReader`] + [`ChunkLayout`], and a [`FilterPipeline`] for compressed
/// chunks. Reads are blocking and synchronous; each builds a private
/// [`ChunkIndexer`] session, so distinct reads may run concurrently as long
/// as the layout is immutable or externally synchronised.
pub struct ChunkedDataset<TStore: ?Sized> {
    shape: Vec<u64>,
    chunk_shape: Vec<u64>,
    kind: DataKind,
    fill_value: Value,
    missing_chunk_policy: MissingChunkPolicy,
    filters: Arc<dyn FilterPipeline>,
    store: Arc<TStore>,
}

impl<TStore: ?Sized> ChunkedDataset<TStore> {
    /// Define a dataset over `store`.
    ///
    /// # Errors
    /// Returns [`DatasetCreateError`] if the chunk shape rank does not match
    /// the array rank, a chunk dimension is zero, the fill value kind is not
    /// the element kind, or the element kind has no fixed size.
    pub fn new(
        store: Arc<TStore>,
        shape: Vec<u64>,
        chunk_shape: Vec<u64>,
        fill_value: Value,
    ) -> Result<Self, DatasetCreateError> {
        if chunk_shape.len() != shape.len() {
            return Err(DatasetCreateError::IncompatibleRank(
                chunk_shape.len(),
                shape.len(),
            ));
        }
        if let Some(dim) = chunk_shape.iter().position(|&len| len == 0) {
            return Err(DatasetCreateError::ZeroChunkLength(dim));
        }
        let kind = fill_value.kind();
        if kind.size_of().is_none() {
            return Err(DatasetCreateError::UnsizedKind(kind));
        }
        Ok(Self {
            shape,
            chunk_shape,
            kind,
            fill_value,
            missing_chunk_policy: MissingChunkPolicy::default(),
            filters: Arc::new(NullPipeline),
            store,
        })
    }

    /// Set the missing-chunk policy.
    #[must_use]
    pub fn with_missing_chunk_policy(mut self, policy: MissingChunkPolicy) -> Self {
        self.missing_chunk_policy = policy;
        self
    }

    /// Set the filter pipeline for compressed chunks.
    #[must_use]
    pub fn with_filter_pipeline(mut self, filters: Arc<dyn FilterPipeline>) -> Self {
        self.filters = filters;
        self
    }

    /// Return the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Return the element kind.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    /// Return the declared fill value.
    #[must_use]
    pub const fn fill_value(&self) -> &Value {
        &self.fill_value
    }
}

impl<TStore: RangeReader + ChunkLayout + ?Sized> ChunkedDataset<TStore> {
    /// Read `section` into a newly allocated array.
    ///
    /// The destination starts filled with the fill value; every chunk the
    /// section intersects is resolved, fetched, decoded when compressed, and
    /// scattered into place.
    ///
    /// # Errors
    /// Returns [`ReadError`] if the section is invalid or a chunk cannot be
    /// resolved, fetched or decoded.
    pub fn read(&self, section: &Section) -> Result<TypedArray, ReadError> {
        let mut dest = TypedArray::full(&self.fill_value, &section.shape());
        self.read_into(section, &mut dest, &ReadOptions::new())?;
        Ok(dest)
    }

    /// Read `section` into a caller-owned destination of matching kind and
    /// shape.
    ///
    /// When `options` carries a cancellation flag and it is observed set at a
    /// chunk boundary, the read stops with [`ReadStatus::Cancelled`]: the
    /// destination then holds every chunk completed so far and no torn chunk.
    ///
    /// # Errors
    /// Returns [`ReadError`] if the section is invalid, the destination does
    /// not match it, or a chunk cannot be resolved, fetched or decoded.
    pub fn read_into(
        &self,
        section: &Section,
        dest: &mut TypedArray,
        options: &ReadOptions<'_>,
    ) -> Result<ReadStatus, ReadError> {
        if dest.kind() != self.kind {
            return Err(ReadError::DestinationKind(dest.kind(), self.kind));
        }
        if dest.shape() != section.shape() {
            return Err(ReadError::DestinationShape(
                dest.shape().to_vec(),
                section.shape(),
            ));
        }
        let mut indexer = ChunkIndexer::new(section.clone(), &self.shape, &self.chunk_shape)?;
        let chunk_index = Index::from_shape(&self.chunk_shape);
        while indexer.has_next() {
            if options.is_cancelled() {
                return Ok(ReadStatus::Cancelled);
            }
            let Ok(transfer) = indexer.next() else {
                break;
            };
            match self.fetch_chunk(&transfer.chunk_indices)? {
                Some(chunk) => self.scatter(dest, &transfer, &chunk, &chunk_index)?,
                None => self.fill_region(dest, &transfer)?,
            }
        }
        Ok(ReadStatus::Complete)
    }

    /// Read `section` with one rayon task per intersecting chunk.
    ///
    /// Each task fetches, decodes and scatters one chunk; destination regions
    /// are disjoint by construction, so the tasks never overlap. The result
    /// equals [`read`](ChunkedDataset::read) element for element.
    ///
    /// # Errors
    /// Returns [`ReadError`] as [`read`](ChunkedDataset::read) does.
    pub fn par_read(&self, section: &Section) -> Result<TypedArray, ReadError> {
        let dest = TypedArray::full(&self.fill_value, &section.shape());
        let mut indexer = ChunkIndexer::new(section.clone(), &self.shape, &self.chunk_shape)?;
        let mut transfers = Vec::new();
        while indexer.has_next() {
            let Ok(transfer) = indexer.next() else {
                break;
            };
            transfers.push(transfer);
        }
        let chunk_index = Index::from_shape(&self.chunk_shape);
        transfers
            .into_par_iter()
            .try_for_each(|transfer| match self.fetch_chunk(&transfer.chunk_indices)? {
                Some(chunk) => self.scatter(&dest, &transfer, &chunk, &chunk_index),
                None => self.fill_region(&dest, &transfer),
            })?;
        Ok(dest)
    }

    /// Resolve, fetch and decode one chunk, or [`None`] for a virtual
    /// fill-value chunk.
    fn fetch_chunk(&self, chunk_indices: &[u64]) -> Result<Option<Buffer>, ReadError> {
        let Some(descriptor) = self.store.resolve(chunk_indices)? else {
            return match self.missing_chunk_policy {
                MissingChunkPolicy::FillValue => Ok(None),
                MissingChunkPolicy::Error => {
                    Err(StorageLayoutError::MissingChunk(chunk_indices.to_vec()).into())
                }
            };
        };
        let bytes = self
            .store
            .read_bytes(descriptor.byte_offset, descriptor.stored_size)
            .map_err(|source| ReadError::Storage {
                chunk_indices: chunk_indices.to_vec(),
                source,
            })?;
        let bytes = if descriptor.is_compressed() {
            self.filters
                .decode(bytes, &descriptor.filters)
                .map_err(|source| ReadError::Filter {
                    chunk_indices: chunk_indices.to_vec(),
                    source,
                })?
        } else {
            bytes
        };
        // Chunks are stored full-extent, ragged edge chunks included.
        let expected = self.chunk_shape.iter().product::<u64>()
            * self.kind.size_of().unwrap_or_default() as u64;
        if bytes.len() as u64 != expected {
            return Err(ReadError::UnexpectedChunkSize {
                chunk_indices: chunk_indices.to_vec(),
                expected,
                got: bytes.len() as u64,
            });
        }
        Buffer::from_raw(self.kind, &bytes).ok_or(ReadError::UnexpectedChunkSize {
            chunk_indices: chunk_indices.to_vec(),
            expected,
            got: bytes.len() as u64,
        })
        .map(Some)
    }

    /// Scatter the selected elements of a decoded chunk into the destination
    /// region of `transfer`, coalescing contiguous runs.
    fn scatter(
        &self,
        dest: &TypedArray,
        transfer: &ChunkTransfer,
        chunk: &Buffer,
        chunk_index: &Index,
    ) -> Result<(), ReadError> {
        let src = chunk_index.section(&transfer.chunk_local)?;
        let dst = dest.index().section(&transfer.destination)?;
        let run = src.contiguous_run_len().min(dst.contiguous_run_len());
        let buffer = unsafe { dest.store().get_mut() };
        for ((dst_offset, _), (src_offset, _)) in std::iter::zip(
            dst.contiguous_runs_of(run),
            src.contiguous_runs_of(run),
        ) {
            buffer.copy_run(
                usize::try_from(dst_offset).unwrap_or(usize::MAX),
                chunk,
                usize::try_from(src_offset).unwrap_or(usize::MAX),
                usize::try_from(run).unwrap_or(usize::MAX),
            );
        }
        Ok(())
    }

    /// Write fill values over the destination region of a virtual chunk.
    fn fill_region(&self, dest: &TypedArray, transfer: &ChunkTransfer) -> Result<(), ReadError> {
        let dst = dest.index().section(&transfer.destination)?;
        let buffer = unsafe { dest.store().get_mut() };
        for offset in dst.offsets() {
            buffer.set(
                usize::try_from(offset).unwrap_or(usize::MAX),
                &self.fill_value,
            );
        }
        Ok(())
    }
}
