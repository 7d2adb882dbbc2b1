//! Per-request mapping of a strided section onto the chunk grid.

use thiserror::Error;

use crate::section::{InvalidRangeError, Range, Section};

/// A call to [`ChunkIndexer::next`] after the traversal finished.
///
/// A protocol error on the caller's side: a session services exactly one
/// request and is never rewound.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("chunk traversal already exhausted after {0} chunks")]
pub struct IteratorExhaustedError(
    /// The number of chunks the finished traversal visited.
    pub u64,
);

/// The work order for one chunk of a sectioned read: where the chunk sits,
/// which of its elements the request selects, and where they land.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkTransfer {
    /// The chunk-grid coordinates.
    pub chunk_indices: Vec<u64>,
    /// The selected elements in array coordinates.
    pub intersection: Section,
    /// The same elements in the chunk's own coordinate space.
    pub chunk_local: Section,
    /// The same elements in request-local coordinates. Unit stride: the
    /// selected elements are consecutive positions of the request.
    pub destination: Section,
}

/// A single-request traversal of the chunks intersecting a section.
///
/// Construction validates the request and computes, per dimension, the
/// chunk-grid coordinates whose extent meets that dimension's [`Range`] by
/// division arithmetic alone; a stride larger than the chunk length skips
/// the chunks it jumps over. Traversal visits the Cartesian product of the
/// per-dimension coordinate sets in row-major order (outer dimension
/// slowest), each chunk exactly once.
#[derive(Debug)]
pub struct ChunkIndexer {
    section: Section,
    chunk_shape: Vec<u64>,
    array_shape: Vec<u64>,
    /// Qualifying chunk coordinates per dimension, sorted ascending.
    dim_coords: Vec<Vec<u64>>,
    pos: u64,
    num_chunks: u64,
}

impl ChunkIndexer {
    /// Start a traversal of the chunks of an `array_shape` array with
    /// `chunk_shape` chunks that intersect `section`.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] if the section is invalid against the
    /// array shape, or the chunk shape has the wrong rank or a zero length.
    pub fn new(
        section: Section,
        array_shape: &[u64],
        chunk_shape: &[u64],
    ) -> Result<Self, InvalidRangeError> {
        section.validate(array_shape)?;
        if chunk_shape.len() != array_shape.len() {
            return Err(InvalidRangeError::IncompatibleRank(
                chunk_shape.len(),
                array_shape.len(),
            ));
        }
        if let Some(dim) = chunk_shape.iter().position(|&len| len == 0) {
            return Err(InvalidRangeError::ZeroLength(dim));
        }
        let dim_coords: Vec<Vec<u64>> = std::iter::zip(section.ranges(), chunk_shape)
            .map(|(range, &len)| dim_chunk_coords(range, len))
            .collect();
        let num_chunks = dim_coords.iter().map(|coords| coords.len() as u64).product();
        Ok(Self {
            section,
            chunk_shape: chunk_shape.to_vec(),
            array_shape: array_shape.to_vec(),
            dim_coords,
            pos: 0,
            num_chunks,
        })
    }

    /// Return the number of chunks the traversal will visit.
    #[must_use]
    pub const fn num_chunks(&self) -> u64 {
        self.num_chunks
    }

    /// Return the total number of elements the request selects. The
    /// per-transfer element counts of a full traversal sum to exactly this.
    #[must_use]
    pub fn total_elements(&self) -> u64 {
        self.section.compute_size()
    }

    /// Returns true if the traversal has chunks left to visit.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.pos < self.num_chunks
    }

    /// Produce the transfer for the next chunk in row-major order.
    ///
    /// # Errors
    /// Returns [`IteratorExhaustedError`] if the traversal already finished.
    pub fn next(&mut self) -> Result<ChunkTransfer, IteratorExhaustedError> {
        while self.has_next() {
            let chunk_indices = self.chunk_indices_at(self.pos);
            self.pos += 1;
            if let Some(transfer) = self.transfer_for(chunk_indices) {
                return Ok(transfer);
            }
        }
        Err(IteratorExhaustedError(self.num_chunks))
    }

    /// Decode the row-major traversal position into per-dimension chunk
    /// coordinates.
    fn chunk_indices_at(&self, mut pos: u64) -> Vec<u64> {
        let mut indices = vec![0; self.dim_coords.len()];
        for (slot, coords) in std::iter::zip(&mut indices, &self.dim_coords).rev() {
            let len = coords.len() as u64;
            *slot = coords[usize::try_from(pos % len).unwrap_or(usize::MAX)];
            pos /= len;
        }
        indices
    }

    fn transfer_for(&self, chunk_indices: Vec<u64>) -> Option<ChunkTransfer> {
        let mut intersection = Vec::with_capacity(chunk_indices.len());
        let mut chunk_local = Vec::with_capacity(chunk_indices.len());
        let mut destination = Vec::with_capacity(chunk_indices.len());
        for (((&chunk, range), &chunk_len), &dim_len) in chunk_indices
            .iter()
            .zip(self.section.ranges())
            .zip(&self.chunk_shape)
            .zip(&self.array_shape)
        {
            let origin = chunk * chunk_len;
            let window = Range::contiguous(origin, (origin + chunk_len - 1).min(dim_len - 1)).ok()?;
            let isect = range.intersect(&window)?;
            let first_pos = range.position(isect.first())?;
            destination
                .push(Range::contiguous(first_pos, first_pos + isect.num_elements() - 1).ok()?);
            chunk_local.push(isect.shift_origin(origin));
            intersection.push(isect);
        }
        Some(ChunkTransfer {
            chunk_indices,
            intersection: Section::new(intersection),
            chunk_local: Section::new(chunk_local),
            destination: Section::new(destination),
        })
    }
}

/// The sorted chunk coordinates along one dimension whose extent holds at
/// least one index selected by `range`.
fn dim_chunk_coords(range: &Range, chunk_len: u64) -> Vec<u64> {
    if range.stride() <= chunk_len {
        // Adjacent selected indices are at most a chunk length apart, so
        // every chunk between the first and last selected index qualifies.
        (range.first() / chunk_len..=range.last_element() / chunk_len).collect()
    } else {
        // Strides beyond the chunk length put each selected index in its own
        // chunk, skipping the chunks the stride jumps over.
        (0..range.num_elements())
            .map(|i| (range.first() + i * range.stride()) / chunk_len)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_coords_contiguous() {
        let range = Range::contiguous(3, 9).unwrap();
        assert_eq!(dim_chunk_coords(&range, 4), vec![0, 1, 2]);
    }

    #[test]
    fn dim_coords_wide_stride_skips_chunks() {
        // Indices 0, 4, 8 with chunks of length 2: chunks 1 and 3 are never
        // touched.
        let range = Range::new(0, 8, 4).unwrap();
        assert_eq!(dim_chunk_coords(&range, 2), vec![0, 2, 4]);
    }

    #[test]
    fn indexer_splits_on_chunk_boundaries() {
        // Elements 3..=9 of a length-12 dimension with chunks of length 4.
        let section = Section::new(vec![Range::contiguous(3, 9).unwrap()]);
        let mut indexer = ChunkIndexer::new(section, &[12], &[4]).unwrap();
        assert_eq!(indexer.num_chunks(), 3);
        assert_eq!(indexer.total_elements(), 7);

        let t0 = indexer.next().unwrap();
        assert_eq!(t0.chunk_indices, vec![0]);
        assert_eq!(t0.intersection.ranges()[0], Range::contiguous(3, 3).unwrap());
        assert_eq!(t0.chunk_local.ranges()[0], Range::contiguous(3, 3).unwrap());
        assert_eq!(t0.destination.ranges()[0], Range::contiguous(0, 0).unwrap());

        let t1 = indexer.next().unwrap();
        assert_eq!(t1.chunk_indices, vec![1]);
        assert_eq!(t1.intersection.ranges()[0], Range::contiguous(4, 7).unwrap());
        assert_eq!(t1.chunk_local.ranges()[0], Range::contiguous(0, 3).unwrap());
        assert_eq!(t1.destination.ranges()[0], Range::contiguous(1, 4).unwrap());

        let t2 = indexer.next().unwrap();
        assert_eq!(t2.chunk_indices, vec![2]);
        assert_eq!(t2.intersection.ranges()[0], Range::contiguous(8, 9).unwrap());
        assert_eq!(t2.chunk_local.ranges()[0], Range::contiguous(0, 1).unwrap());
        assert_eq!(t2.destination.ranges()[0], Range::contiguous(5, 6).unwrap());

        // The per-chunk counts cover the request exactly.
        let total = t0.intersection.compute_size()
            + t1.intersection.compute_size()
            + t2.intersection.compute_size();
        assert_eq!(total, indexer.total_elements());

        assert!(!indexer.has_next());
        assert_eq!(indexer.next(), Err(IteratorExhaustedError(3)));
    }

    #[test]
    fn indexer_strided_request() {
        // Indices 2, 4, 6 of a length-10 dimension, chunks of length 4:
        // chunk 0 holds {2}, chunk 1 holds {4, 6}.
        let section = Section::new(vec![Range::new(2, 7, 2).unwrap()]);
        let mut indexer = ChunkIndexer::new(section, &[10], &[4]).unwrap();
        assert_eq!(indexer.num_chunks(), 2);
        assert_eq!(indexer.total_elements(), 3);

        let t0 = indexer.next().unwrap();
        assert_eq!(t0.intersection.ranges()[0], Range::new(2, 2, 2).unwrap());
        assert_eq!(t0.destination.ranges()[0], Range::contiguous(0, 0).unwrap());

        let t1 = indexer.next().unwrap();
        assert_eq!(t1.intersection.ranges()[0], Range::new(4, 6, 2).unwrap());
        assert_eq!(t1.chunk_local.ranges()[0], Range::new(0, 2, 2).unwrap());
        assert_eq!(t1.destination.ranges()[0], Range::contiguous(1, 2).unwrap());
    }

    #[test]
    fn indexer_row_major_order() {
        let section = Section::with_origin_shape(&[1, 1], &[4, 4]).unwrap();
        let mut indexer = ChunkIndexer::new(section, &[6, 6], &[4, 4]).unwrap();
        let mut visited = Vec::new();
        while indexer.has_next() {
            visited.push(indexer.next().unwrap().chunk_indices);
        }
        assert_eq!(
            visited,
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
    }

    #[test]
    fn indexer_partial_edge_chunk() {
        // A 10-element dimension with chunks of length 4: the last chunk is
        // ragged and its window is clipped to the array bounds.
        let section = Section::new(vec![Range::contiguous(8, 9).unwrap()]);
        let mut indexer = ChunkIndexer::new(section, &[10], &[4]).unwrap();
        let t = indexer.next().unwrap();
        assert_eq!(t.chunk_indices, vec![2]);
        assert_eq!(t.intersection.ranges()[0], Range::contiguous(8, 9).unwrap());
        assert_eq!(t.chunk_local.ranges()[0], Range::contiguous(0, 1).unwrap());
    }

    #[test]
    fn indexer_validates_inputs() {
        let section = Section::new(vec![Range::contiguous(0, 9).unwrap()]);
        assert!(ChunkIndexer::new(section.clone(), &[8], &[4]).is_err());
        assert!(ChunkIndexer::new(section.clone(), &[10], &[4, 4]).is_err());
        assert!(matches!(
            ChunkIndexer::new(section, &[10], &[0]),
            Err(InvalidRangeError::ZeroLength(0))
        ));
    }

    #[test]
    fn indexer_wide_stride_two_dims() {
        // Stride 5 over chunks of length 2 in both dimensions.
        let section = Section::new(vec![
            Range::new(0, 5, 5).unwrap(),
            Range::new(1, 6, 5).unwrap(),
        ]);
        let mut indexer = ChunkIndexer::new(section, &[8, 8], &[2, 2]).unwrap();
        assert_eq!(indexer.num_chunks(), 4);
        let mut visited = Vec::new();
        let mut elements = 0;
        while indexer.has_next() {
            let t = indexer.next().unwrap();
            elements += t.intersection.compute_size();
            visited.push(t.chunk_indices);
        }
        assert_eq!(
            visited,
            vec![vec![0, 0], vec![0, 3], vec![2, 0], vec![2, 3]]
        );
        assert_eq!(elements, 4);
    }
}
