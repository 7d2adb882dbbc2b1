//! Shape/stride/offset addressing of flat storage.
//!
//! An [`Index`] maps N-dimensional coordinates (or linear positions in natural
//! iteration order) to offsets into a flat backing buffer. Row-major strides
//! are derived from the shape; the last dimension varies fastest. A *view*
//! index carries its own strides and offset so that element access walks the
//! original backing buffer without copying, and a view of a view remains a
//! flat offset/stride transform rather than a nested wrapper.

use std::iter::FusedIterator;

use thiserror::Error;

use crate::section::{InvalidRangeError, Section};

/// A coordinate with the wrong arity or an out-of-bounds component.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidIndexError {
    /// The coordinate rank does not match the array rank.
    #[error("coordinate rank {0} does not match array rank {1}")]
    IncompatibleRank(usize, usize),
    /// A coordinate component is out of bounds.
    #[error("index {index} out of bounds for dimension {dim} of length {len}")]
    OutOfBounds {
        /// The offending dimension.
        dim: usize,
        /// The out-of-bounds index.
        index: u64,
        /// The length of the dimension.
        len: u64,
    },
    /// A linear position is out of bounds.
    #[error("position {0} out of bounds for {1} elements")]
    PositionOutOfBounds(u64, u64),
    /// A dimension number is out of bounds of the rank.
    #[error("dimension {0} out of bounds for rank {1}")]
    DimensionOutOfBounds(usize, usize),
}

/// Maps N-dimensional coordinates to flat storage offsets.
///
/// Owns a shape, a stride vector consistent with it, and a base offset.
/// Strides are recomputed wholesale whenever a restricted index is built
/// ([`section`](Index::section), [`slice`](Index::slice)); they are never
/// mutated independently of the shape.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Index {
    shape: Vec<u64>,
    strides: Vec<u64>,
    offset: u64,
}

impl Index {
    /// Create a row-major index over `shape` with a zero base offset.
    #[must_use]
    pub fn from_shape(shape: &[u64]) -> Self {
        let mut strides = vec![1; shape.len()];
        for d in (0..shape.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * shape[d + 1];
        }
        Self {
            shape: shape.to_vec(),
            strides,
            offset: 0,
        }
    }

    /// Return the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the stride vector.
    #[must_use]
    pub fn strides(&self) -> &[u64] {
        &self.strides
    }

    /// Return the base offset.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Return the rank. Zero denotes a scalar.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Return the number of addressable elements: the product of the shape.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Return the minimum backing buffer length able to hold every element
    /// this index can address.
    #[must_use]
    pub fn addressable_extent(&self) -> u64 {
        if self.size() == 0 {
            return 0;
        }
        self.offset
            + std::iter::zip(&self.shape, &self.strides)
                .map(|(&len, &stride)| (len - 1) * stride)
                .sum::<u64>()
            + 1
    }

    /// Returns true if natural-order iteration visits strictly increasing,
    /// gapless offsets.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.contiguous_run_len() == self.size().max(1)
    }

    /// Compute the flat storage offset of a coordinate.
    ///
    /// # Errors
    /// Returns [`InvalidIndexError`] if the coordinate rank does not equal the
    /// index rank or any component is out of bounds.
    pub fn element_offset(&self, coord: &[u64]) -> Result<u64, InvalidIndexError> {
        if coord.len() != self.rank() {
            return Err(InvalidIndexError::IncompatibleRank(coord.len(), self.rank()));
        }
        let mut offset = self.offset;
        for (dim, (&index, (&len, &stride))) in coord
            .iter()
            .zip(std::iter::zip(&self.shape, &self.strides))
            .enumerate()
        {
            if index >= len {
                return Err(InvalidIndexError::OutOfBounds { dim, index, len });
            }
            offset += index * stride;
        }
        Ok(offset)
    }

    /// Compute the flat storage offset of the `pos`-th element in natural
    /// iteration order (last dimension fastest).
    ///
    /// # Errors
    /// Returns [`InvalidIndexError::PositionOutOfBounds`] if `pos >= size()`.
    pub fn linear_offset(&self, pos: u64) -> Result<u64, InvalidIndexError> {
        if pos >= self.size() {
            return Err(InvalidIndexError::PositionOutOfBounds(pos, self.size()));
        }
        Ok(self.linear_offset_unchecked(pos))
    }

    fn linear_offset_unchecked(&self, mut pos: u64) -> u64 {
        debug_assert!(pos < self.size().max(1));
        let mut offset = self.offset;
        for d in (0..self.rank()).rev() {
            offset += pos % self.shape[d] * self.strides[d];
            pos /= self.shape[d];
        }
        offset
    }

    /// Build the restricted index selecting `section` of this index.
    ///
    /// The result addresses the *same* backing storage: its offset and strides
    /// compose the section onto this index, so chained views stay flat.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] if the section is invalid against this
    /// index's shape.
    pub fn section(&self, section: &Section) -> Result<Self, InvalidRangeError> {
        section.validate(&self.shape)?;
        let mut offset = self.offset;
        let mut strides = Vec::with_capacity(self.rank());
        for (range, &stride) in std::iter::zip(section.ranges(), &self.strides) {
            offset += range.first() * stride;
            strides.push(range.stride() * stride);
        }
        Ok(Self {
            shape: section.shape(),
            strides,
            offset,
        })
    }

    /// Build the rank-reduced index fixing dimension `dim` at `index`.
    ///
    /// # Errors
    /// Returns [`InvalidIndexError`] if `dim` is out of bounds of the rank or
    /// `index` is out of bounds of the dimension.
    pub fn slice(&self, dim: usize, index: u64) -> Result<Self, InvalidIndexError> {
        if dim >= self.rank() {
            return Err(InvalidIndexError::DimensionOutOfBounds(dim, self.rank()));
        }
        if index >= self.shape[dim] {
            return Err(InvalidIndexError::OutOfBounds {
                dim,
                index,
                len: self.shape[dim],
            });
        }
        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        let offset = self.offset + index * strides[dim];
        shape.remove(dim);
        strides.remove(dim);
        Ok(Self {
            shape,
            strides,
            offset,
        })
    }

    /// Returns an iterator over the flat offsets of every element in natural
    /// iteration order. Restartable: each call yields a fresh iterator with no
    /// side effects.
    #[must_use]
    pub fn offsets(&self) -> Offsets<'_> {
        Offsets {
            index: self,
            front: 0,
            back: self.size(),
        }
    }

    /// Return the length of the innermost contiguous run: the number of
    /// elements visited per gapless stretch of backing storage in natural
    /// iteration order. At least 1 for non-empty indexes.
    #[must_use]
    pub fn contiguous_run_len(&self) -> u64 {
        let mut run = 1;
        for d in (0..self.rank()).rev() {
            if self.strides[d] == run {
                run *= self.shape[d];
            } else {
                break;
            }
        }
        run
    }

    /// Returns an iterator over `(offset, run_len)` pairs coalescing innermost
    /// contiguous elements, covering every element exactly once in natural
    /// order.
    #[must_use]
    pub fn contiguous_runs(&self) -> ContiguousRuns<'_> {
        self.contiguous_runs_of(self.contiguous_run_len())
    }

    /// Returns the run iterator with a caller-chosen run length, used to step
    /// two indexes of equal shape in lock-step with a common run.
    ///
    /// `run` must divide [`contiguous_run_len`](Index::contiguous_run_len).
    #[must_use]
    pub fn contiguous_runs_of(&self, run: u64) -> ContiguousRuns<'_> {
        debug_assert!(run >= 1 && self.contiguous_run_len() % run == 0);
        let count = if self.size() == 0 { 0 } else { self.size() / run };
        ContiguousRuns {
            index: self,
            run,
            pos: 0,
            count,
        }
    }
}

/// Iterator over the flat offsets of an [`Index`] in natural order.
///
/// See [`Index::offsets`].
pub struct Offsets<'a> {
    index: &'a Index,
    front: u64,
    back: u64,
}

impl Iterator for Offsets<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front < self.back {
            let offset = self.index.linear_offset_unchecked(self.front);
            self.front += 1;
            Some(offset)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = usize::try_from(self.back - self.front).unwrap_or(usize::MAX);
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Offsets<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back > self.front {
            self.back -= 1;
            Some(self.index.linear_offset_unchecked(self.back))
        } else {
            None
        }
    }
}

impl ExactSizeIterator for Offsets<'_> {}

impl FusedIterator for Offsets<'_> {}

/// Iterator over `(offset, run_len)` pairs of contiguous elements.
///
/// See [`Index::contiguous_runs`].
pub struct ContiguousRuns<'a> {
    index: &'a Index,
    run: u64,
    pos: u64,
    count: u64,
}

impl ContiguousRuns<'_> {
    /// Return the run length common to every item.
    #[must_use]
    pub const fn run_len(&self) -> u64 {
        self.run
    }
}

impl Iterator for ContiguousRuns<'_> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos < self.count {
            let offset = self.index.linear_offset_unchecked(self.pos * self.run);
            self.pos += 1;
            Some((offset, self.run))
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = usize::try_from(self.count - self.pos).unwrap_or(usize::MAX);
        (len, Some(len))
    }
}

impl ExactSizeIterator for ContiguousRuns<'_> {}

impl FusedIterator for ContiguousRuns<'_> {}

#[cfg(test)]
mod tests {
    use crate::section::Range;

    use super::*;

    #[test]
    fn index_strides() {
        let index = Index::from_shape(&[2, 3, 4]);
        assert_eq!(index.strides(), &[12, 4, 1]);
        assert_eq!(index.size(), 24);
        assert_eq!(index.addressable_extent(), 24);
        assert!(index.is_contiguous());
    }

    #[test]
    fn index_scalar() {
        let index = Index::from_shape(&[]);
        assert_eq!(index.rank(), 0);
        assert_eq!(index.size(), 1);
        assert_eq!(index.element_offset(&[]).unwrap(), 0);
        assert_eq!(index.offsets().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn index_element_offset() {
        let index = Index::from_shape(&[4, 4]);
        assert_eq!(index.element_offset(&[1, 2]).unwrap(), 6);
        assert!(matches!(
            index.element_offset(&[1]),
            Err(InvalidIndexError::IncompatibleRank(1, 2))
        ));
        assert!(matches!(
            index.element_offset(&[1, 4]),
            Err(InvalidIndexError::OutOfBounds { dim: 1, index: 4, len: 4 })
        ));
    }

    #[test]
    fn index_linear_offset() {
        let index = Index::from_shape(&[2, 3]);
        let offsets: Vec<u64> = (0..6).map(|p| index.linear_offset(p).unwrap()).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4, 5]);
        assert!(index.linear_offset(6).is_err());
    }

    #[test]
    fn index_section_view() {
        //  0  1  2  3
        //  4  5  6  7
        //  8  9 10 11
        // 12 13 14 15
        let index = Index::from_shape(&[4, 4]);
        let section = Section::new(vec![
            Range::new(1, 3, 2).unwrap(),
            Range::contiguous(1, 2).unwrap(),
        ]);
        let view = index.section(&section).unwrap();
        assert_eq!(view.shape(), &[2, 2]);
        assert_eq!(view.offsets().collect::<Vec<_>>(), vec![5, 6, 13, 14]);
        assert!(!view.is_contiguous());

        // A view of a view composes to a flat index over the original storage.
        let inner = view
            .section(&Section::new(vec![
                Range::index(1),
                Range::contiguous(0, 1).unwrap(),
            ]))
            .unwrap();
        assert_eq!(inner.offsets().collect::<Vec<_>>(), vec![13, 14]);
    }

    #[test]
    fn index_slice() {
        let index = Index::from_shape(&[4, 4]);
        let row = index.slice(0, 2).unwrap();
        assert_eq!(row.shape(), &[4]);
        assert_eq!(row.offsets().collect::<Vec<_>>(), vec![8, 9, 10, 11]);
        let column = index.slice(1, 3).unwrap();
        assert_eq!(column.offsets().collect::<Vec<_>>(), vec![3, 7, 11, 15]);
        assert!(index.slice(2, 0).is_err());
        assert!(index.slice(0, 4).is_err());
    }

    #[test]
    fn index_offsets_back() {
        let index = Index::from_shape(&[2, 2]);
        let mut offsets = index.offsets();
        assert_eq!(offsets.size_hint(), (4, Some(4)));
        assert_eq!(offsets.next(), Some(0));
        assert_eq!(offsets.next_back(), Some(3));
        assert_eq!(offsets.next(), Some(1));
        assert_eq!(offsets.next(), Some(2));
        assert_eq!(offsets.next(), None);
    }

    #[test]
    fn index_contiguous_runs() {
        let index = Index::from_shape(&[4, 4]);
        let section = Section::with_origin_shape(&[1, 1], &[2, 2]).unwrap();
        let view = index.section(&section).unwrap();
        assert_eq!(view.contiguous_run_len(), 2);
        assert_eq!(
            view.contiguous_runs().collect::<Vec<_>>(),
            vec![(5, 2), (9, 2)]
        );

        let whole = index.contiguous_runs().collect::<Vec<_>>();
        assert_eq!(whole, vec![(0, 16)]);
    }

    #[test]
    fn index_addressable_extent_view() {
        let index = Index::from_shape(&[4, 4]);
        let view = index
            .section(&Section::with_origin_shape(&[2, 2], &[2, 2]).unwrap())
            .unwrap();
        // Offsets 10, 11, 14, 15: the view reaches to the end of the parent.
        assert_eq!(view.addressable_extent(), 16);
        assert_eq!(view.size(), 4);
    }
}
