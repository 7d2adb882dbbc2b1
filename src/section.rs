//! Strided rectangular sub-array selection.
//!
//! A [`Section`] describes a rectangular sub-region of an N-dimensional array
//! as one [`Range`] per dimension. Sections are pure value types: they
//! describe and validate selections without touching storage. Applying a
//! section to storage is the job of [`Index::section`](crate::index::Index::section)
//! and [`TypedArray::view`](crate::array::TypedArray::view).

mod range;

pub use range::Range;

use itertools::Itertools;
use thiserror::Error;

use crate::index::InvalidIndexError;

/// A malformed or out-of-bounds range or section.
///
/// Always a caller error: reported immediately, never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidRangeError {
    /// The range stride is zero.
    #[error("range stride must be at least 1")]
    ZeroStride,
    /// The range bounds are reversed.
    #[error("range first {0} exceeds last {1}")]
    ReversedBounds(u64, u64),
    /// The range exceeds the length of the dimension it applies to.
    #[error("range {0} exceeds dimension {1} of length {2}")]
    OutOfBounds(Range, usize, u64),
    /// The number of ranges does not match the array rank.
    #[error("section rank {0} does not match array rank {1}")]
    IncompatibleRank(usize, usize),
    /// A dimension has zero length and cannot be selected from.
    #[error("dimension {0} has zero length")]
    ZeroLength(usize),
}

/// A rectangular sub-region of an N-dimensional array: one [`Range`] per
/// dimension, outermost dimension first.
///
/// A section's rank must equal the rank of the array it applies to, and each
/// range must lie within `[0, dim_len)` of the corresponding dimension; this
/// is checked by [`validate`](Section::validate) wherever a section meets a
/// concrete shape.
///
/// Fixing a single index and reducing rank is an explicit operation
/// ([`TypedArray::slice`](crate::array::TypedArray::slice)); it is never
/// inferred from a size-1 range.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Section {
    ranges: Vec<Range>,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.ranges.iter().format(", "))
    }
}

impl From<Vec<Range>> for Section {
    fn from(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }
}

impl Section {
    /// Create a new section from one range per dimension.
    #[must_use]
    pub fn new(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    /// Create a section selecting the whole of an array with `shape`.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError::ZeroLength`] if any dimension has zero
    /// length.
    pub fn from_shape(shape: &[u64]) -> Result<Self, InvalidRangeError> {
        shape
            .iter()
            .enumerate()
            .map(|(dim, &len)| {
                if len == 0 {
                    Err(InvalidRangeError::ZeroLength(dim))
                } else {
                    Range::contiguous(0, len - 1)
                }
            })
            .collect::<Result<Vec<Range>, _>>()
            .map(Self::new)
    }

    /// Create a contiguous section from an origin and a shape.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] if the lengths of `origin` and `shape`
    /// differ or any component of `shape` is zero.
    pub fn with_origin_shape(origin: &[u64], shape: &[u64]) -> Result<Self, InvalidRangeError> {
        if origin.len() != shape.len() {
            return Err(InvalidRangeError::IncompatibleRank(
                origin.len(),
                shape.len(),
            ));
        }
        std::iter::zip(origin, shape)
            .enumerate()
            .map(|(dim, (&first, &len))| {
                if len == 0 {
                    Err(InvalidRangeError::ZeroLength(dim))
                } else {
                    Range::contiguous(first, first + len - 1)
                }
            })
            .collect::<Result<Vec<Range>, _>>()
            .map(Self::new)
    }

    /// Return the per-dimension ranges of the section.
    #[must_use]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Return the rank of the section.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    /// Return the shape of the selection: the per-dimension element counts.
    #[must_use]
    pub fn shape(&self) -> Vec<u64> {
        self.ranges.iter().map(Range::num_elements).collect()
    }

    /// Return the total number of elements selected by the section.
    ///
    /// Equal to the product of each range's element count.
    #[must_use]
    pub fn compute_size(&self) -> u64 {
        self.ranges.iter().map(Range::num_elements).product()
    }

    /// Validate the section against an array shape.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] if the rank does not match `array_shape`
    /// or any range's bounds lie outside `[0, dim_len)`.
    pub fn validate(&self, array_shape: &[u64]) -> Result<(), InvalidRangeError> {
        if self.rank() != array_shape.len() {
            return Err(InvalidRangeError::IncompatibleRank(
                self.rank(),
                array_shape.len(),
            ));
        }
        for (dim, (range, &len)) in std::iter::zip(&self.ranges, array_shape).enumerate() {
            if range.last() >= len {
                return Err(InvalidRangeError::OutOfBounds(*range, dim, len));
            }
        }
        Ok(())
    }

    /// Intersect the index sets of two sections, dimension by dimension.
    ///
    /// An empty intersection in any dimension yields [`None`]: a valid
    /// outcome, distinct from an invalid section.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError::IncompatibleRank`] if the ranks differ.
    pub fn intersect(&self, other: &Self) -> Result<Option<Self>, InvalidRangeError> {
        if self.rank() != other.rank() {
            return Err(InvalidRangeError::IncompatibleRank(
                other.rank(),
                self.rank(),
            ));
        }
        let ranges: Option<Vec<Range>> = std::iter::zip(&self.ranges, &other.ranges)
            .map(|(a, b)| a.intersect(b))
            .collect();
        Ok(ranges.map(Self::new))
    }

    /// Translate a section-local coordinate into the coordinate space of the
    /// array the section applies to.
    ///
    /// # Errors
    /// Returns [`InvalidIndexError`] if the coordinate rank does not match or
    /// any component is out of bounds of the selection shape.
    pub fn translate(&self, local: &[u64]) -> Result<Vec<u64>, InvalidIndexError> {
        if local.len() != self.rank() {
            return Err(InvalidIndexError::IncompatibleRank(local.len(), self.rank()));
        }
        std::iter::zip(local, &self.ranges)
            .enumerate()
            .map(|(dim, (&i, range))| {
                range
                    .element(i)
                    .ok_or(InvalidIndexError::OutOfBounds {
                        dim,
                        index: i,
                        len: range.num_elements(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_from_shape() {
        let section = Section::from_shape(&[4, 6]).unwrap();
        assert_eq!(section.rank(), 2);
        assert_eq!(section.shape(), vec![4, 6]);
        assert_eq!(section.compute_size(), 24);
        assert!(matches!(
            Section::from_shape(&[4, 0]),
            Err(InvalidRangeError::ZeroLength(1))
        ));
    }

    #[test]
    fn section_with_origin_shape() {
        let section = Section::with_origin_shape(&[2, 3], &[2, 2]).unwrap();
        assert_eq!(section.ranges()[0], Range::contiguous(2, 3).unwrap());
        assert_eq!(section.ranges()[1], Range::contiguous(3, 4).unwrap());
        assert!(Section::with_origin_shape(&[2], &[2, 2]).is_err());
    }

    #[test]
    fn section_compute_size_strided() {
        // Indices 2, 4, 6 of a length-10 dimension.
        let section = Section::new(vec![Range::new(2, 7, 2).unwrap()]);
        assert_eq!(section.compute_size(), 3);
        assert!(section.validate(&[10]).is_ok());
    }

    #[test]
    fn section_validate() {
        let section = Section::new(vec![Range::contiguous(0, 9).unwrap()]);
        assert!(section.validate(&[10]).is_ok());
        assert!(matches!(
            section.validate(&[9]),
            Err(InvalidRangeError::OutOfBounds(_, 0, 9))
        ));
        assert!(matches!(
            section.validate(&[10, 10]),
            Err(InvalidRangeError::IncompatibleRank(1, 2))
        ));
    }

    #[test]
    fn section_intersect() {
        let a = Section::new(vec![
            Range::contiguous(0, 5).unwrap(),
            Range::new(0, 8, 2).unwrap(),
        ]);
        let b = Section::with_origin_shape(&[3, 3], &[6, 6]).unwrap();
        let isect = a.intersect(&b).unwrap().unwrap();
        assert_eq!(isect.ranges()[0], Range::contiguous(3, 5).unwrap());
        assert_eq!(isect.ranges()[1], Range::new(4, 8, 2).unwrap());

        // Disjoint in the first dimension.
        let c = Section::with_origin_shape(&[6, 0], &[2, 9]).unwrap();
        assert_eq!(a.intersect(&c).unwrap(), None);

        assert!(a
            .intersect(&Section::from_shape(&[4]).unwrap())
            .is_err());
    }

    #[test]
    fn section_translate() {
        let section = Section::new(vec![
            Range::new(2, 7, 2).unwrap(),
            Range::contiguous(1, 3).unwrap(),
        ]);
        assert_eq!(section.translate(&[0, 0]).unwrap(), vec![2, 1]);
        assert_eq!(section.translate(&[2, 2]).unwrap(), vec![6, 3]);
        assert!(section.translate(&[3, 0]).is_err());
        assert!(section.translate(&[0]).is_err());
    }

    #[test]
    fn section_display() {
        let section = Section::new(vec![
            Range::new(2, 7, 2).unwrap(),
            Range::contiguous(1, 3).unwrap(),
        ]);
        assert_eq!(section.to_string(), "(2:7:2, 1:3:1)");
    }
}
