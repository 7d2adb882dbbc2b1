use derive_more::Display;
use num::integer::gcd;

use super::InvalidRangeError;

/// A strided sub-interval of one dimension's index set.
///
/// A range selects the indices `{first, first + stride, ...}` up to and
/// including `last`. Bounds are inclusive and `stride >= 1`; a range is never
/// empty. The greatest index actually selected is
/// [`last_element`](Range::last_element), which may be less than `last` when
/// `last` is not on the stride.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display("{first}:{last}:{stride}")]
pub struct Range {
    first: u64,
    last: u64,
    stride: u64,
}

impl Range {
    /// Create a new range selecting `{first, first + stride, ..., <= last}`.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] if `stride` is zero or `first > last`.
    pub fn new(first: u64, last: u64, stride: u64) -> Result<Self, InvalidRangeError> {
        if stride == 0 {
            return Err(InvalidRangeError::ZeroStride);
        }
        if first > last {
            return Err(InvalidRangeError::ReversedBounds(first, last));
        }
        Ok(Self {
            first,
            last,
            stride,
        })
    }

    /// Create a contiguous range selecting `{first, first + 1, ..., last}`.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] if `first > last`.
    pub fn contiguous(first: u64, last: u64) -> Result<Self, InvalidRangeError> {
        Self::new(first, last, 1)
    }

    /// Create a range selecting the single index `index`.
    #[must_use]
    pub const fn index(index: u64) -> Self {
        Self {
            first: index,
            last: index,
            stride: 1,
        }
    }

    /// Return the first index of the range.
    #[must_use]
    pub const fn first(&self) -> u64 {
        self.first
    }

    /// Return the last bound of the range (inclusive, not necessarily selected).
    #[must_use]
    pub const fn last(&self) -> u64 {
        self.last
    }

    /// Return the stride of the range.
    #[must_use]
    pub const fn stride(&self) -> u64 {
        self.stride
    }

    /// Return the number of indices selected by the range. Always at least one.
    #[must_use]
    pub const fn num_elements(&self) -> u64 {
        (self.last - self.first) / self.stride + 1
    }

    /// Return the `i`-th selected index, or [`None`] if `i` is out of bounds.
    #[must_use]
    pub fn element(&self, i: u64) -> Option<u64> {
        (i < self.num_elements()).then(|| self.first + i * self.stride)
    }

    /// Return the greatest index selected by the range.
    #[must_use]
    pub const fn last_element(&self) -> u64 {
        self.first + (self.num_elements() - 1) * self.stride
    }

    /// Returns true if `index` is selected by the range.
    #[must_use]
    pub const fn contains(&self, index: u64) -> bool {
        index >= self.first && index <= self.last && (index - self.first) % self.stride == 0
    }

    /// Return the position of `index` within the range, or [`None`] if it is
    /// not selected.
    #[must_use]
    pub const fn position(&self, index: u64) -> Option<u64> {
        if self.contains(index) {
            Some((index - self.first) / self.stride)
        } else {
            None
        }
    }

    /// Shift the range to be relative to `origin`.
    ///
    /// Used to translate an intersection in array coordinates into a chunk's
    /// own coordinate space.
    ///
    /// # Panics
    /// Panics if `origin > first`.
    #[must_use]
    pub fn shift_origin(&self, origin: u64) -> Self {
        assert!(origin <= self.first);
        Self {
            first: self.first - origin,
            last: self.last_element() - origin,
            stride: self.stride,
        }
    }

    /// Intersect the index sets of two ranges.
    ///
    /// The intersection of two arithmetic progressions is itself an arithmetic
    /// progression with a stride of `lcm(self.stride, other.stride)`, or empty.
    /// An empty intersection is a valid outcome, returned as [`None`].
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lo = self.first.max(other.first);
        let hi = self.last_element().min(other.last_element());
        if lo > hi {
            return None;
        }
        if self.stride == 1 && other.stride == 1 {
            return Some(Self {
                first: lo,
                last: hi,
                stride: 1,
            });
        }

        let g = gcd(self.stride, other.stride);
        if self.first.abs_diff(other.first) % g != 0 {
            // The progressions never share a phase.
            return None;
        }
        let stride = self.stride / g * other.stride;

        // Solve first + stride_a * k == other.first (mod stride_b) for the
        // smallest common element, then align it into [lo, hi].
        let (a, b) = (i128::from(self.first), i128::from(other.first));
        let (sa, sb) = (i128::from(self.stride), i128::from(other.stride));
        let (gi, x, _) = egcd(sa, sb);
        let modulus = sb / gi;
        let k = ((b - a) / gi % modulus * (x % modulus) % modulus + modulus) % modulus;
        let common = a + sa * k;

        let step = i128::from(stride);
        let lo = i128::from(lo);
        let first = if common >= lo {
            common - (common - lo) / step * step
        } else {
            common + (lo - common + step - 1) / step * step
        };
        if first > i128::from(hi) {
            return None;
        }
        let first = u64::try_from(first).ok()?;
        Some(Self {
            first,
            last: first + (hi - first) / stride * stride,
            stride,
        })
    }
}

/// Extended Euclidean algorithm: returns `(g, x, y)` with `a*x + b*y == g`.
fn egcd(a: i128, b: i128) -> (i128, i128, i128) {
    if b == 0 {
        (a, 1, 0)
    } else {
        let (g, x, y) = egcd(b, a % b);
        (g, y, x - (a / b) * y)
    }
}
