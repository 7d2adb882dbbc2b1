//! Typed N-dimensional arrays over flat backing storage.
//!
//! A [`TypedArray`] couples a [`DataKind`]-homogeneous backing buffer with an
//! [`Index`] describing its shape and addressing. Views ([`TypedArray::view`],
//! [`TypedArray::slice`]) share the backing buffer zero-copy: a view is the
//! same storage seen through a restricted index, and writes through a view are
//! visible through every other handle onto that storage.
//!
//! Handles sharing a store are not internally synchronised. Mutating through
//! one handle while reading or mutating through another on a different thread
//! is a data race; callers serialise such access externally.

mod buffer;
mod data_kind;
mod rank;
mod value;

pub use buffer::{Buffer, Element};
pub use data_kind::DataKind;
pub use rank::{Rank1, Rank2, Rank3, Scalar};
pub use value::{ForbiddenConversionError, Value};

use std::cell::UnsafeCell;
use std::iter::FusedIterator;
use std::sync::Arc;

use thiserror::Error;

use crate::index::{Index, InvalidIndexError, Offsets};
use crate::section::{InvalidRangeError, Section};

/// An element count that does not match the shape it must fill.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{count} elements do not fill shape {shape:?} of size {size}")]
pub struct ShapeMismatchError {
    /// The number of elements supplied.
    pub count: u64,
    /// The target shape.
    pub shape: Vec<u64>,
    /// The number of elements the shape requires.
    pub size: u64,
}

/// An error accessing the elements of a [`TypedArray`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ArrayAccessError {
    /// An invalid coordinate or position.
    #[error(transparent)]
    InvalidIndex(#[from] InvalidIndexError),
    /// An invalid range or section.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),
    /// A type-kind mismatch.
    #[error(transparent)]
    ForbiddenConversion(#[from] ForbiddenConversionError),
    /// An element count / shape mismatch.
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatchError),
}

/// Shared backing storage of a [`TypedArray`] and its views.
///
/// Interior mutability lets disjoint regions be written through shared
/// references, which the chunked read path relies on to scatter decoded
/// chunks in parallel. Every access goes through [`get`](ArrayStore::get) /
/// [`get_mut`](ArrayStore::get_mut), whose safety contracts push the
/// no-concurrent-overlap obligation to the caller.
pub(crate) struct ArrayStore(UnsafeCell<Buffer>);

unsafe impl Send for ArrayStore {}
unsafe impl Sync for ArrayStore {}

impl ArrayStore {
    pub(crate) const fn new(buffer: Buffer) -> Self {
        Self(UnsafeCell::new(buffer))
    }

    /// Borrow the buffer.
    ///
    /// # Safety
    /// The buffer must not be mutated for the lifetime of the returned
    /// reference.
    pub(crate) unsafe fn get(&self) -> &Buffer {
        &*self.0.get()
    }

    /// Mutably borrow the buffer.
    ///
    /// # Safety
    /// No element touched through the returned reference may be accessed
    /// through any other reference for its lifetime.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self) -> &mut Buffer {
        &mut *self.0.get()
    }
}

/// An N-dimensional array of elements of one [`DataKind`].
///
/// Cloning is shallow: the clone is another handle onto the same backing
/// storage, as are views built with [`view`](TypedArray::view) and
/// [`slice`](TypedArray::slice). See the module docs for the sharing
/// contract.
#[derive(Clone)]
pub struct TypedArray {
    store: Arc<ArrayStore>,
    index: Index,
    kind: DataKind,
}

impl std::fmt::Debug for TypedArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedArray")
            .field("kind", &self.kind)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl TypedArray {
    /// Create a zero-initialised array of `kind` with `shape`.
    #[must_use]
    pub fn zeros(kind: DataKind, shape: &[u64]) -> Self {
        let index = Index::from_shape(shape);
        let len = usize::try_from(index.size()).unwrap_or(usize::MAX);
        Self {
            store: Arc::new(ArrayStore::new(Buffer::zeros(kind, len))),
            index,
            kind,
        }
    }

    /// Create an array with `shape` filled with copies of `value`.
    #[must_use]
    pub fn full(value: &Value, shape: &[u64]) -> Self {
        let index = Index::from_shape(shape);
        let len = usize::try_from(index.size()).unwrap_or(usize::MAX);
        Self {
            store: Arc::new(ArrayStore::new(Buffer::filled(value, len))),
            index,
            kind: value.kind(),
        }
    }

    /// Create an array with `shape` from a flat vector of elements in natural
    /// (row-major) order.
    ///
    /// # Errors
    /// Returns [`ShapeMismatchError`] if `elements.len()` does not equal the
    /// product of `shape`.
    pub fn from_vec<T: Element>(elements: Vec<T>, shape: &[u64]) -> Result<Self, ShapeMismatchError> {
        let index = Index::from_shape(shape);
        if elements.len() as u64 != index.size() {
            return Err(ShapeMismatchError {
                count: elements.len() as u64,
                shape: shape.to_vec(),
                size: index.size(),
            });
        }
        Ok(Self {
            store: Arc::new(ArrayStore::new(T::buffer_from_vec(elements))),
            index,
            kind: T::KIND,
        })
    }

    /// Return the element kind.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    /// Return the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.index.shape()
    }

    /// Return the rank. Zero denotes a scalar.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.index.rank()
    }

    /// Return the number of elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.index.size()
    }

    /// Return the addressing index.
    #[must_use]
    pub const fn index(&self) -> &Index {
        &self.index
    }

    /// Returns true if natural-order iteration walks the backing buffer
    /// gaplessly.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.index.is_contiguous()
    }

    pub(crate) fn store(&self) -> &Arc<ArrayStore> {
        &self.store
    }

    fn buffer(&self) -> &Buffer {
        // Sound under the module-level sharing contract: callers do not
        // mutate the store while a read borrow is live.
        unsafe { self.store.get() }
    }

    fn offset_of(&self, coord: &[u64]) -> Result<usize, InvalidIndexError> {
        let offset = self.index.element_offset(coord)?;
        Ok(usize::try_from(offset).unwrap_or(usize::MAX))
    }

    /// Read the element of a rank-0 array.
    ///
    /// # Errors
    /// Returns [`InvalidIndexError::IncompatibleRank`] if the array is not a
    /// scalar.
    pub fn get_scalar(&self) -> Result<Value, InvalidIndexError> {
        self.get(&[])
    }

    /// Write the element of a rank-0 array.
    ///
    /// # Errors
    /// Returns [`ArrayAccessError`] if the array is not a scalar or the value
    /// kind does not match the array kind.
    pub fn set_scalar(&mut self, value: &Value) -> Result<(), ArrayAccessError> {
        self.set(&[], value)
    }

    /// Read the element at `coord`.
    ///
    /// # Errors
    /// Returns [`InvalidIndexError`] if `coord` has the wrong rank or is out
    /// of bounds.
    pub fn get(&self, coord: &[u64]) -> Result<Value, InvalidIndexError> {
        let offset = self.offset_of(coord)?;
        Ok(self.buffer().get(offset))
    }

    /// Write the element at `coord`.
    ///
    /// # Errors
    /// Returns [`ArrayAccessError`] if `coord` is invalid or the value kind
    /// does not match the array kind.
    pub fn set(&mut self, coord: &[u64], value: &Value) -> Result<(), ArrayAccessError> {
        if value.kind() != self.kind {
            return Err(ForbiddenConversionError::new(
                value.kind().name(),
                self.kind.name(),
            )
            .into());
        }
        let offset = self.offset_of(coord)?;
        unsafe { self.store.get_mut() }.set(offset, value);
        Ok(())
    }

    /// Read the element at `coord` converted to the numeric type `T`.
    ///
    /// # Errors
    /// Returns [`ArrayAccessError`] if `coord` is invalid, the array kind is
    /// non-numeric, or the element is not representable in `T`.
    pub fn get_num<T: num::NumCast>(&self, coord: &[u64]) -> Result<T, ArrayAccessError> {
        let offset = self.offset_of(coord)?;
        Ok(self.buffer().get(offset).cast()?)
    }

    /// Write the numeric `value` at `coord`, converted to the array kind.
    ///
    /// # Errors
    /// Returns [`ArrayAccessError`] if `coord` is invalid, the array kind is
    /// non-numeric, or `value` is not representable in it.
    pub fn set_num<T: num::ToPrimitive>(
        &mut self,
        coord: &[u64],
        value: T,
    ) -> Result<(), ArrayAccessError> {
        let converted = Value::from_num(self.kind, value)?;
        let offset = self.offset_of(coord)?;
        unsafe { self.store.get_mut() }.set(offset, &converted);
        Ok(())
    }

    /// Build a zero-copy view selecting `section` of this array.
    ///
    /// The view shares the backing storage; writes through it are visible
    /// through this handle. Views compose: a view of a view is a flat view of
    /// the original storage.
    ///
    /// # Errors
    /// Returns [`InvalidRangeError`] if `section` is invalid against the
    /// array shape.
    pub fn view(&self, section: &Section) -> Result<Self, InvalidRangeError> {
        Ok(Self {
            store: Arc::clone(&self.store),
            index: self.index.section(section)?,
            kind: self.kind,
        })
    }

    /// Build the rank-reduced zero-copy view fixing dimension `dim` at
    /// `coord`.
    ///
    /// # Errors
    /// Returns [`InvalidIndexError`] if `dim` or `coord` is out of bounds.
    pub fn slice(&self, dim: usize, coord: u64) -> Result<Self, InvalidIndexError> {
        Ok(Self {
            store: Arc::clone(&self.store),
            index: self.index.slice(dim, coord)?,
            kind: self.kind,
        })
    }

    /// Overwrite every element with copies of `value`.
    ///
    /// # Errors
    /// Returns [`ForbiddenConversionError`] if the value kind does not match
    /// the array kind.
    pub fn fill(&mut self, value: &Value) -> Result<(), ForbiddenConversionError> {
        if value.kind() != self.kind {
            return Err(ForbiddenConversionError::new(
                value.kind().name(),
                self.kind.name(),
            ));
        }
        let buffer = unsafe { self.store.get_mut() };
        for offset in self.index.offsets() {
            buffer.set(usize::try_from(offset).unwrap_or(usize::MAX), value);
        }
        Ok(())
    }

    /// Overwrite the array with `elements` in natural order.
    ///
    /// # Errors
    /// Returns [`ArrayAccessError`] if `T` does not match the array kind or
    /// the element count does not match the array size.
    pub fn copy_from_slice<T: Element>(&mut self, elements: &[T]) -> Result<(), ArrayAccessError> {
        if T::KIND != self.kind {
            return Err(ForbiddenConversionError::new(
                T::KIND.name(),
                self.kind.name(),
            )
            .into());
        }
        if elements.len() as u64 != self.num_elements() {
            return Err(ShapeMismatchError {
                count: elements.len() as u64,
                shape: self.shape().to_vec(),
                size: self.num_elements(),
            }
            .into());
        }
        let buffer = unsafe { self.store.get_mut() };
        let slice = T::buffer_slice_mut(buffer).ok_or(ForbiddenConversionError::new(
            T::KIND.name(),
            self.kind.name(),
        ))?;
        for (offset, element) in self.index.offsets().zip(elements) {
            slice[usize::try_from(offset).unwrap_or(usize::MAX)].clone_from(element);
        }
        Ok(())
    }

    /// Copy the elements out into a flat vector in natural order.
    ///
    /// # Errors
    /// Returns [`ForbiddenConversionError`] if `T` does not match the array
    /// kind.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, ForbiddenConversionError> {
        let slice = T::buffer_slice(self.buffer()).ok_or(ForbiddenConversionError::new(
            self.kind.name(),
            std::any::type_name::<T>(),
        ))?;
        Ok(self
            .index
            .offsets()
            .map(|offset| slice[usize::try_from(offset).unwrap_or(usize::MAX)].clone())
            .collect())
    }

    /// Returns an iterator over the elements in natural order (last dimension
    /// fastest).
    #[must_use]
    pub fn iter(&self) -> Elements<'_> {
        Elements {
            buffer: self.buffer(),
            offsets: self.index.offsets(),
        }
    }
}

/// Iterator over the elements of a [`TypedArray`] in natural order.
///
/// See [`TypedArray::iter`].
pub struct Elements<'a> {
    buffer: &'a Buffer,
    offsets: Offsets<'a>,
}

impl Iterator for Elements<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offsets.next()?;
        Some(self.buffer.get(usize::try_from(offset).unwrap_or(usize::MAX)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.offsets.size_hint()
    }
}

impl DoubleEndedIterator for Elements<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let offset = self.offsets.next_back()?;
        Some(self.buffer.get(usize::try_from(offset).unwrap_or(usize::MAX)))
    }
}

impl ExactSizeIterator for Elements<'_> {}

impl FusedIterator for Elements<'_> {}
