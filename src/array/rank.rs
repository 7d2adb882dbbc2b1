//! Rank-specialised array wrappers with fixed-arity accessors.

use super::{ArrayAccessError, TypedArray, Value};
use crate::index::InvalidIndexError;

macro_rules! rank_wrapper {
    ($(#[doc = $doc:literal])* $name:ident, $rank:literal, [$($coord:ident),*]) => {
        $(#[doc = $doc])*
        ///
        /// Built with [`TryFrom`] from a [`TypedArray`] of matching rank.
        /// Derefs to the wrapped array for everything beyond the fixed-arity
        /// accessors.
        #[derive(Clone, Debug)]
        pub struct $name(TypedArray);

        impl TryFrom<TypedArray> for $name {
            type Error = InvalidIndexError;

            fn try_from(array: TypedArray) -> Result<Self, Self::Error> {
                if array.rank() == $rank {
                    Ok(Self(array))
                } else {
                    Err(InvalidIndexError::IncompatibleRank(array.rank(), $rank))
                }
            }
        }

        impl std::ops::Deref for $name {
            type Target = TypedArray;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl $name {
            /// Unwrap into the underlying array.
            #[must_use]
            pub fn into_inner(self) -> TypedArray {
                self.0
            }

            /// Read the element at the given coordinate.
            ///
            /// # Errors
            /// Returns [`InvalidIndexError`] if the coordinate is out of
            /// bounds.
            pub fn get(&self, $($coord: u64),*) -> Result<Value, InvalidIndexError> {
                self.0.get(&[$($coord),*])
            }

            /// Write the element at the given coordinate.
            ///
            /// # Errors
            /// Returns [`ArrayAccessError`] if the coordinate is out of
            /// bounds or the value kind does not match the array kind.
            pub fn set(&mut self, $($coord: u64,)* value: &Value) -> Result<(), ArrayAccessError> {
                self.0.set(&[$($coord),*], value)
            }
        }
    };
}

rank_wrapper!(
    /// A rank-0 array: a single element.
    Scalar, 0, []
);
rank_wrapper!(
    /// A rank-1 array.
    Rank1, 1, [i]
);
rank_wrapper!(
    /// A rank-2 array, outermost dimension first.
    Rank2, 2, [i, j]
);
rank_wrapper!(
    /// A rank-3 array, outermost dimension first.
    Rank3, 3, [i, j, k]
);
