use derive_more::From;
use num::{NumCast, ToPrimitive};
use thiserror::Error;

use super::DataKind;

/// A type-kind mismatch on a typed accessor.
///
/// A caller error, reported immediately: silent lossy conversions of
/// scientific data are unacceptable, so there is no best-effort coercion.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("forbidden conversion from {0} to {1}")]
pub struct ForbiddenConversionError(&'static str, &'static str);

impl ForbiddenConversionError {
    pub(crate) const fn new(from: &'static str, to: &'static str) -> Self {
        Self(from, to)
    }
}

/// A single element value of any [`DataKind`].
#[derive(Clone, Debug, PartialEq, From)]
pub enum Value {
    /// A boolean value.
    Bool(bool),
    /// A signed 8-bit integer value.
    Byte(i8),
    /// An unsigned 8-bit character value.
    Char(u8),
    /// A signed 16-bit integer value.
    Short(i16),
    /// A signed 32-bit integer value.
    Int(i32),
    /// A signed 64-bit integer value.
    Long(i64),
    /// A 32-bit floating point value.
    Float(f32),
    /// A 64-bit floating point value.
    Double(f64),
    /// An opaque byte payload.
    Opaque(Vec<u8>),
}

impl Value {
    /// Return the kind of the value.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Bool(_) => DataKind::Bool,
            Self::Byte(_) => DataKind::Byte,
            Self::Char(_) => DataKind::Char,
            Self::Short(_) => DataKind::Short,
            Self::Int(_) => DataKind::Int,
            Self::Long(_) => DataKind::Long,
            Self::Float(_) => DataKind::Float,
            Self::Double(_) => DataKind::Double,
            Self::Opaque(_) => DataKind::Opaque,
        }
    }

    /// Convert a numeric value to the numeric type `T`.
    ///
    /// # Errors
    /// Returns [`ForbiddenConversionError`] if the value is of a non-numeric
    /// kind (`Bool`, `Char`, `Opaque`) or the conversion is not representable
    /// in `T`.
    pub fn cast<T: NumCast>(&self) -> Result<T, ForbiddenConversionError> {
        match self {
            Self::Byte(v) => T::from(*v),
            Self::Short(v) => T::from(*v),
            Self::Int(v) => T::from(*v),
            Self::Long(v) => T::from(*v),
            Self::Float(v) => T::from(*v),
            Self::Double(v) => T::from(*v),
            Self::Bool(_) | Self::Char(_) | Self::Opaque(_) => None,
        }
        .ok_or(ForbiddenConversionError(
            self.kind().name(),
            std::any::type_name::<T>(),
        ))
    }

    /// Convert the numeric `value` into a value of numeric kind `kind`.
    ///
    /// # Errors
    /// Returns [`ForbiddenConversionError`] if `kind` is non-numeric or the
    /// conversion is not representable.
    pub fn from_num<T: ToPrimitive>(
        kind: DataKind,
        value: T,
    ) -> Result<Self, ForbiddenConversionError> {
        match kind {
            DataKind::Byte => value.to_i8().map(Self::Byte),
            DataKind::Short => value.to_i16().map(Self::Short),
            DataKind::Int => value.to_i32().map(Self::Int),
            DataKind::Long => value.to_i64().map(Self::Long),
            DataKind::Float => value.to_f32().map(Self::Float),
            DataKind::Double => value.to_f64().map(Self::Double),
            DataKind::Bool | DataKind::Char | DataKind::Opaque => None,
        }
        .ok_or(ForbiddenConversionError(
            std::any::type_name::<T>(),
            kind.name(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_cast_widening() {
        assert_eq!(Value::Short(-7).cast::<f64>().unwrap(), -7.0);
        assert_eq!(Value::Byte(5).cast::<i64>().unwrap(), 5);
        assert_eq!(Value::Float(1.5).cast::<f64>().unwrap(), 1.5);
    }

    #[test]
    fn value_cast_narrowing() {
        assert_eq!(Value::Long(300).cast::<i16>().unwrap(), 300);
        // Unrepresentable narrowing is refused, never truncated.
        assert!(Value::Long(70000).cast::<i16>().is_err());
        assert!(Value::Double(f64::NAN).cast::<i32>().is_err());
    }

    #[test]
    fn value_cast_forbidden_kinds() {
        assert!(Value::Bool(true).cast::<f64>().is_err());
        assert!(Value::Bool(true).cast::<i32>().is_err());
        assert!(Value::Char(b'x').cast::<f32>().is_err());
        assert!(Value::Opaque(vec![1, 2]).cast::<i64>().is_err());
    }

    #[test]
    fn value_from_num() {
        assert_eq!(Value::from_num(DataKind::Int, 41i64).unwrap(), Value::Int(41));
        assert_eq!(
            Value::from_num(DataKind::Double, 2.5f32).unwrap(),
            Value::Double(2.5)
        );
        assert!(Value::from_num(DataKind::Byte, 1000i32).is_err());
        assert!(Value::from_num(DataKind::Bool, 1i32).is_err());
    }
}
