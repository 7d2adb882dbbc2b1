/// The closed set of element kinds a [`TypedArray`](crate::array::TypedArray)
/// can hold.
///
/// Numeric kinds participate in checked widening/narrowing conversions;
/// `Bool`, `Char` and `Opaque` never convert to or from numeric values.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum DataKind {
    /// Boolean elements.
    Bool,
    /// Signed 8-bit integer elements.
    Byte,
    /// Unsigned 8-bit character elements.
    Char,
    /// Signed 16-bit integer elements.
    Short,
    /// Signed 32-bit integer elements.
    Int,
    /// Signed 64-bit integer elements.
    Long,
    /// 32-bit floating point elements.
    Float,
    /// 64-bit floating point elements.
    Double,
    /// Opaque variable-length byte payloads (structured or string data).
    Opaque,
}

impl DataKind {
    /// Return the kind name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Opaque => "opaque",
        }
    }

    /// Return the fixed element size in bytes, or [`None`] for [`Opaque`](DataKind::Opaque).
    #[must_use]
    pub const fn size_of(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Byte | Self::Char => Some(1),
            Self::Short => Some(2),
            Self::Int | Self::Float => Some(4),
            Self::Long | Self::Double => Some(8),
            Self::Opaque => None,
        }
    }

    /// Returns true if the kind participates in numeric conversions.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Short | Self::Int | Self::Long | Self::Float | Self::Double
        )
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_kind_sizes() {
        assert_eq!(DataKind::Bool.size_of(), Some(1));
        assert_eq!(DataKind::Short.size_of(), Some(2));
        assert_eq!(DataKind::Double.size_of(), Some(8));
        assert_eq!(DataKind::Opaque.size_of(), None);
    }

    #[test]
    fn data_kind_numeric() {
        assert!(DataKind::Byte.is_numeric());
        assert!(DataKind::Double.is_numeric());
        assert!(!DataKind::Bool.is_numeric());
        assert!(!DataKind::Char.is_numeric());
        assert!(!DataKind::Opaque.is_numeric());
    }
}
