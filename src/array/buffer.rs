use super::{DataKind, Value};

mod private {
    /// Seals [`Element`](super::Element) to the closed set of kinds.
    pub trait Sealed {}
    impl Sealed for bool {}
    impl Sealed for i8 {}
    impl Sealed for u8 {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for Vec<u8> {}
}

/// A Rust type usable as the element type of a
/// [`TypedArray`](crate::array::TypedArray).
///
/// Implemented for exactly the closed set of [`DataKind`]s; it cannot be
/// implemented outside this crate.
pub trait Element: private::Sealed + Clone + Send + Sync + 'static {
    /// The kind of this element type.
    const KIND: DataKind;

    /// Wrap a flat vector of elements into a backing buffer.
    fn buffer_from_vec(vec: Vec<Self>) -> Buffer;

    /// Borrow the backing buffer as a flat slice, or [`None`] on a kind
    /// mismatch.
    fn buffer_slice(buffer: &Buffer) -> Option<&[Self]>;

    /// Borrow the backing buffer as a mutable flat slice, or [`None`] on a
    /// kind mismatch.
    fn buffer_slice_mut(buffer: &mut Buffer) -> Option<&mut [Self]>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const KIND: DataKind = DataKind::$variant;

            fn buffer_from_vec(vec: Vec<Self>) -> Buffer {
                Buffer::$variant(vec)
            }

            fn buffer_slice(buffer: &Buffer) -> Option<&[Self]> {
                match buffer {
                    Buffer::$variant(vec) => Some(vec),
                    _ => None,
                }
            }

            fn buffer_slice_mut(buffer: &mut Buffer) -> Option<&mut [Self]> {
                match buffer {
                    Buffer::$variant(vec) => Some(vec),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(bool, Bool);
impl_element!(i8, Byte);
impl_element!(u8, Char);
impl_element!(i16, Short);
impl_element!(i32, Int);
impl_element!(i64, Long);
impl_element!(f32, Float);
impl_element!(f64, Double);
impl_element!(Vec<u8>, Opaque);

/// Flat homogeneously-typed backing storage: one variant per [`DataKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    /// Boolean elements.
    Bool(Vec<bool>),
    /// Signed 8-bit integer elements.
    Byte(Vec<i8>),
    /// Unsigned 8-bit character elements.
    Char(Vec<u8>),
    /// Signed 16-bit integer elements.
    Short(Vec<i16>),
    /// Signed 32-bit integer elements.
    Int(Vec<i32>),
    /// Signed 64-bit integer elements.
    Long(Vec<i64>),
    /// 32-bit floating point elements.
    Float(Vec<f32>),
    /// 64-bit floating point elements.
    Double(Vec<f64>),
    /// Opaque variable-length byte payloads.
    Opaque(Vec<Vec<u8>>),
}

macro_rules! for_each_variant {
    ($self:expr, $vec:ident => $body:expr) => {
        match $self {
            Buffer::Bool($vec) => $body,
            Buffer::Byte($vec) => $body,
            Buffer::Char($vec) => $body,
            Buffer::Short($vec) => $body,
            Buffer::Int($vec) => $body,
            Buffer::Long($vec) => $body,
            Buffer::Float($vec) => $body,
            Buffer::Double($vec) => $body,
            Buffer::Opaque($vec) => $body,
        }
    };
}

impl Buffer {
    /// Allocate a zero-initialised buffer of `len` elements of `kind`.
    #[must_use]
    pub fn zeros(kind: DataKind, len: usize) -> Self {
        match kind {
            DataKind::Bool => Self::Bool(vec![false; len]),
            DataKind::Byte => Self::Byte(vec![0; len]),
            DataKind::Char => Self::Char(vec![0; len]),
            DataKind::Short => Self::Short(vec![0; len]),
            DataKind::Int => Self::Int(vec![0; len]),
            DataKind::Long => Self::Long(vec![0; len]),
            DataKind::Float => Self::Float(vec![0.0; len]),
            DataKind::Double => Self::Double(vec![0.0; len]),
            DataKind::Opaque => Self::Opaque(vec![Vec::new(); len]),
        }
    }

    /// Allocate a buffer of `len` copies of `value`.
    #[must_use]
    pub fn filled(value: &Value, len: usize) -> Self {
        match value {
            Value::Bool(v) => Self::Bool(vec![*v; len]),
            Value::Byte(v) => Self::Byte(vec![*v; len]),
            Value::Char(v) => Self::Char(vec![*v; len]),
            Value::Short(v) => Self::Short(vec![*v; len]),
            Value::Int(v) => Self::Int(vec![*v; len]),
            Value::Long(v) => Self::Long(vec![*v; len]),
            Value::Float(v) => Self::Float(vec![*v; len]),
            Value::Double(v) => Self::Double(vec![*v; len]),
            Value::Opaque(v) => Self::Opaque(vec![v.clone(); len]),
        }
    }

    /// Decode a buffer of fixed-size elements from raw native-endian bytes.
    ///
    /// Returns [`None`] if `kind` has no fixed size or the byte length is not
    /// a multiple of the element size.
    #[must_use]
    pub fn from_raw(kind: DataKind, bytes: &[u8]) -> Option<Self> {
        let size = kind.size_of()?;
        if bytes.len() % size != 0 {
            return None;
        }
        Some(match kind {
            DataKind::Bool => Self::Bool(bytes.iter().map(|&b| b != 0).collect()),
            DataKind::Byte => Self::Byte(bytemuck::pod_collect_to_vec(bytes)),
            DataKind::Char => Self::Char(bytes.to_vec()),
            DataKind::Short => Self::Short(bytemuck::pod_collect_to_vec(bytes)),
            DataKind::Int => Self::Int(bytemuck::pod_collect_to_vec(bytes)),
            DataKind::Long => Self::Long(bytemuck::pod_collect_to_vec(bytes)),
            DataKind::Float => Self::Float(bytemuck::pod_collect_to_vec(bytes)),
            DataKind::Double => Self::Double(bytemuck::pod_collect_to_vec(bytes)),
            DataKind::Opaque => unreachable!("opaque has no fixed size"),
        })
    }

    /// Return the kind of the buffer's elements.
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

    /// Return the number of elements in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        for_each_variant!(self, vec => vec.len())
    }

    /// Returns true if the buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the element at `offset`.
    ///
    /// # Panics
    /// Panics if `offset` is out of bounds.
    #[must_use]
    pub fn get(&self, offset: usize) -> Value {
        match self {
            Self::Bool(vec) => Value::Bool(vec[offset]),
            Self::Byte(vec) => Value::Byte(vec[offset]),
            Self::Char(vec) => Value::Char(vec[offset]),
            Self::Short(vec) => Value::Short(vec[offset]),
            Self::Int(vec) => Value::Int(vec[offset]),
            Self::Long(vec) => Value::Long(vec[offset]),
            Self::Float(vec) => Value::Float(vec[offset]),
            Self::Double(vec) => Value::Double(vec[offset]),
            Self::Opaque(vec) => Value::Opaque(vec[offset].clone()),
        }
    }

    /// Write the element at `offset`. The value kind must match the buffer
    /// kind; callers check this before dispatching here.
    ///
    /// # Panics
    /// Panics if `offset` is out of bounds or the kinds mismatch.
    pub fn set(&mut self, offset: usize, value: &Value) {
        match (self, value) {
            (Self::Bool(vec), Value::Bool(v)) => vec[offset] = *v,
            (Self::Byte(vec), Value::Byte(v)) => vec[offset] = *v,
            (Self::Char(vec), Value::Char(v)) => vec[offset] = *v,
            (Self::Short(vec), Value::Short(v)) => vec[offset] = *v,
            (Self::Int(vec), Value::Int(v)) => vec[offset] = *v,
            (Self::Long(vec), Value::Long(v)) => vec[offset] = *v,
            (Self::Float(vec), Value::Float(v)) => vec[offset] = *v,
            (Self::Double(vec), Value::Double(v)) => vec[offset] = *v,
            (Self::Opaque(vec), Value::Opaque(v)) => vec[offset].clone_from(v),
            (buffer, value) => unreachable!(
                "buffer kind {} cannot store {} values",
                buffer.kind(),
                value.kind()
            ),
        }
    }

    /// Copy `len` elements from `src` starting at `src_offset` into this
    /// buffer starting at `dst_offset`. The kinds must match.
    ///
    /// # Panics
    /// Panics if either region is out of bounds or the kinds mismatch.
    pub fn copy_run(&mut self, dst_offset: usize, src: &Self, src_offset: usize, len: usize) {
        match (self, src) {
            (Self::Bool(dst), Self::Bool(src)) => {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            }
            (Self::Byte(dst), Self::Byte(src)) => {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            }
            (Self::Char(dst), Self::Char(src)) => {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            }
            (Self::Short(dst), Self::Short(src)) => {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            }
            (Self::Int(dst), Self::Int(src)) => {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            }
            (Self::Long(dst), Self::Long(src)) => {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            }
            (Self::Float(dst), Self::Float(src)) => {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            }
            (Self::Double(dst), Self::Double(src)) => {
                dst[dst_offset..dst_offset + len]
                    .copy_from_slice(&src[src_offset..src_offset + len]);
            }
            (Self::Opaque(dst), Self::Opaque(src)) => {
                dst[dst_offset..dst_offset + len]
                    .clone_from_slice(&src[src_offset..src_offset + len]);
            }
            (dst, src) => unreachable!(
                "cannot copy {} elements into a {} buffer",
                src.kind(),
                dst.kind()
            ),
        }
    }
}
