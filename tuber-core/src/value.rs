use indexmap::IndexMap;

use crate::error::{Result, TuberError};

/// The wire value model shared by the JSON and CBOR codecs.
///
/// Both codecs encode from and decode into this type, so values survive a
/// format change between request and response. Maps preserve insertion
/// order end to end.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A raw byte sequence. JSON wraps these as `{"bytes": [...]}`; CBOR
    /// uses a native byte string.
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// A typed multi-dimensional array (CBOR tags 40/1040 + 64..87).
    NdArray(NdArray),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(v: IndexMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<NdArray> for Value {
    fn from(v: NdArray) -> Self {
        Value::NdArray(v)
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Value::Map(iter.into_iter().collect())
    }
}

// -- Typed arrays -------------------------------------------------------------

/// Element type of a typed array, limited to the widths the value model can
/// represent natively. Half- and quad-precision floats are recognized on
/// the wire but rejected as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// Element size in bytes.
    pub fn size(&self) -> usize {
        match self {
            ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
            ElementType::U64 | ElementType::I64 | ElementType::F64 => 8,
        }
    }

    fn is_float(&self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }

    fn is_signed(&self) -> bool {
        matches!(
            self,
            ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64
        )
    }

    /// The little-endian typed-array tag for this element type.
    ///
    /// Tag layout: base 64; bit 4 float, bit 3 signed, bit 2 little-endian
    /// (only meaningful for multi-byte elements), low 2 bits
    /// log2(element size) — floats store log2(size) - 1.
    pub fn cbor_tag(&self) -> u64 {
        let ll = if self.is_float() {
            (self.size().trailing_zeros() - 1) as u64
        } else {
            self.size().trailing_zeros() as u64
        };
        let mut tag = 64 + ll;
        if self.is_float() {
            tag += 16;
        } else if self.is_signed() {
            tag += 8;
        }
        if self.size() > 1 {
            tag += 4;
        }
        tag
    }

    /// Decode a typed-array tag into an element type and endianness.
    ///
    /// Valid tags are 64..=87 excluding 76; f16 and f128 tags are
    /// well-formed but unsupported.
    pub fn from_cbor_tag(tag: u64) -> Result<(ElementType, bool)> {
        if !(64..=87).contains(&tag) || tag == 76 {
            return Err(TuberError::CodecDecode(format!(
                "Invalid typed array tag {tag}"
            )));
        }
        let is_float = tag & 0x10 != 0;
        let is_signed = tag & 0x8 != 0;
        let little_endian = tag & 0x4 != 0;
        let ll = tag & 0x3;
        let ty = if is_float {
            match ll {
                1 => ElementType::F32,
                2 => ElementType::F64,
                // f16 (ll=0) and f128 (ll=3) have no native representation
                _ => {
                    return Err(TuberError::CodecDecode(format!(
                        "Unsupported float width for typed array tag {tag}"
                    )))
                }
            }
        } else if is_signed {
            match ll {
                0 => ElementType::I8,
                1 => ElementType::I16,
                2 => ElementType::I32,
                _ => ElementType::I64,
            }
        } else {
            match ll {
                0 => ElementType::U8,
                1 => ElementType::U16,
                2 => ElementType::U32,
                _ => ElementType::U64,
            }
        };
        Ok((ty, little_endian))
    }
}

/// Flat element storage for a typed array.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! typed_data_each {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            TypedData::U8($v) => $body,
            TypedData::U16($v) => $body,
            TypedData::U32($v) => $body,
            TypedData::U64($v) => $body,
            TypedData::I8($v) => $body,
            TypedData::I16($v) => $body,
            TypedData::I32($v) => $body,
            TypedData::I64($v) => $body,
            TypedData::F32($v) => $body,
            TypedData::F64($v) => $body,
        }
    };
}

impl TypedData {
    pub fn len(&self) -> usize {
        typed_data_each!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            TypedData::U8(_) => ElementType::U8,
            TypedData::U16(_) => ElementType::U16,
            TypedData::U32(_) => ElementType::U32,
            TypedData::U64(_) => ElementType::U64,
            TypedData::I8(_) => ElementType::I8,
            TypedData::I16(_) => ElementType::I16,
            TypedData::I32(_) => ElementType::I32,
            TypedData::I64(_) => ElementType::I64,
            TypedData::F32(_) => ElementType::F32,
            TypedData::F64(_) => ElementType::F64,
        }
    }

    /// Serialize the elements as a little-endian byte string.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        macro_rules! collect {
            ($v:expr) => {
                $v.iter().flat_map(|x| x.to_le_bytes()).collect()
            };
        }
        match self {
            TypedData::U8(v) => v.clone(),
            TypedData::U16(v) => collect!(v),
            TypedData::U32(v) => collect!(v),
            TypedData::U64(v) => collect!(v),
            TypedData::I8(v) => v.iter().map(|x| *x as u8).collect(),
            TypedData::I16(v) => collect!(v),
            TypedData::I32(v) => collect!(v),
            TypedData::I64(v) => collect!(v),
            TypedData::F32(v) => collect!(v),
            TypedData::F64(v) => collect!(v),
        }
    }

    /// Deserialize a byte string into typed elements.
    ///
    /// The byte length must be a multiple of the element size.
    pub fn from_bytes(ty: ElementType, bytes: &[u8], little_endian: bool) -> Result<TypedData> {
        let size = ty.size();
        if bytes.len() % size != 0 {
            return Err(TuberError::CodecDecode(format!(
                "Invalid data size ({}) for typed array of element size {size}",
                bytes.len()
            )));
        }
        macro_rules! split {
            ($t:ty, $variant:ident) => {{
                let v = bytes
                    .chunks_exact(size)
                    .map(|c| {
                        let arr: [u8; std::mem::size_of::<$t>()] =
                            c.try_into().unwrap_or_default();
                        if little_endian {
                            <$t>::from_le_bytes(arr)
                        } else {
                            <$t>::from_be_bytes(arr)
                        }
                    })
                    .collect();
                TypedData::$variant(v)
            }};
        }
        Ok(match ty {
            ElementType::U8 => TypedData::U8(bytes.to_vec()),
            ElementType::I8 => TypedData::I8(bytes.iter().map(|b| *b as i8).collect()),
            ElementType::U16 => split!(u16, U16),
            ElementType::U32 => split!(u32, U32),
            ElementType::U64 => split!(u64, U64),
            ElementType::I16 => split!(i16, I16),
            ElementType::I32 => split!(i32, I32),
            ElementType::I64 => split!(i64, I64),
            ElementType::F32 => split!(f32, F32),
            ElementType::F64 => split!(f64, F64),
        })
    }

    /// The element at a flat index, widened into a `Value`.
    pub(crate) fn get(&self, i: usize) -> Value {
        match self {
            TypedData::U8(v) => Value::Int(v[i] as i64),
            TypedData::U16(v) => Value::Int(v[i] as i64),
            TypedData::U32(v) => Value::Int(v[i] as i64),
            TypedData::U64(v) => {
                if let Ok(x) = i64::try_from(v[i]) {
                    Value::Int(x)
                } else {
                    Value::Float(v[i] as f64)
                }
            }
            TypedData::I8(v) => Value::Int(v[i] as i64),
            TypedData::I16(v) => Value::Int(v[i] as i64),
            TypedData::I32(v) => Value::Int(v[i] as i64),
            TypedData::I64(v) => Value::Int(v[i]),
            TypedData::F32(v) => Value::Float(v[i] as f64),
            TypedData::F64(v) => Value::Float(v[i]),
        }
    }
}

/// Memory layout recorded for a typed array, selecting the wrapper tag
/// (40 = row-major, 1040 = column-major).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayOrder {
    RowMajor,
    ColMajor,
}

impl ArrayOrder {
    pub fn cbor_tag(&self) -> u64 {
        match self {
            ArrayOrder::RowMajor => 40,
            ArrayOrder::ColMajor => 1040,
        }
    }
}

/// A contiguous typed n-dimensional array.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    order: ArrayOrder,
    data: TypedData,
}

impl NdArray {
    /// Build an array, checking that the shape matches the element count.
    pub fn new(shape: Vec<usize>, order: ArrayOrder, data: TypedData) -> Result<NdArray> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TuberError::Value(format!(
                "Array shape {shape:?} does not match element count {}",
                data.len()
            )));
        }
        Ok(NdArray { shape, order, data })
    }

    /// A one-dimensional row-major array over the given elements.
    pub fn flat(data: TypedData) -> NdArray {
        NdArray {
            shape: vec![data.len()],
            order: ArrayOrder::RowMajor,
            data,
        }
    }

    /// Reinterpret a flat array with a new shape and layout.
    pub fn reshape(self, shape: Vec<usize>, order: ArrayOrder) -> Result<NdArray> {
        let expected: usize = shape.iter().product();
        if expected != self.data.len() {
            return Err(TuberError::CodecDecode(format!(
                "Array shape {shape:?} does not match element count {}",
                self.data.len()
            )));
        }
        Ok(NdArray {
            shape,
            order,
            data: self.data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn order(&self) -> ArrayOrder {
        self.order
    }

    pub fn data(&self) -> &TypedData {
        &self.data
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    /// Strides (in elements) for each dimension under the array's layout.
    pub(crate) fn strides(&self) -> Vec<usize> {
        let n = self.shape.len();
        let mut strides = vec![1usize; n];
        match self.order {
            ArrayOrder::RowMajor => {
                for k in (0..n.saturating_sub(1)).rev() {
                    strides[k] = strides[k + 1] * self.shape[k + 1];
                }
            }
            ArrayOrder::ColMajor => {
                for k in 1..n {
                    strides[k] = strides[k - 1] * self.shape[k - 1];
                }
            }
        }
        strides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip_all_element_types() {
        let types = [
            ElementType::U8,
            ElementType::U16,
            ElementType::U32,
            ElementType::U64,
            ElementType::I8,
            ElementType::I16,
            ElementType::I32,
            ElementType::I64,
            ElementType::F32,
            ElementType::F64,
        ];
        for ty in types {
            let tag = ty.cbor_tag();
            let (decoded, le) = ElementType::from_cbor_tag(tag).unwrap();
            assert_eq!(decoded, ty, "tag {tag}");
            // single-byte elements have no endianness bit
            assert_eq!(le, ty.size() > 1, "tag {tag}");
        }
    }

    #[test]
    fn known_tag_values() {
        assert_eq!(ElementType::U8.cbor_tag(), 64);
        assert_eq!(ElementType::U16.cbor_tag(), 69);
        assert_eq!(ElementType::I8.cbor_tag(), 72);
        assert_eq!(ElementType::I64.cbor_tag(), 79);
        assert_eq!(ElementType::F32.cbor_tag(), 85);
        assert_eq!(ElementType::F64.cbor_tag(), 86);
    }

    #[test]
    fn big_endian_tags_decode() {
        assert_eq!(
            ElementType::from_cbor_tag(65).unwrap(),
            (ElementType::U16, false)
        );
        assert_eq!(
            ElementType::from_cbor_tag(82).unwrap(),
            (ElementType::F64, false)
        );
    }

    #[test]
    fn reserved_and_unsupported_tags_rejected() {
        assert!(ElementType::from_cbor_tag(76).is_err());
        assert!(ElementType::from_cbor_tag(63).is_err());
        assert!(ElementType::from_cbor_tag(88).is_err());
        // f16 and f128
        assert!(ElementType::from_cbor_tag(80).is_err());
        assert!(ElementType::from_cbor_tag(87).is_err());
    }

    #[test]
    fn typed_data_byte_round_trip() {
        let data = TypedData::F64(vec![1.0, -2.5, 3.25]);
        let bytes = data.to_le_bytes();
        assert_eq!(bytes.len(), 24);
        let back = TypedData::from_bytes(ElementType::F64, &bytes, true).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn typed_data_big_endian_decode() {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        let be = TypedData::from_bytes(ElementType::U16, &bytes, false).unwrap();
        assert_eq!(be, TypedData::U16(vec![0x0102, 0x0304]));
        let le = TypedData::from_bytes(ElementType::U16, &bytes, true).unwrap();
        assert_eq!(le, TypedData::U16(vec![0x0201, 0x0403]));
    }

    #[test]
    fn typed_data_length_mismatch() {
        let err = TypedData::from_bytes(ElementType::U32, &[0, 1, 2], true).unwrap_err();
        assert!(matches!(err, TuberError::CodecDecode(_)));
    }

    #[test]
    fn ndarray_shape_validation() {
        let data = TypedData::I32(vec![1, 2, 3, 4, 5, 6]);
        assert!(NdArray::new(vec![2, 3], ArrayOrder::RowMajor, data.clone()).is_ok());
        let err = NdArray::new(vec![2, 2], ArrayOrder::RowMajor, data).unwrap_err();
        assert!(matches!(err, TuberError::Value(_)));
    }

    #[test]
    fn strides_row_and_col_major() {
        let data = TypedData::U8(vec![0; 24]);
        let row = NdArray::new(vec![2, 3, 4], ArrayOrder::RowMajor, data.clone()).unwrap();
        assert_eq!(row.strides(), vec![12, 4, 1]);
        let col = NdArray::new(vec![2, 3, 4], ArrayOrder::ColMajor, data).unwrap();
        assert_eq!(col.strides(), vec![1, 2, 6]);
    }
}
