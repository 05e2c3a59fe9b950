//! Media-type codecs for the wire value model.
//!
//! Two codecs are registered: `application/json` and `application/cbor`.
//! Both encode from and decode into [`Value`], so a request decoded from
//! one format can be answered in the other. JSON wraps byte sequences as
//! `{"bytes": [...]}` and flattens typed arrays into nested lists; CBOR
//! carries bytes natively and uses RFC 8746 typed-array tags.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::{Result, TuberError};
use crate::value::{ArrayOrder, ElementType, NdArray, TypedData, Value};

/// A registered wire format, keyed by media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Cbor,
}

/// All registered codecs, in preference order.
pub const CONTENT_TYPES: &[ContentType] = &[ContentType::Json, ContentType::Cbor];

impl ContentType {
    /// The media type string used in HTTP headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Cbor => "application/cbor",
        }
    }

    /// Look up a codec by media type. Returns `None` for unknown types.
    pub fn from_media_type(s: &str) -> Option<ContentType> {
        match s {
            "application/json" => Some(ContentType::Json),
            "application/cbor" => Some(ContentType::Cbor),
            _ => None,
        }
    }

    /// Encode a value into wire bytes.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match self {
            ContentType::Json => {
                let json = value_to_json(value)?;
                serde_json::to_vec(&json)
                    .map_err(|e| TuberError::CodecEncode(format!("JSON encoding failed: {e}")))
            }
            ContentType::Cbor => {
                let cbor = value_to_cbor(value)?;
                let mut buf = Vec::new();
                ciborium::ser::into_writer(&cbor, &mut buf)
                    .map_err(|e| TuberError::CodecEncode(format!("CBOR encoding failed: {e}")))?;
                Ok(buf)
            }
        }
    }

    /// Decode wire bytes into a value.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        match self {
            ContentType::Json => {
                let json: serde_json::Value = serde_json::from_slice(bytes)
                    .map_err(|e| TuberError::CodecDecode(format!("Invalid JSON: {e}")))?;
                json_to_value(&json)
            }
            ContentType::Cbor => {
                let cbor: ciborium::Value = ciborium::de::from_reader(bytes)
                    .map_err(|e| TuberError::CodecDecode(format!("Invalid CBOR: {e}")))?;
                cbor_to_value(cbor)
            }
        }
    }
}

impl FromStr for ContentType {
    type Err = TuberError;

    fn from_str(s: &str) -> Result<Self> {
        ContentType::from_media_type(s)
            .ok_or_else(|| TuberError::Value(format!("Not able to decode media type {s}")))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// -- JSON ---------------------------------------------------------------------

/// Convert a wire value to a serde_json value.
///
/// Byte sequences become `{"bytes": [...]}`. Typed arrays become nested
/// lists in logical index order, which loses dtype and shape by design —
/// callers who need them use CBOR.
pub(crate) fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                TuberError::CodecEncode(format!("Non-finite float {f} is not valid JSON"))
            })?,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => {
            let mut map = serde_json::Map::new();
            map.insert(
                "bytes".to_string(),
                serde_json::Value::Array(b.iter().map(|v| (*v as i64).into()).collect()),
            );
            serde_json::Value::Object(map)
        }
        Value::Array(a) => {
            serde_json::Value::Array(a.iter().map(value_to_json).collect::<Result<_>>()?)
        }
        Value::Map(m) => {
            let mut map = serde_json::Map::new();
            for (k, v) in m {
                map.insert(k.clone(), value_to_json(v)?);
            }
            serde_json::Value::Object(map)
        }
        Value::NdArray(arr) => ndarray_to_json(arr)?,
    })
}

/// Convert a serde_json value to a wire value.
///
/// An object whose keys are exactly `{bytes}` or `{bytes, subtype}` with a
/// 0..=255 integer array decodes as a byte sequence; any other shape stays
/// a map.
pub(crate) fn json_to_value(json: &serde_json::Value) -> Result<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                return Err(TuberError::CodecDecode(format!(
                    "Unrepresentable JSON number {n}"
                )));
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(a) => {
            Value::Array(a.iter().map(json_to_value).collect::<Result<_>>()?)
        }
        serde_json::Value::Object(o) => {
            if let Some(bytes) = wrapped_bytes(o) {
                Value::Bytes(bytes)
            } else {
                let mut map = IndexMap::new();
                for (k, v) in o {
                    map.insert(k.clone(), json_to_value(v)?);
                }
                Value::Map(map)
            }
        }
    })
}

/// Recognize the `{"bytes": [...]}` wrapping (optionally with "subtype").
fn wrapped_bytes(o: &serde_json::Map<String, serde_json::Value>) -> Option<Vec<u8>> {
    let well_shaped = match o.len() {
        1 => o.contains_key("bytes"),
        2 => o.contains_key("bytes") && o.contains_key("subtype"),
        _ => false,
    };
    if !well_shaped {
        return None;
    }
    let serde_json::Value::Array(items) = o.get("bytes")? else {
        return None;
    };
    items
        .iter()
        .map(|v| v.as_i64().and_then(|i| u8::try_from(i).ok()))
        .collect()
}

/// Expand a typed array into nested JSON lists in logical index order.
fn ndarray_to_json(arr: &NdArray) -> Result<serde_json::Value> {
    let strides = arr.strides();

    fn build(
        arr: &NdArray,
        strides: &[usize],
        dim: usize,
        offset: usize,
    ) -> Result<serde_json::Value> {
        if dim == arr.shape().len() {
            return value_to_json(&arr.data().get(offset));
        }
        let mut out = Vec::with_capacity(arr.shape()[dim]);
        for i in 0..arr.shape()[dim] {
            out.push(build(arr, strides, dim + 1, offset + i * strides[dim])?);
        }
        Ok(serde_json::Value::Array(out))
    }

    build(arr, &strides, 0, 0)
}

// -- CBOR ---------------------------------------------------------------------

/// Convert a wire value to a ciborium value, emitting typed-array tags.
pub(crate) fn value_to_cbor(value: &Value) -> Result<ciborium::Value> {
    Ok(match value {
        Value::Null => ciborium::Value::Null,
        Value::Bool(b) => ciborium::Value::Bool(*b),
        Value::Int(i) => ciborium::Value::Integer((*i).into()),
        Value::Float(f) => ciborium::Value::Float(*f),
        Value::String(s) => ciborium::Value::Text(s.clone()),
        Value::Bytes(b) => ciborium::Value::Bytes(b.clone()),
        Value::Array(a) => {
            ciborium::Value::Array(a.iter().map(value_to_cbor).collect::<Result<_>>()?)
        }
        Value::Map(m) => ciborium::Value::Map(
            m.iter()
                .map(|(k, v)| Ok((ciborium::Value::Text(k.clone()), value_to_cbor(v)?)))
                .collect::<Result<_>>()?,
        ),
        Value::NdArray(arr) => ndarray_to_cbor(arr),
    })
}

/// Emit the tag-40/1040 wrapper around a little-endian typed array.
fn ndarray_to_cbor(arr: &NdArray) -> ciborium::Value {
    let shape = ciborium::Value::Array(
        arr.shape()
            .iter()
            .map(|&n| ciborium::Value::Integer((n as u64).into()))
            .collect(),
    );
    let typed = ciborium::Value::Tag(
        arr.element_type().cbor_tag(),
        Box::new(ciborium::Value::Bytes(arr.data().to_le_bytes())),
    );
    ciborium::Value::Tag(
        arr.order().cbor_tag(),
        Box::new(ciborium::Value::Array(vec![shape, typed])),
    )
}

/// Convert a ciborium value to a wire value, interpreting typed-array and
/// multi-dimensional tags.
pub(crate) fn cbor_to_value(cbor: ciborium::Value) -> Result<Value> {
    Ok(match cbor {
        ciborium::Value::Null => Value::Null,
        ciborium::Value::Bool(b) => Value::Bool(b),
        ciborium::Value::Integer(i) => {
            let wide = i128::from(i);
            match i64::try_from(wide) {
                Ok(v) => Value::Int(v),
                Err(_) => Value::Float(wide as f64),
            }
        }
        ciborium::Value::Float(f) => Value::Float(f),
        ciborium::Value::Text(s) => Value::String(s),
        ciborium::Value::Bytes(b) => Value::Bytes(b),
        ciborium::Value::Array(a) => {
            Value::Array(a.into_iter().map(cbor_to_value).collect::<Result<_>>()?)
        }
        ciborium::Value::Map(entries) => {
            let mut map = IndexMap::new();
            for (k, v) in entries {
                let ciborium::Value::Text(key) = k else {
                    return Err(TuberError::CodecDecode(
                        "CBOR map keys must be strings".into(),
                    ));
                };
                map.insert(key, cbor_to_value(v)?);
            }
            Value::Map(map)
        }
        ciborium::Value::Tag(tag, inner) => decode_tag(tag, *inner)?,
        other => {
            return Err(TuberError::CodecDecode(format!(
                "Unsupported CBOR item {other:?}"
            )))
        }
    })
}

fn decode_tag(tag: u64, inner: ciborium::Value) -> Result<Value> {
    // Multi-dimensional wrapper: [shape, typed-array]
    if tag == 40 || tag == 1040 {
        let order = if tag == 40 {
            ArrayOrder::RowMajor
        } else {
            ArrayOrder::ColMajor
        };
        let ciborium::Value::Array(items) = inner else {
            return Err(TuberError::CodecDecode(format!(
                "Invalid raw data for multi-dimensional array tag ({tag})"
            )));
        };
        if items.len() != 2 {
            return Err(TuberError::CodecDecode(format!(
                "Invalid raw array length for multi-dimensional array tag ({tag})"
            )));
        }
        let mut items = items.into_iter();
        let (shape_value, data_value) = match (items.next(), items.next()) {
            (Some(s), Some(d)) => (s, d),
            _ => unreachable!("length checked above"),
        };
        let ciborium::Value::Array(extents) = shape_value else {
            return Err(TuberError::CodecDecode(format!(
                "Invalid shape for multi-dimensional array tag ({tag})"
            )));
        };
        let shape = extents
            .into_iter()
            .map(|e| match e {
                ciborium::Value::Integer(i) => usize::try_from(i128::from(i)).map_err(|_| {
                    TuberError::CodecDecode("Negative array extent".into())
                }),
                _ => Err(TuberError::CodecDecode(
                    "Array extents must be integers".into(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        let Value::NdArray(flat) = cbor_to_value(data_value)? else {
            return Err(TuberError::CodecDecode(format!(
                "Invalid raw data for multi-dimensional array tag ({tag})"
            )));
        };
        return Ok(Value::NdArray(flat.reshape(shape, order)?));
    }

    // Typed array: a byte string of packed elements
    if (64..=87).contains(&tag) && tag != 76 {
        let (ty, little_endian) = ElementType::from_cbor_tag(tag)?;
        let ciborium::Value::Bytes(bytes) = inner else {
            return Err(TuberError::CodecDecode(format!(
                "Typed array tag {tag} requires a byte string payload"
            )));
        };
        let data = TypedData::from_bytes(ty, &bytes, little_endian)?;
        return Ok(Value::NdArray(NdArray::flat(data)));
    }

    Err(TuberError::CodecDecode(format!("Unsupported CBOR tag {tag}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn media_type_lookup() {
        assert_eq!(
            ContentType::from_media_type("application/json"),
            Some(ContentType::Json)
        );
        assert_eq!(
            ContentType::from_media_type("application/cbor"),
            Some(ContentType::Cbor)
        );
        assert_eq!(ContentType::from_media_type("text/html"), None);
        let err = "text/html".parse::<ContentType>().unwrap_err();
        assert_eq!(err.to_string(), "Not able to decode media type text/html");
    }

    #[test]
    fn json_scalar_round_trip() {
        let values = [
            Value::Null,
            Value::Bool(true),
            Value::Int(-42),
            Value::Float(0.1234),
            Value::String("hello".into()),
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        ];
        for v in values {
            let bytes = ContentType::Json.encode(&v).unwrap();
            assert_eq!(ContentType::Json.decode(&bytes).unwrap(), v);
        }
    }

    #[test]
    fn json_map_preserves_key_order() {
        let v = map(&[
            ("zebra", Value::Int(1)),
            ("apple", Value::Int(2)),
            ("mango", Value::Int(3)),
        ]);
        let bytes = ContentType::Json.encode(&v).unwrap();
        let decoded = ContentType::Json.decode(&bytes).unwrap();
        let keys: Vec<&String> = decoded.as_map().unwrap().keys().collect();
        assert_eq!(keys, ["zebra", "apple", "mango"]);
    }

    #[test]
    fn json_bytes_round_trip() {
        let v = Value::Bytes(vec![0, 1, 255, 128]);
        let bytes = ContentType::Json.encode(&v).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"bytes":[0,1,255,128]}"#
        );
        assert_eq!(ContentType::Json.decode(&bytes).unwrap(), v);
    }

    #[test]
    fn json_bytes_with_subtype_decodes() {
        let raw = br#"{"bytes":[1,2,3],"subtype":42}"#;
        assert_eq!(
            ContentType::Json.decode(raw).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn json_bytes_lookalikes_stay_maps() {
        // extra key
        let raw = br#"{"bytes":[1,2],"other":1}"#;
        assert!(matches!(
            ContentType::Json.decode(raw).unwrap(),
            Value::Map(_)
        ));
        // out-of-range element
        let raw = br#"{"bytes":[1,256]}"#;
        assert!(matches!(
            ContentType::Json.decode(raw).unwrap(),
            Value::Map(_)
        ));
        // non-array payload
        let raw = br#"{"bytes":"nope"}"#;
        assert!(matches!(
            ContentType::Json.decode(raw).unwrap(),
            Value::Map(_)
        ));
    }

    #[test]
    fn json_rejects_non_finite_floats() {
        let err = ContentType::Json.encode(&Value::Float(f64::NAN)).unwrap_err();
        assert!(matches!(err, TuberError::CodecEncode(_)));
    }

    #[test]
    fn json_flattens_ndarray() {
        let arr = NdArray::new(
            vec![2, 3],
            ArrayOrder::RowMajor,
            TypedData::I32(vec![1, 2, 3, 4, 5, 6]),
        )
        .unwrap();
        let bytes = ContentType::Json.encode(&Value::NdArray(arr)).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), "[[1,2,3],[4,5,6]]");
    }

    #[test]
    fn json_flattens_col_major_in_logical_order() {
        // Column-major [2, 3]: memory holds columns, logical rows interleave
        let arr = NdArray::new(
            vec![2, 3],
            ArrayOrder::ColMajor,
            TypedData::I32(vec![1, 4, 2, 5, 3, 6]),
        )
        .unwrap();
        let bytes = ContentType::Json.encode(&Value::NdArray(arr)).unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), "[[1,2,3],[4,5,6]]");
    }

    #[test]
    fn cbor_scalar_round_trip() {
        let values = [
            Value::Null,
            Value::Bool(false),
            Value::Int(1234),
            Value::Float(-0.5),
            Value::String("cbor".into()),
            Value::Bytes(vec![9, 8, 7]),
            map(&[("k", Value::Array(vec![Value::Int(1)]))]),
        ];
        for v in values {
            let bytes = ContentType::Cbor.encode(&v).unwrap();
            assert_eq!(ContentType::Cbor.decode(&bytes).unwrap(), v, "{v:?}");
        }
    }

    #[test]
    fn cbor_ndarray_round_trip() {
        let arr = NdArray::new(
            vec![4],
            ArrayOrder::RowMajor,
            TypedData::F64(vec![1.0, 2.5, -3.0, 4.25]),
        )
        .unwrap();
        let v = Value::NdArray(arr.clone());
        let bytes = ContentType::Cbor.encode(&v).unwrap();
        let Value::NdArray(back) = ContentType::Cbor.decode(&bytes).unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(back.shape(), arr.shape());
        assert_eq!(back.element_type(), arr.element_type());
        assert_eq!(back.data(), arr.data());
    }

    #[test]
    fn cbor_two_dimensional_round_trip() {
        let arr = NdArray::new(
            vec![2, 2],
            ArrayOrder::ColMajor,
            TypedData::U16(vec![10, 20, 30, 40]),
        )
        .unwrap();
        let bytes = ContentType::Cbor.encode(&Value::NdArray(arr.clone())).unwrap();
        let Value::NdArray(back) = ContentType::Cbor.decode(&bytes).unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(back, arr);
    }

    #[test]
    fn cbor_emits_wrapper_and_typed_tags() {
        let arr = NdArray::new(
            vec![2],
            ArrayOrder::RowMajor,
            TypedData::U8(vec![1, 2]),
        )
        .unwrap();
        let cbor = value_to_cbor(&Value::NdArray(arr)).unwrap();
        let ciborium::Value::Tag(40, inner) = cbor else {
            panic!("expected tag 40, got {cbor:?}");
        };
        let ciborium::Value::Array(items) = *inner else {
            panic!("expected wrapper array");
        };
        assert!(matches!(items[1], ciborium::Value::Tag(64, _)));
    }

    #[test]
    fn cbor_bare_typed_array_decodes_flat() {
        let cbor = ciborium::Value::Tag(
            ElementType::U16.cbor_tag(),
            Box::new(ciborium::Value::Bytes(vec![1, 0, 2, 0])),
        );
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&cbor, &mut buf).unwrap();
        let Value::NdArray(arr) = ContentType::Cbor.decode(&buf).unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(arr.shape(), &[2]);
        assert_eq!(arr.data(), &TypedData::U16(vec![1, 2]));
    }

    #[test]
    fn cbor_rejects_bad_typed_array_payloads() {
        // payload length not a multiple of the element size
        let cbor = ciborium::Value::Tag(
            ElementType::U32.cbor_tag(),
            Box::new(ciborium::Value::Bytes(vec![1, 2, 3])),
        );
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&cbor, &mut buf).unwrap();
        assert!(matches!(
            ContentType::Cbor.decode(&buf).unwrap_err(),
            TuberError::CodecDecode(_)
        ));

        // f16 is recognized but unsupported
        let cbor = ciborium::Value::Tag(80, Box::new(ciborium::Value::Bytes(vec![0, 60])));
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&cbor, &mut buf).unwrap();
        assert!(ContentType::Cbor.decode(&buf).is_err());
    }

    #[test]
    fn cbor_rejects_malformed_wrapper() {
        let cbor = ciborium::Value::Tag(
            40,
            Box::new(ciborium::Value::Array(vec![ciborium::Value::Integer(1.into())])),
        );
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&cbor, &mut buf).unwrap();
        assert!(ContentType::Cbor.decode(&buf).is_err());
    }

    #[test]
    fn cbor_wrapper_shape_mismatch() {
        // shape says 3 elements, payload has 2
        let typed = ciborium::Value::Tag(
            ElementType::U8.cbor_tag(),
            Box::new(ciborium::Value::Bytes(vec![1, 2])),
        );
        let shape = ciborium::Value::Array(vec![ciborium::Value::Integer(3.into())]);
        let cbor = ciborium::Value::Tag(40, Box::new(ciborium::Value::Array(vec![shape, typed])));
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&cbor, &mut buf).unwrap();
        assert!(ContentType::Cbor.decode(&buf).is_err());
    }

    #[test]
    fn cross_format_value_survives() {
        let v = map(&[
            ("data", Value::Bytes(vec![1, 2, 3])),
            ("label", Value::String("x".into())),
        ]);
        let cbor_bytes = ContentType::Cbor.encode(&v).unwrap();
        let decoded = ContentType::Cbor.decode(&cbor_bytes).unwrap();
        let json_bytes = ContentType::Json.encode(&decoded).unwrap();
        assert_eq!(ContentType::Json.decode(&json_bytes).unwrap(), v);
    }
}
