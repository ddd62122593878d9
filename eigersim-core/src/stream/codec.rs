//! CBOR tag decoding table for the stream2 wire format.
//!
//! Stream2 messages carry typed and multidimensional arrays as tagged
//! CBOR values (RFC 8746 layout) plus a vendor compression envelope.
//! This module maps tag numbers to typed interpretations. It is pure
//! and stateless: the same table serves fixture template loading and
//! replay of wire-captured messages.

use ciborium::value::Value;

use super::StreamError;

/// Self-describe CBOR envelope tag wrapped around every stream2 message.
pub const SELF_DESCRIBE_TAG: u64 = 55799;

/// Multidimensional array tag, row-major element order.
pub const MULTI_DIM_ROW_MAJOR_TAG: u64 = 40;

/// Multidimensional array tag, column-major element order.
pub const MULTI_DIM_COLUMN_MAJOR_TAG: u64 = 1040;

/// Vendor compression envelope tag.
pub const COMPRESSION_TAG: u64 = 56500;

/// Errors raised while decoding tagged stream2 values.
///
/// Malformed payloads for recognized tags are fatal; unrecognized tags
/// never error (they pass through as [`TagValue::Unknown`]).
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("tag {tag}: expected byte string in typed array")]
    ExpectedByteString { tag: u64 },

    #[error("tag {tag}: expected [dimensions, contents] array")]
    MalformedMultiDim { tag: u64 },

    #[error("tag {tag}: expected [algorithm, elem_size, bytes] array")]
    MalformedCompression { tag: u64 },

    #[error("{len} bytes do not divide into {element} elements ({width} bytes each)")]
    MisalignedBuffer {
        element: ElementType,
        width: usize,
        len: usize,
    },

    #[error("cannot reshape {elements} elements into dimensions {dimensions:?}")]
    ShapeMismatch {
        elements: usize,
        dimensions: Vec<u64>,
    },
}

/// Element type of a typed array.
///
/// Display names follow the detector API convention (`uint16`,
/// `float32`, ...), which is also how stream1 headers spell them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float16,
    Float32,
    Float64,
    Float128,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn byte_width(&self) -> usize {
        match self {
            ElementType::Uint8 | ElementType::Int8 => 1,
            ElementType::Uint16 | ElementType::Int16 | ElementType::Float16 => 2,
            ElementType::Uint32 | ElementType::Int32 | ElementType::Float32 => 4,
            ElementType::Uint64 | ElementType::Int64 | ElementType::Float64 => 8,
            ElementType::Float128 => 16,
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementType::Uint8 => "uint8",
            ElementType::Uint16 => "uint16",
            ElementType::Uint32 => "uint32",
            ElementType::Uint64 => "uint64",
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Float16 => "float16",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Float128 => "float128",
        };
        f.write_str(name)
    }
}

/// Byte order of multi-byte elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Element ordering of a multidimensional array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOrder {
    RowMajor,
    ColumnMajor,
}

/// Typed-array tag table: tag number to element interpretation.
///
/// Covers tags 64-87 excluding 76, the subset the detector emits.
/// Single-byte element types have no meaningful byte order; both the
/// big- and little-endian tag slots map to the same interpretation.
pub fn element_type_for_tag(tag: u64) -> Option<(ElementType, ByteOrder)> {
    let decoded = match tag {
        64 | 68 => (ElementType::Uint8, ByteOrder::Little),
        65 => (ElementType::Uint16, ByteOrder::Big),
        66 => (ElementType::Uint32, ByteOrder::Big),
        67 => (ElementType::Uint64, ByteOrder::Big),
        69 => (ElementType::Uint16, ByteOrder::Little),
        70 => (ElementType::Uint32, ByteOrder::Little),
        71 => (ElementType::Uint64, ByteOrder::Little),
        72 => (ElementType::Int8, ByteOrder::Little),
        73 => (ElementType::Int16, ByteOrder::Big),
        74 => (ElementType::Int32, ByteOrder::Big),
        75 => (ElementType::Int64, ByteOrder::Big),
        77 => (ElementType::Int16, ByteOrder::Little),
        78 => (ElementType::Int32, ByteOrder::Little),
        79 => (ElementType::Int64, ByteOrder::Little),
        80 => (ElementType::Float16, ByteOrder::Big),
        81 => (ElementType::Float32, ByteOrder::Big),
        82 => (ElementType::Float64, ByteOrder::Big),
        83 => (ElementType::Float128, ByteOrder::Big),
        84 => (ElementType::Float16, ByteOrder::Little),
        85 => (ElementType::Float32, ByteOrder::Little),
        86 => (ElementType::Float64, ByteOrder::Little),
        87 => (ElementType::Float128, ByteOrder::Little),
        _ => return None,
    };
    Some(decoded)
}

/// Canonical tag number for an element interpretation.
pub fn tag_for_element_type(element: ElementType, order: ByteOrder) -> u64 {
    match (element, order) {
        (ElementType::Uint8, _) => 64,
        (ElementType::Uint16, ByteOrder::Big) => 65,
        (ElementType::Uint32, ByteOrder::Big) => 66,
        (ElementType::Uint64, ByteOrder::Big) => 67,
        (ElementType::Uint16, ByteOrder::Little) => 69,
        (ElementType::Uint32, ByteOrder::Little) => 70,
        (ElementType::Uint64, ByteOrder::Little) => 71,
        (ElementType::Int8, _) => 72,
        (ElementType::Int16, ByteOrder::Big) => 73,
        (ElementType::Int32, ByteOrder::Big) => 74,
        (ElementType::Int64, ByteOrder::Big) => 75,
        (ElementType::Int16, ByteOrder::Little) => 77,
        (ElementType::Int32, ByteOrder::Little) => 78,
        (ElementType::Int64, ByteOrder::Little) => 79,
        (ElementType::Float16, ByteOrder::Big) => 80,
        (ElementType::Float32, ByteOrder::Big) => 81,
        (ElementType::Float64, ByteOrder::Big) => 82,
        (ElementType::Float128, ByteOrder::Big) => 83,
        (ElementType::Float16, ByteOrder::Little) => 84,
        (ElementType::Float32, ByteOrder::Little) => 85,
        (ElementType::Float64, ByteOrder::Little) => 86,
        (ElementType::Float128, ByteOrder::Little) => 87,
    }
}

/// Flat byte buffer tagged with an element interpretation.
///
/// The buffer is kept as raw bytes; the element type and byte order
/// describe how a consumer reinterprets it. This preserves exact wire
/// layout without committing to a host numeric representation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    element: ElementType,
    order: ByteOrder,
    data: Vec<u8>,
}

impl TypedArray {
    /// Builds a typed array, validating that the buffer length is a
    /// whole number of elements.
    ///
    /// # Errors
    ///
    /// - `CodecError::MisalignedBuffer` - If the length does not divide by the element width
    pub fn new(element: ElementType, order: ByteOrder, data: Vec<u8>) -> Result<Self, CodecError> {
        let width = element.byte_width();
        if data.len() % width != 0 {
            return Err(CodecError::MisalignedBuffer {
                element,
                width,
                len: data.len(),
            });
        }
        Ok(Self {
            element,
            order,
            data,
        })
    }

    /// Element type of the buffer.
    pub fn element(&self) -> ElementType {
        self.element
    }

    /// Byte order of the buffer.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.element.byte_width()
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw backing bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the array, returning the raw backing bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Re-encodes as a tagged CBOR value using the canonical tag for
    /// this interpretation.
    pub fn into_value(self) -> Value {
        let tag = tag_for_element_type(self.element, self.order);
        Value::Tag(tag, Box::new(Value::Bytes(self.data)))
    }
}

/// Contents of a multidimensional array: either a typed buffer or a
/// generic CBOR element list.
#[derive(Debug, Clone, PartialEq)]
pub enum NdContents {
    Typed(TypedArray),
    Values(Vec<Value>),
}

impl NdContents {
    fn element_count(&self) -> usize {
        match self {
            NdContents::Typed(array) => array.len(),
            NdContents::Values(values) => values.len(),
        }
    }
}

/// Multidimensional array: flat contents plus a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    dimensions: Vec<u64>,
    order: MemoryOrder,
    contents: NdContents,
}

impl NdArray {
    /// Builds a multidimensional array, validating that the shape
    /// accounts for every element.
    ///
    /// # Errors
    ///
    /// - `CodecError::ShapeMismatch` - If the dimension product differs from the element count
    pub fn new(
        dimensions: Vec<u64>,
        order: MemoryOrder,
        contents: NdContents,
    ) -> Result<Self, CodecError> {
        let expected: u64 = dimensions.iter().product();
        let elements = contents.element_count();
        if expected != elements as u64 {
            return Err(CodecError::ShapeMismatch {
                elements,
                dimensions,
            });
        }
        Ok(Self {
            dimensions,
            order,
            contents,
        })
    }

    /// Dimension sizes, outermost first.
    pub fn dimensions(&self) -> &[u64] {
        &self.dimensions
    }

    /// Element ordering of the flat contents.
    pub fn order(&self) -> MemoryOrder {
        self.order
    }

    /// Flat contents.
    pub fn contents(&self) -> &NdContents {
        &self.contents
    }

    /// Re-encodes as a tagged CBOR value (tag 40 or 1040).
    pub fn into_value(self) -> Value {
        let tag = match self.order {
            MemoryOrder::RowMajor => MULTI_DIM_ROW_MAJOR_TAG,
            MemoryOrder::ColumnMajor => MULTI_DIM_COLUMN_MAJOR_TAG,
        };
        let dimensions = Value::Array(
            self.dimensions
                .into_iter()
                .map(|d| Value::Integer(d.into()))
                .collect(),
        );
        let contents = match self.contents {
            NdContents::Typed(array) => array.into_value(),
            NdContents::Values(values) => Value::Array(values),
        };
        Value::Tag(tag, Box::new(Value::Array(vec![dimensions, contents])))
    }
}

/// Result of decoding one tagged value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Tag 40/1040: reshaped multidimensional array.
    MultiDim(NdArray),
    /// Tags 64-87: typed flat buffer.
    Typed(TypedArray),
    /// Tag 56500: vendor compression envelope. Decompression is out of
    /// scope; `data` is the still-encoded payload, passed through
    /// unmodified by contract.
    Compressed {
        algorithm: Value,
        elem_size: u64,
        data: Vec<u8>,
    },
    /// Any tag outside the table, kept as-is (lenient decoding).
    Unknown(u64, Value),
}

/// Decodes a single tagged CBOR value against the stream2 tag table.
///
/// # Errors
///
/// - `CodecError::ExpectedByteString` - If a typed-array tag carries a non-bytes payload
/// - `CodecError::MalformedMultiDim` - If tag 40/1040 payload is not a `[dimensions, contents]` pair
/// - `CodecError::MalformedCompression` - If tag 56500 payload is not an `[algorithm, elem_size, bytes]` triple
/// - `CodecError::ShapeMismatch` - If array dimensions disagree with the element count
pub fn decode_tag(tag: u64, payload: Value) -> Result<TagValue, CodecError> {
    if let Some((element, order)) = element_type_for_tag(tag) {
        let Value::Bytes(data) = payload else {
            return Err(CodecError::ExpectedByteString { tag });
        };
        return Ok(TagValue::Typed(TypedArray::new(element, order, data)?));
    }

    match tag {
        MULTI_DIM_ROW_MAJOR_TAG => decode_multi_dim(tag, payload, MemoryOrder::RowMajor),
        MULTI_DIM_COLUMN_MAJOR_TAG => decode_multi_dim(tag, payload, MemoryOrder::ColumnMajor),
        COMPRESSION_TAG => decode_compression(payload),
        _ => Ok(TagValue::Unknown(tag, payload)),
    }
}

fn decode_multi_dim(tag: u64, payload: Value, order: MemoryOrder) -> Result<TagValue, CodecError> {
    let Value::Array(mut parts) = payload else {
        return Err(CodecError::MalformedMultiDim { tag });
    };
    if parts.len() != 2 {
        return Err(CodecError::MalformedMultiDim { tag });
    }
    let (Some(contents), Some(dimensions)) = (parts.pop(), parts.pop()) else {
        return Err(CodecError::MalformedMultiDim { tag });
    };

    let Value::Array(dimension_values) = dimensions else {
        return Err(CodecError::MalformedMultiDim { tag });
    };
    let dimensions = dimension_values
        .into_iter()
        .map(|v| match v {
            Value::Integer(i) => u64::try_from(i).ok(),
            _ => None,
        })
        .collect::<Option<Vec<u64>>>()
        .ok_or(CodecError::MalformedMultiDim { tag })?;

    let contents = match contents {
        Value::Array(values) => NdContents::Values(values),
        Value::Tag(inner_tag, inner) => match decode_tag(inner_tag, *inner)? {
            TagValue::Typed(array) => NdContents::Typed(array),
            _ => return Err(CodecError::MalformedMultiDim { tag }),
        },
        _ => return Err(CodecError::MalformedMultiDim { tag }),
    };

    Ok(TagValue::MultiDim(NdArray::new(
        dimensions, order, contents,
    )?))
}

fn decode_compression(payload: Value) -> Result<TagValue, CodecError> {
    let malformed = || CodecError::MalformedCompression {
        tag: COMPRESSION_TAG,
    };
    let Value::Array(mut parts) = payload else {
        return Err(malformed());
    };
    if parts.len() != 3 {
        return Err(malformed());
    }
    let encoded = parts.pop();
    let elem_size = parts.pop();
    let algorithm = parts.pop();

    let Some(Value::Bytes(data)) = encoded else {
        return Err(malformed());
    };
    let elem_size = match elem_size {
        Some(Value::Integer(i)) => u64::try_from(i).map_err(|_| malformed())?,
        _ => return Err(malformed()),
    };
    let algorithm = algorithm.ok_or_else(malformed)?;

    Ok(TagValue::Compressed {
        algorithm,
        elem_size,
        data,
    })
}

/// Recursively resolves recognized tags inside a decoded CBOR tree.
///
/// Used when reading fixture templates: typed arrays and compression
/// envelopes collapse to their raw byte strings, multidimensional
/// arrays to their flat contents, and unrecognized tags are kept
/// untouched. Engines overwrite the large array fields afterwards, so
/// only the bytes matter template-side.
///
/// # Errors
///
/// - `CodecError` - If a recognized tag carries a malformed payload
pub fn resolve_tags(value: Value) -> Result<Value, CodecError> {
    match value {
        Value::Tag(tag, inner) => {
            let inner = resolve_tags(*inner)?;
            let resolved = match decode_tag(tag, inner)? {
                TagValue::Typed(array) => Value::Bytes(array.into_bytes()),
                TagValue::MultiDim(array) => match array.contents {
                    NdContents::Typed(typed) => Value::Bytes(typed.into_bytes()),
                    NdContents::Values(values) => Value::Array(values),
                },
                TagValue::Compressed { data, .. } => Value::Bytes(data),
                TagValue::Unknown(tag, payload) => Value::Tag(tag, Box::new(payload)),
            };
            Ok(resolved)
        }
        Value::Array(values) => Ok(Value::Array(
            values
                .into_iter()
                .map(resolve_tags)
                .collect::<Result<_, _>>()?,
        )),
        Value::Map(entries) => Ok(Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| Ok((k, resolve_tags(v)?)))
                .collect::<Result<_, CodecError>>()?,
        )),
        other => Ok(other),
    }
}

/// Wraps a value in the self-describe CBOR envelope tag and encodes it.
///
/// # Errors
///
/// - `StreamError::Serialization` - If CBOR encoding fails
pub fn encode_enveloped(value: &Value) -> Result<Vec<u8>, StreamError> {
    let enveloped = ciborium::tag::Required::<&Value, SELF_DESCRIBE_TAG>(value);
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&enveloped, &mut buf).map_err(|e| StreamError::Serialization {
        reason: e.to_string(),
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every typed-array tag the detector emits.
    const TYPED_TAGS: [u64; 23] = [
        64, 65, 66, 67, 68, 69, 70, 71, 72, 73, 74, 75, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86,
        87,
    ];

    #[test]
    fn test_typed_tag_table_excludes_76() {
        assert!(element_type_for_tag(76).is_none());
        for tag in TYPED_TAGS {
            assert!(element_type_for_tag(tag).is_some(), "tag {tag} missing");
        }
    }

    #[test]
    fn test_typed_array_decode() {
        let payload = Value::Bytes(vec![0, 1, 0, 2]);
        let decoded = decode_tag(69, payload).unwrap();

        let TagValue::Typed(array) = decoded else {
            panic!("expected typed array");
        };
        assert_eq!(array.element(), ElementType::Uint16);
        assert_eq!(array.order(), ByteOrder::Little);
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn test_typed_array_rejects_non_bytes() {
        let payload = Value::Text("not bytes".to_string());
        let result = decode_tag(69, payload);
        assert!(matches!(
            result,
            Err(CodecError::ExpectedByteString { tag: 69 })
        ));
    }

    #[test]
    fn test_typed_array_rejects_misaligned_buffer() {
        let result = decode_tag(70, Value::Bytes(vec![0, 1, 2]));
        assert!(matches!(result, Err(CodecError::MisalignedBuffer { .. })));
    }

    #[test]
    fn test_multi_dim_reshape_row_and_column_major() {
        for (tag, order) in [(40, MemoryOrder::RowMajor), (1040, MemoryOrder::ColumnMajor)] {
            let payload = Value::Array(vec![
                Value::Array(vec![Value::Integer(2.into()), Value::Integer(3.into())]),
                Value::Tag(64, Box::new(Value::Bytes(vec![1, 2, 3, 4, 5, 6]))),
            ]);
            let TagValue::MultiDim(array) = decode_tag(tag, payload).unwrap() else {
                panic!("expected multidim array");
            };
            assert_eq!(array.dimensions(), &[2, 3]);
            assert_eq!(array.order(), order);
        }
    }

    #[test]
    fn test_multi_dim_shape_mismatch() {
        let payload = Value::Array(vec![
            Value::Array(vec![Value::Integer(2.into()), Value::Integer(2.into())]),
            Value::Tag(64, Box::new(Value::Bytes(vec![1, 2, 3]))),
        ]);
        let result = decode_tag(40, payload);
        assert!(matches!(result, Err(CodecError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_compression_payload_passes_through() {
        let encoded = vec![0xde, 0xad, 0xbe, 0xef];
        let payload = Value::Array(vec![
            Value::Text("bslz4".to_string()),
            Value::Integer(2.into()),
            Value::Bytes(encoded.clone()),
        ]);

        let TagValue::Compressed {
            elem_size, data, ..
        } = decode_tag(COMPRESSION_TAG, payload).unwrap()
        else {
            panic!("expected compression envelope");
        };
        assert_eq!(elem_size, 2);
        assert_eq!(data, encoded);
    }

    #[test]
    fn test_unknown_tag_is_lenient() {
        let payload = Value::Text("opaque".to_string());
        let decoded = decode_tag(9999, payload.clone()).unwrap();
        assert_eq!(decoded, TagValue::Unknown(9999, payload));
    }

    #[test]
    fn test_typed_round_trip_preserves_interpretation() {
        for tag in TYPED_TAGS {
            let (element, order) = element_type_for_tag(tag).unwrap();
            let data = vec![0u8; element.byte_width() * 4];
            let array = TypedArray::new(element, order, data).unwrap();

            let encoded = array.clone().into_value();
            let Value::Tag(encoded_tag, payload) = encoded else {
                panic!("expected tagged value");
            };
            let TagValue::Typed(decoded) = decode_tag(encoded_tag, *payload).unwrap() else {
                panic!("expected typed array");
            };

            assert_eq!(decoded.element(), element);
            assert_eq!(decoded.order(), order);
            assert_eq!(decoded.len(), 4);
        }
    }

    #[test]
    fn test_multi_dim_round_trip_preserves_shape() {
        for order in [MemoryOrder::RowMajor, MemoryOrder::ColumnMajor] {
            let typed = TypedArray::new(
                ElementType::Float32,
                ByteOrder::Little,
                vec![0u8; 4 * 6],
            )
            .unwrap();
            let array = NdArray::new(vec![2, 3], order, NdContents::Typed(typed)).unwrap();

            let Value::Tag(tag, payload) = array.clone().into_value() else {
                panic!("expected tagged value");
            };
            let TagValue::MultiDim(decoded) = decode_tag(tag, *payload).unwrap() else {
                panic!("expected multidim array");
            };

            assert_eq!(decoded.dimensions(), &[2, 3]);
            assert_eq!(decoded.order(), order);
        }
    }

    #[test]
    fn test_resolve_tags_collapses_known_tags() {
        let tree = Value::Map(vec![
            (
                Value::Text("flatfield".to_string()),
                Value::Tag(85, Box::new(Value::Bytes(vec![0; 8]))),
            ),
            (
                Value::Text("note".to_string()),
                Value::Tag(4242, Box::new(Value::Text("kept".to_string()))),
            ),
        ]);

        let resolved = resolve_tags(tree).unwrap();
        let Value::Map(entries) = resolved else {
            panic!("expected map");
        };
        assert_eq!(entries[0].1, Value::Bytes(vec![0; 8]));
        assert!(matches!(entries[1].1, Value::Tag(4242, _)));
    }

    #[test]
    fn test_envelope_wraps_with_self_describe_tag() {
        let encoded = encode_enveloped(&Value::Integer(1.into())).unwrap();
        let decoded: Value = ciborium::de::from_reader(encoded.as_slice()).unwrap();
        assert!(matches!(decoded, Value::Tag(SELF_DESCRIBE_TAG, _)));
    }
}
