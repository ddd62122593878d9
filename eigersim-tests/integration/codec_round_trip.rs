//! Round-trip coverage of the stream2 tag table.
//!
//! Encoding a typed or multidimensional array and decoding it through
//! the tag table must reproduce the element type, byte order, and
//! shape exactly; a consumer reinterprets the raw bytes from that
//! metadata alone.

use ciborium::value::Value;
use eigersim_core::stream::codec::{
    MemoryOrder, NdArray, NdContents, TagValue, TypedArray, decode_tag, element_type_for_tag,
};
use proptest::prelude::*;

/// Typed-array tags of the stream2 wire format (64-87 excluding 76).
const TYPED_TAGS: [u64; 23] = [
    64, 65, 66, 67, 68, 69, 70, 71, 72, 73, 74, 75, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86, 87,
];

#[test]
fn test_every_typed_tag_round_trips() {
    for tag in TYPED_TAGS {
        let (element, order) = element_type_for_tag(tag).unwrap();
        let array =
            TypedArray::new(element, order, vec![0xAB; element.byte_width() * 7]).unwrap();

        let Value::Tag(encoded_tag, payload) = array.clone().into_value() else {
            panic!("typed array did not encode to a tag");
        };
        let TagValue::Typed(decoded) = decode_tag(encoded_tag, *payload).unwrap() else {
            panic!("tag {encoded_tag} did not decode to a typed array");
        };

        assert_eq!(decoded.element(), element, "element type for tag {tag}");
        assert_eq!(decoded.order(), order, "byte order for tag {tag}");
        assert_eq!(decoded.len(), 7, "element count for tag {tag}");
        assert_eq!(decoded.as_bytes(), array.as_bytes());
    }
}

#[test]
fn test_multi_dim_tags_round_trip_shape() {
    for (order, dimensions) in [
        (MemoryOrder::RowMajor, vec![4u64, 8, 2]),
        (MemoryOrder::ColumnMajor, vec![16u64, 4]),
    ] {
        let elements: u64 = dimensions.iter().product();
        let (element, byte_order) = element_type_for_tag(85).unwrap();
        let typed = TypedArray::new(
            element,
            byte_order,
            vec![0; element.byte_width() * elements as usize],
        )
        .unwrap();
        let array = NdArray::new(dimensions.clone(), order, NdContents::Typed(typed)).unwrap();

        let Value::Tag(tag, payload) = array.into_value() else {
            panic!("nd array did not encode to a tag");
        };
        let TagValue::MultiDim(decoded) = decode_tag(tag, *payload).unwrap() else {
            panic!("tag {tag} did not decode to a multidim array");
        };

        assert_eq!(decoded.dimensions(), dimensions.as_slice());
        assert_eq!(decoded.order(), order);
    }
}

proptest! {
    #[test]
    fn prop_typed_arrays_preserve_bytes(
        tag in proptest::sample::select(TYPED_TAGS.as_slice()),
        elements in 0usize..256,
        fill in any::<u8>(),
    ) {
        let (element, order) = element_type_for_tag(tag).unwrap();
        let data = vec![fill; element.byte_width() * elements];
        let array = TypedArray::new(element, order, data.clone()).unwrap();

        let Value::Tag(encoded_tag, payload) = array.into_value() else {
            panic!("typed array did not encode to a tag");
        };
        let TagValue::Typed(decoded) = decode_tag(encoded_tag, *payload).unwrap() else {
            panic!("decode did not yield a typed array");
        };

        prop_assert_eq!(decoded.element(), element);
        prop_assert_eq!(decoded.order(), order);
        prop_assert_eq!(decoded.len(), elements);
        prop_assert_eq!(decoded.as_bytes(), data.as_slice());
    }

    #[test]
    fn prop_misaligned_buffers_never_decode(
        tag in proptest::sample::select(TYPED_TAGS.as_slice()),
        extra in 1usize..8,
    ) {
        let (element, _) = element_type_for_tag(tag).unwrap();
        prop_assume!(element.byte_width() > 1);
        prop_assume!(extra % element.byte_width() != 0);

        let payload = Value::Bytes(vec![0; element.byte_width() * 3 + extra % element.byte_width()]);
        prop_assert!(decode_tag(tag, payload).is_err());
    }
}
