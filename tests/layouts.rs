//! Format-string bijection and schema-level properties that don't belong to
//! any one array layout: every `DataType` round-trips through its own
//! format string, and the buffer/bitmap layer holds its alignment and
//! growth contract independent of any array built on top of it.

use arrow_core::buffer::{align_up, AlignedBuffer, ALIGNMENT};
use arrow_core::{Bitmap, DataType, TimeUnit};

fn assert_format_round_trips(dt: DataType) {
    let format = dt.format_string();
    let parsed = DataType::from_format(&format).unwrap();
    assert_eq!(parsed, dt, "format '{format}' did not round-trip");
}

#[test]
fn scalar_format_strings_round_trip() {
    for dt in [
        DataType::Null,
        DataType::Boolean,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Float16,
        DataType::Float32,
        DataType::Float64,
        DataType::Utf8,
        DataType::LargeUtf8,
        DataType::Binary,
        DataType::LargeBinary,
        DataType::Utf8View,
        DataType::BinaryView,
        DataType::List,
        DataType::LargeList,
        DataType::ListView,
        DataType::LargeListView,
        DataType::Struct,
        DataType::Map,
        DataType::RunEndEncoded,
    ] {
        assert_format_round_trips(dt);
    }
}

#[test]
fn parametric_format_strings_round_trip() {
    assert_format_round_trips(DataType::FixedSizeBinary(16));
    assert_format_round_trips(DataType::FixedSizeList(4));
    assert_format_round_trips(DataType::DenseUnion(vec![0, 1, 2]));
    assert_format_round_trips(DataType::SparseUnion(vec![3, 7]));
    assert_format_round_trips(DataType::Decimal {
        precision: 38,
        scale: 10,
        width: 128,
    });
    assert_format_round_trips(DataType::Timestamp(TimeUnit::Microsecond, None));
    assert_format_round_trips(DataType::Timestamp(
        TimeUnit::Nanosecond,
        Some("UTC".to_string()),
    ));
    assert_format_round_trips(DataType::Duration(TimeUnit::Millisecond));
}

#[test]
fn unrecognized_format_string_is_an_error() {
    assert!(DataType::from_format("not-a-real-format").is_err());
}

#[test]
fn aligned_buffer_allocations_stay_64_byte_aligned_through_growth() {
    let mut buf: AlignedBuffer<u8> = AlignedBuffer::new();
    for round in 0..10 {
        buf.extend_from_slice(&vec![round as u8; 37]);
        let ptr = buf.as_slice().as_ptr();
        assert_eq!(
            (ptr as usize) % ALIGNMENT,
            0,
            "buffer not aligned after round {round}"
        );
    }
}

#[test]
fn align_up_rounds_to_the_next_alignment_boundary() {
    assert_eq!(align_up(0), 0);
    assert_eq!(align_up(1), ALIGNMENT);
    assert_eq!(align_up(ALIGNMENT), ALIGNMENT);
    assert_eq!(align_up(ALIGNMENT + 1), 2 * ALIGNMENT);
}

#[test]
fn bitmap_tracks_unset_count_as_bits_flip() {
    let mut bm = Bitmap::new(8, true);
    assert_eq!(bm.count_unset(), 0);
    bm.set(2, false);
    bm.set(5, false);
    assert_eq!(bm.count_unset(), 2);
    assert!(!bm.get(2));
    assert!(bm.get(3));
}
