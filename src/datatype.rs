//! The closed enumeration of logical types and the format-string grammar
//! that names them at the C Data Interface boundary.
//!
//! `DataType::from_format` / `DataType::format_string` form a bijection for
//! every format string the grammar recognizes: parsing is total for legal
//! inputs, and two distinct `DataType`s never share a format string.
//! Dictionary encoding is intentionally *not* a `DataType` variant: per the
//! C Data Interface, a dictionary-encoded array's format string names its
//! *index* type, and "this array is dictionary-encoded" is signaled out of
//! band by the schema's `dictionary` pointer being non-null. The array layer
//! (`crate::array::dictionary`) combines the two; see `DESIGN.md`.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TimeUnit {
    fn code(self) -> char {
        match self {
            TimeUnit::Second => 's',
            TimeUnit::Millisecond => 'm',
            TimeUnit::Microsecond => 'u',
            TimeUnit::Nanosecond => 'n',
        }
    }

    fn from_code(c: char) -> Result<Self> {
        Ok(match c {
            's' => TimeUnit::Second,
            'm' => TimeUnit::Millisecond,
            'u' => TimeUnit::Microsecond,
            'n' => TimeUnit::Nanosecond,
            other => return Err(Error::format_mismatch(format!("unknown time unit '{other}'"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Utf8,
    LargeUtf8,
    Binary,
    LargeBinary,
    Utf8View,
    BinaryView,
    FixedSizeBinary(i32),
    DateDays,
    DateMillis,
    Timestamp(TimeUnit, Option<String>),
    Duration(TimeUnit),
    IntervalMonths,
    IntervalDayTime,
    IntervalMonthDayNano,
    Decimal {
        precision: u8,
        scale: i8,
        width: u16,
    },
    List,
    LargeList,
    ListView,
    LargeListView,
    FixedSizeList(i32),
    Struct,
    Map,
    DenseUnion(Vec<i8>),
    SparseUnion(Vec<i8>),
    RunEndEncoded,
}

impl DataType {
    /// Parses a C Data Interface format string into a [`DataType`].
    ///
    /// # Errors
    /// Returns [`Error::FormatMismatch`] for any string outside the grammar
    /// in `# 4.5`.
    pub fn from_format(format: &str) -> Result<DataType> {
        Ok(match format {
            "n" => DataType::Null,
            "b" => DataType::Boolean,
            "c" => DataType::Int8,
            "s" => DataType::Int16,
            "i" => DataType::Int32,
            "l" => DataType::Int64,
            "C" => DataType::UInt8,
            "S" => DataType::UInt16,
            "I" => DataType::UInt32,
            "L" => DataType::UInt64,
            "e" => DataType::Float16,
            "f" => DataType::Float32,
            "g" => DataType::Float64,
            "u" => DataType::Utf8,
            "U" => DataType::LargeUtf8,
            "z" => DataType::Binary,
            "Z" => DataType::LargeBinary,
            "vu" => DataType::Utf8View,
            "vz" => DataType::BinaryView,
            "tdD" => DataType::DateDays,
            "tdm" => DataType::DateMillis,
            "tiM" => DataType::IntervalMonths,
            "tiD" => DataType::IntervalDayTime,
            "tin" => DataType::IntervalMonthDayNano,
            "+l" => DataType::List,
            "+L" => DataType::LargeList,
            "+vl" => DataType::ListView,
            "+vL" => DataType::LargeListView,
            "+s" => DataType::Struct,
            "+m" => DataType::Map,
            "+r" => DataType::RunEndEncoded,
            _ => return Self::from_format_parametric(format),
        })
    }

    fn from_format_parametric(format: &str) -> Result<DataType> {
        if let Some(rest) = format.strip_prefix("tss:") {
            return Ok(DataType::Timestamp(TimeUnit::Second, tz(rest)));
        }
        if let Some(rest) = format.strip_prefix("tsm:") {
            return Ok(DataType::Timestamp(TimeUnit::Millisecond, tz(rest)));
        }
        if let Some(rest) = format.strip_prefix("tsu:") {
            return Ok(DataType::Timestamp(TimeUnit::Microsecond, tz(rest)));
        }
        if let Some(rest) = format.strip_prefix("tsn:") {
            return Ok(DataType::Timestamp(TimeUnit::Nanosecond, tz(rest)));
        }
        if let Some(rest) = format.strip_prefix("tD") {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                if chars.next().is_none() {
                    return Ok(DataType::Duration(TimeUnit::from_code(c)?));
                }
            }
        }
        if let Some(rest) = format.strip_prefix("+w:") {
            let k: i32 = rest
                .parse()
                .map_err(|_| Error::format_mismatch(format!("bad fixed-size-list width in '{format}'")))?;
            return Ok(DataType::FixedSizeList(k));
        }
        if let Some(rest) = format.strip_prefix("+ud:") {
            return Ok(DataType::DenseUnion(parse_type_ids(rest)?));
        }
        if let Some(rest) = format.strip_prefix("+us:") {
            return Ok(DataType::SparseUnion(parse_type_ids(rest)?));
        }
        if let Some(rest) = format.strip_prefix("d:") {
            return parse_decimal(rest);
        }
        if let Some(rest) = format.strip_prefix("w:") {
            let w: i32 = rest
                .parse()
                .map_err(|_| Error::format_mismatch(format!("bad fixed-width-binary width in '{format}'")))?;
            return Ok(DataType::FixedSizeBinary(w));
        }
        Err(Error::format_mismatch(format!("unrecognized format string '{format}'")))
    }

    /// Renders the canonical format string for this type.
    #[must_use]
    pub fn format_string(&self) -> String {
        match self {
            DataType::Null => "n".into(),
            DataType::Boolean => "b".into(),
            DataType::Int8 => "c".into(),
            DataType::Int16 => "s".into(),
            DataType::Int32 => "i".into(),
            DataType::Int64 => "l".into(),
            DataType::UInt8 => "C".into(),
            DataType::UInt16 => "S".into(),
            DataType::UInt32 => "I".into(),
            DataType::UInt64 => "L".into(),
            DataType::Float16 => "e".into(),
            DataType::Float32 => "f".into(),
            DataType::Float64 => "g".into(),
            DataType::Utf8 => "u".into(),
            DataType::LargeUtf8 => "U".into(),
            DataType::Binary => "z".into(),
            DataType::LargeBinary => "Z".into(),
            DataType::Utf8View => "vu".into(),
            DataType::BinaryView => "vz".into(),
            DataType::FixedSizeBinary(w) => format!("w:{w}"),
            DataType::DateDays => "tdD".into(),
            DataType::DateMillis => "tdm".into(),
            DataType::Timestamp(unit, tz) => {
                format!("ts{}:{}", unit.code(), tz.as_deref().unwrap_or(""))
            }
            DataType::Duration(unit) => format!("tD{}", unit.code()),
            DataType::IntervalMonths => "tiM".into(),
            DataType::IntervalDayTime => "tiD".into(),
            DataType::IntervalMonthDayNano => "tin".into(),
            DataType::Decimal {
                precision,
                scale,
                width,
            } => {
                if *width == 128 {
                    format!("d:{precision},{scale}")
                } else {
                    format!("d:{precision},{scale},{width}")
                }
            }
            DataType::List => "+l".into(),
            DataType::LargeList => "+L".into(),
            DataType::ListView => "+vl".into(),
            DataType::LargeListView => "+vL".into(),
            DataType::FixedSizeList(k) => format!("+w:{k}"),
            DataType::Struct => "+s".into(),
            DataType::Map => "+m".into(),
            DataType::DenseUnion(ids) => format!("+ud:{}", join_ids(ids)),
            DataType::SparseUnion(ids) => format!("+us:{}", join_ids(ids)),
            DataType::RunEndEncoded => "+r".into(),
        }
    }

    /// Whether this layout carries its own validity bitmap buffer.
    ///
    /// `Struct` does: the struct layout's own top-level bitmap sits
    /// alongside each child's independent bitmap, marking whole rows null
    /// regardless of what any individual field says.
    #[must_use]
    pub fn has_validity_bitmap(&self) -> bool {
        !matches!(
            self,
            DataType::Null | DataType::DenseUnion(_) | DataType::SparseUnion(_) | DataType::RunEndEncoded
        )
    }
}

fn tz(rest: &str) -> Option<String> {
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

fn join_ids(ids: &[i8]) -> String {
    ids.iter()
        .map(i8::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_type_ids(rest: &str) -> Result<Vec<i8>> {
    rest.split(',')
        .map(|s| {
            s.parse::<i8>()
                .map_err(|_| Error::format_mismatch(format!("bad union type id '{s}'")))
        })
        .collect()
}

fn parse_decimal(rest: &str) -> Result<DataType> {
    let parts: Vec<&str> = rest.split(',').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(Error::format_mismatch(format!("bad decimal format 'd:{rest}'")));
    }
    let precision: u8 = parts[0]
        .parse()
        .map_err(|_| Error::format_mismatch(format!("bad decimal precision in 'd:{rest}'")))?;
    let scale: i8 = parts[1]
        .parse()
        .map_err(|_| Error::format_mismatch(format!("bad decimal scale in 'd:{rest}'")))?;
    let width: u16 = if parts.len() == 3 {
        parts[2]
            .parse()
            .map_err(|_| Error::format_mismatch(format!("bad decimal width in 'd:{rest}'")))?
    } else {
        128
    };
    if !matches!(width, 32 | 64 | 128 | 256) {
        return Err(Error::format_mismatch(format!("unsupported decimal width {width}")));
    }
    Ok(DataType::Decimal {
        precision,
        scale,
        width,
    })
}

/// Builds the `map(type_id) -> child_index` table a union layout needs from
/// the type-id list carried in its format string.
#[must_use]
pub fn union_child_index_map(type_ids: &[i8]) -> std::collections::HashMap<i8, usize> {
    type_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect()
}
