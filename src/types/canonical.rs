use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// Logical type tag every backend coerces to and from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    /// Integer that fits in 64 bits.
    SmallInt,
    /// Integer that may exceed 64 bits.
    BigInt,
    Float,
    Decimal,
    Boolean,
    String,
    Bytes,
    Date,
    /// A point in time; the native column may be TIME, TIMESTAMP, DATE or text.
    Time,
    Timestamp,
    /// Name of a host-side class, resolved by the host.
    ClassRef,
    SerializedObject,
    Regex,
    Nil,
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SmallInt => "SmallInt",
            Self::BigInt => "BigInt",
            Self::Float => "Float",
            Self::Decimal => "Decimal",
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::Bytes => "Bytes",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::Timestamp => "Timestamp",
            Self::ClassRef => "ClassRef",
            Self::SerializedObject => "SerializedObject",
            Self::Regex => "Regex",
            Self::Nil => "Nil",
        };
        f.write_str(name)
    }
}

/// A backend-agnostic value. Decoding produces these; binding consumes them.
/// Building host-native objects from them is left to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Nil,
    SmallInt(i64),
    /// Only produced for values outside the `i64` range.
    BigInt(i128),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveDateTime),
    Timestamp(NaiveDateTime),
    ClassRef(String),
    SerializedObject(serde_json::Value),
    /// Regular expression source text.
    Regex(String),
}

impl CanonicalValue {
    /// Normalize an integer: values that fit in 64 bits become `SmallInt`.
    pub fn integer(value: i128) -> Self {
        match i64::try_from(value) {
            Ok(v) => Self::SmallInt(v),
            Err(_) => Self::BigInt(value),
        }
    }

    #[inline]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn canonical_type(&self) -> CanonicalType {
        match self {
            Self::Nil => CanonicalType::Nil,
            Self::SmallInt(_) => CanonicalType::SmallInt,
            Self::BigInt(_) => CanonicalType::BigInt,
            Self::Float(_) => CanonicalType::Float,
            Self::Decimal(_) => CanonicalType::Decimal,
            Self::Boolean(_) => CanonicalType::Boolean,
            Self::String(_) => CanonicalType::String,
            Self::Bytes(_) => CanonicalType::Bytes,
            Self::Date(_) => CanonicalType::Date,
            Self::Time(_) => CanonicalType::Time,
            Self::Timestamp(_) => CanonicalType::Timestamp,
            Self::ClassRef(_) => CanonicalType::ClassRef,
            Self::SerializedObject(_) => CanonicalType::SerializedObject,
            Self::Regex(_) => CanonicalType::Regex,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SmallInt(v) => Some(*v),
            Self::BigInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::SmallInt(v) => Some(i128::from(*v)),
            Self::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::ClassRef(s) | Self::Regex(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i32> for CanonicalValue {
    fn from(value: i32) -> Self {
        Self::SmallInt(i64::from(value))
    }
}

impl From<i64> for CanonicalValue {
    fn from(value: i64) -> Self {
        Self::SmallInt(value)
    }
}

impl From<i128> for CanonicalValue {
    fn from(value: i128) -> Self {
        Self::integer(value)
    }
}

impl From<f64> for CanonicalValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for CanonicalValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for CanonicalValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for CanonicalValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for CanonicalValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<NaiveDate> for CanonicalValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<CanonicalValue>> From<Option<T>> for CanonicalValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Self::Nil,
        }
    }
}
