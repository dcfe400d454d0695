//! Shared decode, bind and inference rules. Backends override individual
//! [`DriverDefinition`] hooks and fall back to these for everything else.

use std::io::{ErrorKind, Read};

use chrono::{NaiveDateTime, SubsecRound};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::NativeError;
use crate::traits::{ColumnStream, DriverDefinition, NativeStatement, ResultAccessor};
use crate::types::{
    CanonicalType, CanonicalValue, ColumnMetadata, IntegerRead, SqlDateTime, SqlType,
};

/// Size of each read from a binary or character column stream.
pub const STREAM_CHUNK_SIZE: usize = 2048;

const UNIX_EPOCH: SqlDateTime = SqlDateTime {
    year: 1970,
    month: 1,
    day: 1,
    hour: 0,
    minute: 0,
    second: 0,
    nanos: 0,
};

/// One hour before the Unix epoch: what a zero TIME reads as under a
/// UTC+1 driver time zone.
const SHIFTED_ZERO_TIME: SqlDateTime = SqlDateTime {
    year: 1969,
    month: 12,
    day: 31,
    hour: 23,
    minute: 0,
    second: 0,
    nanos: 0,
};

pub fn infer_type(column: &ColumnMetadata) -> CanonicalType {
    match column.sql_type {
        SqlType::Bit | SqlType::Boolean => CanonicalType::Boolean,
        SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer => CanonicalType::SmallInt,
        SqlType::BigInt => CanonicalType::BigInt,
        SqlType::Numeric | SqlType::Decimal => match column.scale {
            Some(0) => CanonicalType::SmallInt,
            _ => CanonicalType::Decimal,
        },
        SqlType::Real | SqlType::Float | SqlType::Double => CanonicalType::Float,
        SqlType::Char | SqlType::Varchar | SqlType::LongVarchar | SqlType::Clob => {
            CanonicalType::String
        }
        SqlType::Date => CanonicalType::Date,
        SqlType::Time => CanonicalType::Time,
        SqlType::Timestamp | SqlType::TimestampWithTimeZone => CanonicalType::Timestamp,
        SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary | SqlType::Blob => {
            CanonicalType::Bytes
        }
        SqlType::JavaObject => CanonicalType::SerializedObject,
        SqlType::Null => CanonicalType::Nil,
        SqlType::Other(_) => CanonicalType::String,
    }
}

pub fn decode_column<D: DriverDefinition + ?Sized>(
    def: &D,
    rs: &mut dyn ResultAccessor,
    index: usize,
    ty: CanonicalType,
) -> Result<CanonicalValue, NativeError> {
    match ty {
        CanonicalType::SmallInt | CanonicalType::BigInt => decode_integer(rs, index),
        CanonicalType::Float => Ok(rs
            .get_decimal(index)?
            .and_then(|d| d.to_f64())
            .map_or(CanonicalValue::Nil, CanonicalValue::Float)),
        CanonicalType::Decimal => Ok(rs
            .get_decimal(index)?
            .map_or(CanonicalValue::Nil, CanonicalValue::Decimal)),
        CanonicalType::Boolean => {
            // get_boolean cannot tell NULL from false
            if rs.get_string(index)?.is_none() {
                return Ok(CanonicalValue::Nil);
            }
            Ok(CanonicalValue::Boolean(rs.get_boolean(index)?))
        }
        CanonicalType::Date => match rs.get_date(index)? {
            None => Ok(CanonicalValue::Nil),
            Some(v) if v.is_zero() => Ok(CanonicalValue::Nil),
            Some(v) => v
                .to_date()
                .map(CanonicalValue::Date)
                .ok_or_else(|| invalid_datetime(&v)),
        },
        CanonicalType::Timestamp => match rs.get_timestamp(index)? {
            None => Ok(CanonicalValue::Nil),
            Some(v) if def.is_null_timestamp(&v) => Ok(CanonicalValue::Nil),
            Some(v) => v
                .to_datetime()
                .map(|dt| CanonicalValue::Timestamp(dt.trunc_subsecs(3)))
                .ok_or_else(|| invalid_datetime(&v)),
        },
        CanonicalType::Time => decode_time(def, rs, index),
        CanonicalType::Bytes => match rs.binary_stream(index)? {
            None => Ok(CanonicalValue::Nil),
            Some(stream) => {
                let mut guard = StreamGuard::new(stream);
                let bytes = guard.read_all()?;
                guard.close()?;
                Ok(CanonicalValue::Bytes(bytes))
            }
        },
        CanonicalType::ClassRef => Ok(rs
            .get_string(index)?
            .map_or(CanonicalValue::Nil, CanonicalValue::ClassRef)),
        CanonicalType::SerializedObject => decode_serialized(rs, index),
        CanonicalType::Nil => Ok(CanonicalValue::Nil),
        CanonicalType::Regex => Ok(rs
            .get_string(index)?
            .map_or(CanonicalValue::Nil, CanonicalValue::Regex)),
        CanonicalType::String => Ok(rs
            .get_string(index)?
            .map_or(CanonicalValue::Nil, CanonicalValue::String)),
    }
}

/// Read a 64-bit integer, re-reading at decimal precision on overflow.
pub fn decode_integer(
    rs: &mut dyn ResultAccessor,
    index: usize,
) -> Result<CanonicalValue, NativeError> {
    match rs.get_long(index)? {
        IntegerRead::Value(v) => Ok(CanonicalValue::SmallInt(v)),
        IntegerRead::Null => Ok(CanonicalValue::Nil),
        IntegerRead::Overflow => match rs.get_decimal(index)? {
            None => Ok(CanonicalValue::Nil),
            Some(d) => decimal_to_integer(d),
        },
    }
}

pub(crate) fn decimal_to_integer(value: Decimal) -> Result<CanonicalValue, NativeError> {
    value
        .trunc()
        .to_i128()
        .map(CanonicalValue::integer)
        .ok_or_else(|| out_of_range(&value.to_string()))
}

fn decode_time<D: DriverDefinition + ?Sized>(
    def: &D,
    rs: &mut dyn ResultAccessor,
    index: usize,
) -> Result<CanonicalValue, NativeError> {
    let column = rs.column_metadata(index)?;
    let value = match column.sql_type {
        SqlType::Time => rs.get_time(index)?,
        SqlType::Timestamp | SqlType::TimestampWithTimeZone => rs.get_timestamp(index)?,
        SqlType::Date => rs.get_date(index)?,
        _ => {
            return Ok(rs
                .get_string(index)?
                .map_or(CanonicalValue::Nil, CanonicalValue::String))
        }
    };
    time_value(def, value)
}

/// Convert a native time-of-day, timestamp or date read into a `Time` value.
pub fn time_value<D: DriverDefinition + ?Sized>(
    def: &D,
    value: Option<SqlDateTime>,
) -> Result<CanonicalValue, NativeError> {
    let Some(value) = value else {
        return Ok(CanonicalValue::Nil);
    };
    if value.is_zero() {
        return Ok(CanonicalValue::Nil);
    }
    // A bare time of day carries no date; anchor it at the epoch.
    let anchored = if value.year == 0 && value.month == 0 && value.day == 0 {
        SqlDateTime {
            year: 1970,
            month: 1,
            day: 1,
            ..value
        }
    } else {
        value
    };
    let dt = anchored
        .to_datetime()
        .ok_or_else(|| invalid_datetime(&value))?;
    if def.is_null_time(dt) {
        return Ok(CanonicalValue::Nil);
    }
    Ok(CanonicalValue::Time(dt.trunc_subsecs(3)))
}

fn decode_serialized(
    rs: &mut dyn ResultAccessor,
    index: usize,
) -> Result<CanonicalValue, NativeError> {
    let Some(stream) = rs.ascii_stream(index)? else {
        return Ok(CanonicalValue::Nil);
    };
    let mut guard = StreamGuard::new(stream);
    let read = guard.read_all();
    guard.close()?;

    let parsed = read.and_then(|bytes| {
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .map_err(|e| NativeError::new(format!("malformed serialized object: {e}")))
    });
    match parsed {
        Ok(value) => Ok(CanonicalValue::SerializedObject(value)),
        Err(err) => {
            tracing::warn!(column = index, error = %err, "discarding undecodable serialized object");
            Ok(CanonicalValue::Nil)
        }
    }
}

/// Closes the wrapped stream when dropped, unless closed explicitly first.
pub(crate) struct StreamGuard {
    stream: Box<dyn ColumnStream>,
    closed: bool,
}

impl StreamGuard {
    pub(crate) fn new(stream: Box<dyn ColumnStream>) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    pub(crate) fn read_all(&mut self) -> Result<Vec<u8>, NativeError> {
        let mut bytes = Vec::with_capacity(STREAM_CHUNK_SIZE);
        let mut chunk = [0_u8; STREAM_CHUNK_SIZE];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(bytes),
                Ok(n) => bytes.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(NativeError::io(e)),
            }
        }
    }

    pub(crate) fn close(mut self) -> Result<(), NativeError> {
        self.closed = true;
        self.stream.close().map_err(NativeError::io)
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.stream.close() {
                tracing::warn!(error = %e, "failed to close column stream");
            }
        }
    }
}

pub fn bind_parameter(
    stmt: &mut dyn NativeStatement,
    value: &CanonicalValue,
    slot: usize,
) -> Result<(), NativeError> {
    match value {
        CanonicalValue::SmallInt(v) => match i32::try_from(*v) {
            Ok(small) => stmt.set_int(slot, small),
            Err(_) => stmt.set_long(slot, *v),
        },
        CanonicalValue::BigInt(v) => match i64::try_from(*v) {
            Ok(long) => stmt.set_long(slot, long),
            Err(_) => {
                let decimal = Decimal::try_from_i128_with_scale(*v, 0)
                    .map_err(|_| out_of_range(&v.to_string()))?;
                stmt.set_decimal(slot, decimal)
            }
        },
        CanonicalValue::Float(v) => stmt.set_double(slot, *v),
        CanonicalValue::Decimal(v) => stmt.set_decimal(slot, *v),
        CanonicalValue::Nil => {
            let sql_type = stmt.parameter_type(slot)?;
            stmt.set_null(slot, sql_type)
        }
        CanonicalValue::Boolean(v) => stmt.set_boolean(slot, *v),
        CanonicalValue::String(s) | CanonicalValue::ClassRef(s) | CanonicalValue::Regex(s) => {
            stmt.set_string(slot, s)
        }
        CanonicalValue::Bytes(b) => stmt.set_bytes(slot, b),
        CanonicalValue::Date(d) => stmt.set_date(slot, SqlDateTime::from(*d)),
        CanonicalValue::Time(t) | CanonicalValue::Timestamp(t) => {
            stmt.set_timestamp(slot, SqlDateTime::from(*t))
        }
        CanonicalValue::SerializedObject(v) => {
            let sql_type = stmt.parameter_type(slot)?;
            stmt.set_object(slot, &v.to_string(), sql_type)
        }
    }
}

pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    quoted.push_str(&value.replace('\'', "''"));
    quoted.push('\'');
    quoted
}

/// Zero-valued timestamps, and the epoch itself, stand in for NULL.
///
/// Backends that store the epoch as a real value override
/// [`DriverDefinition::is_null_timestamp`] instead of using this rule.
pub fn is_null_timestamp(value: &SqlDateTime) -> bool {
    value.is_zero() || *value == UNIX_EPOCH
}

pub fn is_null_time(value: NaiveDateTime) -> bool {
    SqlDateTime::from(value) == SHIFTED_ZERO_TIME
}

/// First column of the first row as an integer, if any.
pub(crate) fn first_long(
    rs: Option<Box<dyn ResultAccessor>>,
) -> Result<Option<i64>, NativeError> {
    let Some(mut rs) = rs else {
        return Ok(None);
    };
    if !rs.next()? {
        return Ok(None);
    }
    match rs.get_long(1)? {
        IntegerRead::Value(v) => Ok(Some(v)),
        IntegerRead::Null | IntegerRead::Overflow => Ok(None),
    }
}

pub(crate) fn invalid_datetime(value: &SqlDateTime) -> NativeError {
    NativeError::new(format!(
        "invalid date/time value: {:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:09}",
        value.year, value.month, value.day, value.hour, value.minute, value.second, value.nanos
    ))
    .with_sql_state("22007")
}

fn out_of_range(value: &str) -> NativeError {
    NativeError::new(format!("numeric value out of range: {value}")).with_sql_state("22003")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_string_doubles_quotes() {
        assert_eq!(quote_string("it's"), "'it''s'");
        assert_eq!(quote_string(""), "''");
    }

    #[test]
    fn test_infer_numeric_scale() {
        let int = ColumnMetadata::new("n", SqlType::Numeric).with_precision(10, 0);
        let dec = ColumnMetadata::new("n", SqlType::Numeric).with_precision(10, 2);
        let bare = ColumnMetadata::new("n", SqlType::Decimal);
        assert_eq!(infer_type(&int), CanonicalType::SmallInt);
        assert_eq!(infer_type(&dec), CanonicalType::Decimal);
        assert_eq!(infer_type(&bare), CanonicalType::Decimal);
        assert_eq!(
            infer_type(&ColumnMetadata::new("b", SqlType::Blob)),
            CanonicalType::Bytes
        );
    }

    #[test]
    fn test_null_sentinels() {
        assert!(is_null_timestamp(&SqlDateTime::default()));
        assert!(is_null_timestamp(&UNIX_EPOCH));
        assert!(!is_null_timestamp(&SqlDateTime {
            second: 1,
            ..UNIX_EPOCH
        }));

        let shifted = SHIFTED_ZERO_TIME.to_datetime().unwrap();
        assert!(is_null_time(shifted));
        assert!(!is_null_time(UNIX_EPOCH.to_datetime().unwrap()));
    }

    #[test]
    fn test_decimal_to_integer_truncates() {
        let value: Decimal = "9223372036854775808.9".parse().unwrap();
        assert_eq!(
            decimal_to_integer(value).unwrap(),
            CanonicalValue::BigInt(9_223_372_036_854_775_808)
        );
    }
}
