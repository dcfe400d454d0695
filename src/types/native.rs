use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Native column/parameter type codes as reported by the tabular-access
/// layer. Codes follow the JDBC numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Null,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    Varchar,
    LongVarchar,
    Date,
    Time,
    Timestamp,
    TimestampWithTimeZone,
    Binary,
    VarBinary,
    LongVarBinary,
    Boolean,
    JavaObject,
    Blob,
    Clob,
    /// Vendor-specific code with no portable meaning.
    Other(i32),
}

impl SqlType {
    /// Oracle `BINARY_FLOAT`.
    pub const ORACLE_BINARY_FLOAT: SqlType = SqlType::Other(100);
    /// Oracle `BINARY_DOUBLE`.
    pub const ORACLE_BINARY_DOUBLE: SqlType = SqlType::Other(101);
    /// Oracle `TIMESTAMP WITH TIME ZONE`.
    pub const ORACLE_TIMESTAMPTZ: SqlType = SqlType::Other(-101);
    /// Oracle `TIMESTAMP WITH LOCAL TIME ZONE`.
    pub const ORACLE_TIMESTAMPLTZ: SqlType = SqlType::Other(-102);

    pub fn code(self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Bit => -7,
            Self::TinyInt => -6,
            Self::SmallInt => 5,
            Self::Integer => 4,
            Self::BigInt => -5,
            Self::Float => 6,
            Self::Real => 7,
            Self::Double => 8,
            Self::Numeric => 2,
            Self::Decimal => 3,
            Self::Char => 1,
            Self::Varchar => 12,
            Self::LongVarchar => -1,
            Self::Date => 91,
            Self::Time => 92,
            Self::Timestamp => 93,
            Self::TimestampWithTimeZone => 2014,
            Self::Binary => -2,
            Self::VarBinary => -3,
            Self::LongVarBinary => -4,
            Self::Boolean => 16,
            Self::JavaObject => 2000,
            Self::Blob => 2004,
            Self::Clob => 2005,
            Self::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Null,
            -7 => Self::Bit,
            -6 => Self::TinyInt,
            5 => Self::SmallInt,
            4 => Self::Integer,
            -5 => Self::BigInt,
            6 => Self::Float,
            7 => Self::Real,
            8 => Self::Double,
            2 => Self::Numeric,
            3 => Self::Decimal,
            1 => Self::Char,
            12 => Self::Varchar,
            -1 => Self::LongVarchar,
            91 => Self::Date,
            92 => Self::Time,
            93 => Self::Timestamp,
            2014 => Self::TimestampWithTimeZone,
            -2 => Self::Binary,
            -3 => Self::VarBinary,
            -4 => Self::LongVarBinary,
            16 => Self::Boolean,
            2000 => Self::JavaObject,
            2004 => Self::Blob,
            2005 => Self::Clob,
            other => Self::Other(other),
        }
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::Timestamp | Self::TimestampWithTimeZone
        )
    }
}

/// Per-column metadata exposed by a native result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub sql_type: SqlType,
    pub precision: Option<u32>,
    pub scale: Option<i32>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            precision: None,
            scale: None,
        }
    }

    pub fn with_precision(mut self, precision: u32, scale: i32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }
}

/// Broken-down date/time as read from a native driver.
///
/// Unlike chrono types this can hold the all-zero value some databases use
/// as a NULL stand-in, so it is checked before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SqlDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanos: u32,
}

impl SqlDateTime {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let time = NaiveTime::from_hms_nano_opt(self.hour, self.minute, self.second, self.nanos)?;
        Some(self.to_date()?.and_time(time))
    }
}

impl From<NaiveDateTime> for SqlDateTime {
    fn from(value: NaiveDateTime) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
            day: value.day(),
            hour: value.hour(),
            minute: value.minute(),
            second: value.second(),
            nanos: value.nanosecond(),
        }
    }
}

impl From<NaiveDate> for SqlDateTime {
    fn from(value: NaiveDate) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
            day: value.day(),
            ..Self::default()
        }
    }
}

/// Outcome of reading a column as a 64-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerRead {
    Value(i64),
    /// The stored value does not fit; re-read it at higher precision.
    Overflow,
    Null,
}
