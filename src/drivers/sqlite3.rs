use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::drivers::base;
use crate::error::NativeError;
use crate::traits::{
    BoundLiteral, Capabilities, DriverDefinition, DriverProfile, NativeConnection,
    NativeStatement, PrepareOptions, ResultAccessor,
};
use crate::types::{CanonicalType, CanonicalValue, IntegerRead, SqlDateTime};

static PROFILE: DriverProfile = DriverProfile::new("sqlite3", "sqlite", "Sqlite3")
    .with_connection_prefix("jdbc:")
    .with_capabilities(Capabilities {
        generated_keys: true,
        scrollable_results: false,
        connection_encodings: false,
        generated_keys_via_prepare_flag: false,
    });

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// SQLite keeps dates, times and decimals as text, and its driver has no
/// decimal reads, so those types are parsed from strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sqlite3Definition;

impl Sqlite3Definition {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DriverDefinition for Sqlite3Definition {
    fn profile(&self) -> &DriverProfile {
        &PROFILE
    }

    fn decode_column(
        &self,
        rs: &mut dyn ResultAccessor,
        index: usize,
        ty: CanonicalType,
    ) -> Result<CanonicalValue, NativeError> {
        match ty {
            CanonicalType::Date => match rs.get_string(index)? {
                None => Ok(CanonicalValue::Nil),
                Some(text) => parse_date(&text),
            },
            CanonicalType::Timestamp => match rs.get_string(index)? {
                None => Ok(CanonicalValue::Nil),
                Some(text) => match parse_datetime(&text)? {
                    Some(dt) if !self.is_null_timestamp(&SqlDateTime::from(dt)) => {
                        Ok(CanonicalValue::Timestamp(dt.trunc_subsecs(3)))
                    }
                    _ => Ok(CanonicalValue::Nil),
                },
            },
            CanonicalType::Time => match rs.get_string(index)? {
                None => Ok(CanonicalValue::Nil),
                Some(text) => match parse_datetime(&text)? {
                    Some(dt) if !self.is_null_time(dt) => {
                        Ok(CanonicalValue::Time(dt.trunc_subsecs(3)))
                    }
                    _ => Ok(CanonicalValue::Nil),
                },
            },
            CanonicalType::SmallInt | CanonicalType::BigInt => match rs.get_long(index)? {
                IntegerRead::Value(v) => Ok(CanonicalValue::SmallInt(v)),
                IntegerRead::Null => Ok(CanonicalValue::Nil),
                IntegerRead::Overflow => match rs.get_string(index)? {
                    None => Ok(CanonicalValue::Nil),
                    Some(text) => base::decimal_to_integer(parse_decimal(&text)?),
                },
            },
            CanonicalType::Float => match rs.get_string(index)? {
                None => Ok(CanonicalValue::Nil),
                Some(text) => parse_float(&text).map(CanonicalValue::Float),
            },
            CanonicalType::Decimal => match rs.get_string(index)? {
                None => Ok(CanonicalValue::Nil),
                Some(text) => parse_decimal(&text).map(CanonicalValue::Decimal),
            },
            _ => base::decode_column(self, rs, index, ty),
        }
    }

    fn bind_parameter(
        &self,
        stmt: &mut dyn NativeStatement,
        value: &CanonicalValue,
        slot: usize,
    ) -> Result<(), NativeError> {
        match value {
            CanonicalValue::Decimal(d) => stmt.set_string(slot, &d.to_string()),
            CanonicalValue::Boolean(b) => stmt.set_string(slot, if *b { "t" } else { "f" }),
            CanonicalValue::Timestamp(ts) => {
                stmt.set_string(slot, &ts.format("%Y-%m-%dT%H:%M:%S%.f+00:00").to_string())
            }
            CanonicalValue::Time(t) => {
                stmt.set_string(slot, &t.format("%Y-%m-%dT%H:%M:%S+00:00").to_string())
            }
            CanonicalValue::Date(d) => stmt.set_string(slot, &d.to_string()),
            _ => base::bind_parameter(stmt, value, slot),
        }
    }

    /// Inlines the bound literals into the `?` placeholders when the driver
    /// exposes them.
    fn statement_text(&self, stmt: &dyn NativeStatement) -> String {
        let Some(view) = stmt.introspection() else {
            return stmt.describe();
        };

        let mut sql = view.sql;
        let mut from = 0;
        for literal in &view.parameters {
            let Some(pos) = sql[from..].find('?').map(|p| p + from) else {
                break;
            };
            let rendered = match literal {
                BoundLiteral::Text(text) => self.quote_string(text),
                BoundLiteral::Raw(raw) => raw.clone(),
            };
            sql.replace_range(pos..pos + 1, &rendered);
            from = pos + rendered.len();
        }
        sql
    }

    async fn generated_keys(
        &self,
        conn: &mut dyn NativeConnection,
    ) -> Result<Option<i64>, NativeError> {
        let mut stmt = conn
            .prepare("SELECT last_insert_rowid()", PrepareOptions::default())
            .await?;
        let rs = stmt.execute_query().await?;
        base::first_long(Some(rs))
    }
}

fn parse_decimal(text: &str) -> Result<Decimal, NativeError> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| {
            NativeError::new(format!("invalid numeric text {trimmed:?}: {e}")).with_sql_state("22018")
        })
}

fn parse_float(text: &str) -> Result<f64, NativeError> {
    let trimmed = text.trim();
    match parse_decimal(trimmed).ok().and_then(|d| d.to_f64()) {
        Some(v) => Ok(v),
        None => trimmed.parse::<f64>().map_err(|e| {
            NativeError::new(format!("invalid numeric text {trimmed:?}: {e}")).with_sql_state("22018")
        }),
    }
}

/// Text such as `0000-00-00 00:00:00` that some writers store for NULL.
fn is_zero_text(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text.chars().filter(char::is_ascii_digit).all(|c| c == '0')
}

fn parse_date(text: &str) -> Result<CanonicalValue, NativeError> {
    let trimmed = text.trim();
    if is_zero_text(trimmed) {
        return Ok(CanonicalValue::Nil);
    }
    let date_part = trimmed
        .split(['T', ' '])
        .next()
        .unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(CanonicalValue::Date)
        .map_err(|e| invalid_text(trimmed, e))
}

/// Parse stored date/time text; values with an offset are normalized to UTC.
fn parse_datetime(text: &str) -> Result<Option<NaiveDateTime>, NativeError> {
    let trimmed = text.trim();
    if is_zero_text(trimmed) {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(dt.naive_utc()));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Ok(Some(dt.naive_utc()));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(dt));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|d| Some(d.and_time(NaiveTime::MIN)))
        .map_err(|e| invalid_text(trimmed, e))
}

fn invalid_text(text: &str, err: chrono::ParseError) -> NativeError {
    NativeError::new(format!("invalid date/time text {text:?}: {err}")).with_sql_state("22007")
}
