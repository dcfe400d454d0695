use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::config::SessionConfig;
use crate::drivers::base;
use crate::error::NativeError;
use crate::traits::{
    Capabilities, DriverDefinition, DriverProfile, NativeConnection, NativeStatement,
    ResultAccessor,
};
use crate::types::{CanonicalType, CanonicalValue, ColumnMetadata, SqlType};
use crate::uri::QueryMap;

static PROFILE: DriverProfile = DriverProfile::new("oracle", "oracle.thin", "Oracle")
    .with_connection_prefix("jdbc:")
    .with_capabilities(Capabilities {
        generated_keys: false,
        // Decimal reads fail on BINARY_DOUBLE/BINARY_FLOAT with scrolling on.
        scrollable_results: false,
        connection_encodings: false,
        generated_keys_via_prepare_flag: true,
    });

const INSERT_ID_PLACEHOLDER: &str = ":insert_id";

const SESSION_FORMATS: [&str; 3] = [
    "alter session set nls_date_format = 'YYYY-MM-DD HH24:MI:SS'",
    "alter session set nls_timestamp_format = 'YYYY-MM-DD HH24:MI:SS.FF'",
    "alter session set nls_timestamp_tz_format = 'YYYY-MM-DD HH24:MI:SS.FF TZH:TZM'",
];

fn returning_into() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^\s*INSERT.+RETURNING.+INTO\s+").ok())
        .as_ref()
}

fn is_datetime_column(sql_type: SqlType) -> bool {
    matches!(
        sql_type,
        SqlType::Date
            | SqlType::Timestamp
            | SqlType::ORACLE_TIMESTAMPTZ
            | SqlType::ORACLE_TIMESTAMPLTZ
    )
}

/// Oracle: NUMBER precision drives inference, date columns are times, and
/// inserted ids come back through `RETURNING ... INTO`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDefinition;

impl OracleDefinition {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DriverDefinition for OracleDefinition {
    fn profile(&self) -> &DriverProfile {
        &PROFILE
    }

    fn infer_type(&self, column: &ColumnMetadata) -> CanonicalType {
        match column.sql_type {
            t if is_datetime_column(t) => CanonicalType::Time,
            SqlType::Numeric => match (column.precision, column.scale) {
                (Some(1), Some(0)) => CanonicalType::Boolean,
                (Some(p), Some(0)) if p > 1 => CanonicalType::SmallInt,
                _ => CanonicalType::Decimal,
            },
            SqlType::ORACLE_BINARY_FLOAT | SqlType::ORACLE_BINARY_DOUBLE => CanonicalType::Float,
            _ => base::infer_type(column),
        }
    }

    fn decode_column(
        &self,
        rs: &mut dyn ResultAccessor,
        index: usize,
        ty: CanonicalType,
    ) -> Result<CanonicalValue, NativeError> {
        if ty != CanonicalType::Time {
            return base::decode_column(self, rs, index, ty);
        }
        let column = rs.column_metadata(index)?;
        if is_datetime_column(column.sql_type) {
            let value = rs.get_timestamp(index)?;
            base::time_value(self, value)
        } else {
            Ok(rs
                .get_string(index)?
                .map_or(CanonicalValue::Nil, CanonicalValue::String))
        }
    }

    /// Parameter metadata is unreliable here, so NULL binds untyped.
    fn bind_parameter(
        &self,
        stmt: &mut dyn NativeStatement,
        value: &CanonicalValue,
        slot: usize,
    ) -> Result<(), NativeError> {
        match value {
            CanonicalValue::Nil => stmt.set_null(slot, SqlType::Null),
            _ => base::bind_parameter(stmt, value, slot),
        }
    }

    fn statement_text(&self, stmt: &dyn NativeStatement) -> String {
        stmt.introspection()
            .map(|view| view.sql)
            .unwrap_or_else(|| stmt.describe())
    }

    fn default_connection_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("defaultRowPrefetch".to_string(), "100".to_string());
        props
    }

    async fn after_connect(
        &self,
        conn: &mut dyn NativeConnection,
        query: &QueryMap,
        config: &SessionConfig,
    ) -> Result<(), NativeError> {
        for sql in SESSION_FORMATS {
            conn.execute_batch(sql).await?;
        }
        let time_zone = query
            .get("time_zone")
            .map(String::as_str)
            .or(config.time_zone.as_deref());
        if let Some(tz) = time_zone {
            tracing::debug!(time_zone = tz, "setting oracle session time zone");
            let sql = format!("alter session set time_zone = {}", self.quote_string(tz));
            conn.execute_batch(&sql).await?;
        }
        Ok(())
    }

    fn prepare_sql_text<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        if sql.contains(INSERT_ID_PLACEHOLDER) {
            Cow::Owned(sql.replacen(INSERT_ID_PLACEHOLDER, "?", 1))
        } else {
            Cow::Borrowed(sql)
        }
    }

    fn register_return_param(
        &self,
        sql: &str,
        stmt: &mut dyn NativeStatement,
        slot: usize,
    ) -> Result<bool, NativeError> {
        match returning_into() {
            Some(pattern) if pattern.is_match(sql) => {
                stmt.register_return_parameter(slot, SqlType::BigInt)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn return_param(
        &self,
        stmt: &mut dyn NativeStatement,
    ) -> Result<Option<i64>, NativeError> {
        let rs = stmt.return_result().await?;
        base::first_long(rs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_inference() {
        let def = OracleDefinition::new();
        let number = |p, s| ColumnMetadata::new("n", SqlType::Numeric).with_precision(p, s);

        assert_eq!(def.infer_type(&number(1, 0)), CanonicalType::Boolean);
        assert_eq!(def.infer_type(&number(10, 0)), CanonicalType::SmallInt);
        assert_eq!(def.infer_type(&number(10, 2)), CanonicalType::Decimal);
        assert_eq!(
            def.infer_type(&ColumnMetadata::new("d", SqlType::Date)),
            CanonicalType::Time
        );
        assert_eq!(
            def.infer_type(&ColumnMetadata::new("f", SqlType::ORACLE_BINARY_DOUBLE)),
            CanonicalType::Float
        );
        assert_eq!(
            def.infer_type(&ColumnMetadata::new("s", SqlType::Varchar)),
            CanonicalType::String
        );
    }

    #[test]
    fn test_insert_id_placeholder() {
        let def = OracleDefinition::new();
        assert_eq!(
            def.prepare_sql_text("INSERT INTO t (a) VALUES (?) RETURNING id INTO :insert_id"),
            "INSERT INTO t (a) VALUES (?) RETURNING id INTO ?"
        );
        assert!(matches!(
            def.prepare_sql_text("SELECT 1 FROM dual"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_returning_pattern() {
        let pattern = returning_into().unwrap();
        assert!(pattern.is_match("  insert into t (a) values (?) returning id into ?"));
        assert!(!pattern.is_match("UPDATE t SET a = 1"));
    }
}
