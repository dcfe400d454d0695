//! Contracts for the tabular-access layer underneath the drivers.
//!
//! Column and parameter indexes are 1-based throughout, matching the
//! positional `?` slots in SQL text.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Cursor, Read};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::is_secret_key;
use crate::error::NativeError;
use crate::types::{ColumnMetadata, IntegerRead, SqlDateTime, SqlType};

/// Byte stream over a large column value. Must be closed after use.
pub trait ColumnStream: Read + Send {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ColumnStream for Cursor<Vec<u8>> {}

/// Cursor over a native result.
pub trait ResultAccessor: Send {
    fn column_count(&self) -> usize;

    fn column_metadata(&self, index: usize) -> Result<ColumnMetadata, NativeError>;

    /// Advance to the next row; returns `false` when exhausted.
    fn next(&mut self) -> Result<bool, NativeError>;

    fn get_long(&mut self, index: usize) -> Result<IntegerRead, NativeError>;

    fn get_decimal(&mut self, index: usize) -> Result<Option<Decimal>, NativeError>;

    fn get_string(&mut self, index: usize) -> Result<Option<String>, NativeError>;

    /// Reads a boolean. NULL reads as `false`; check `get_string` first to
    /// tell the two apart.
    fn get_boolean(&mut self, index: usize) -> Result<bool, NativeError>;

    fn get_date(&mut self, index: usize) -> Result<Option<SqlDateTime>, NativeError>;

    fn get_time(&mut self, index: usize) -> Result<Option<SqlDateTime>, NativeError>;

    fn get_timestamp(&mut self, index: usize) -> Result<Option<SqlDateTime>, NativeError>;

    fn binary_stream(&mut self, index: usize)
        -> Result<Option<Box<dyn ColumnStream>>, NativeError>;

    fn ascii_stream(&mut self, index: usize) -> Result<Option<Box<dyn ColumnStream>>, NativeError>;
}

/// A literal a statement was bound with, as reported by driver introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundLiteral {
    /// Character data; rendered quoted.
    Text(String),
    /// Numbers and other values; rendered verbatim.
    Raw(String),
}

/// Driver-internal view of a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementIntrospection {
    pub sql: String,
    pub parameters: Vec<BoundLiteral>,
}

/// Options applied when preparing a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    pub return_generated_keys: bool,
}

/// A prepared statement with positional parameter slots.
#[async_trait]
pub trait NativeStatement: Send {
    /// SQL text as prepared.
    fn sql(&self) -> &str;

    /// Declared type of a parameter slot. Drivers that cannot introspect
    /// return an error.
    fn parameter_type(&mut self, slot: usize) -> Result<SqlType, NativeError>;

    fn set_null(&mut self, slot: usize, sql_type: SqlType) -> Result<(), NativeError>;
    fn set_int(&mut self, slot: usize, value: i32) -> Result<(), NativeError>;
    fn set_long(&mut self, slot: usize, value: i64) -> Result<(), NativeError>;
    fn set_double(&mut self, slot: usize, value: f64) -> Result<(), NativeError>;
    fn set_decimal(&mut self, slot: usize, value: Decimal) -> Result<(), NativeError>;
    fn set_boolean(&mut self, slot: usize, value: bool) -> Result<(), NativeError>;
    fn set_string(&mut self, slot: usize, value: &str) -> Result<(), NativeError>;
    fn set_bytes(&mut self, slot: usize, value: &[u8]) -> Result<(), NativeError>;
    fn set_date(&mut self, slot: usize, value: SqlDateTime) -> Result<(), NativeError>;
    fn set_timestamp(&mut self, slot: usize, value: SqlDateTime) -> Result<(), NativeError>;
    fn set_object(&mut self, slot: usize, value: &str, sql_type: SqlType)
        -> Result<(), NativeError>;

    /// Register an output slot for a `RETURNING ... INTO ?` clause.
    fn register_return_parameter(
        &mut self,
        _slot: usize,
        _sql_type: SqlType,
    ) -> Result<(), NativeError> {
        Err(NativeError::unsupported("return parameters"))
    }

    async fn execute_update(&mut self) -> Result<u64, NativeError>;

    async fn execute_query(&mut self) -> Result<Box<dyn ResultAccessor>, NativeError>;

    /// Keys generated by the last update, if the driver tracks them.
    async fn generated_keys(&mut self) -> Result<Option<Box<dyn ResultAccessor>>, NativeError> {
        Ok(None)
    }

    /// Values of registered return parameters after execution.
    async fn return_result(&mut self) -> Result<Option<Box<dyn ResultAccessor>>, NativeError> {
        Ok(None)
    }

    /// Driver's own rendering of the statement.
    fn describe(&self) -> String {
        self.sql().to_string()
    }

    fn introspection(&self) -> Option<StatementIntrospection> {
        None
    }
}

/// A live native session.
#[async_trait]
pub trait NativeConnection: Send {
    /// Run SQL that returns no rows and takes no parameters.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), NativeError>;

    async fn prepare(
        &mut self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<Box<dyn NativeStatement>, NativeError>;

    async fn close(&mut self) -> Result<(), NativeError>;
}

/// Everything a connector needs to open a native session.
#[derive(Clone, PartialEq, Eq)]
pub struct NativeTarget {
    pub connection_string: String,
    pub properties: BTreeMap<String, String>,
}

impl NativeTarget {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

impl fmt::Debug for NativeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let properties: BTreeMap<&str, &str> = self
            .properties
            .iter()
            .map(|(k, v)| {
                let shown = if is_secret_key(k) { "***" } else { v.as_str() };
                (k.as_str(), shown)
            })
            .collect();
        f.debug_struct("NativeTarget")
            .field("connection_string", &self.connection_string)
            .field("properties", &properties)
            .finish()
    }
}

/// Opens native sessions for one driver library.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Library name, used in load errors and logs.
    fn name(&self) -> &str;

    async fn connect(&self, target: &NativeTarget) -> Result<Box<dyn NativeConnection>, NativeError>;
}
