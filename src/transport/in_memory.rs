use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::NativeError;
use crate::traits::{
    BoundLiteral, ColumnStream, Connector, NativeConnection, NativeStatement, NativeTarget,
    PrepareOptions, ResultAccessor, StatementIntrospection,
};
use crate::types::{ColumnMetadata, IntegerRead, SqlDateTime, SqlType};

/// A stored column value, read back with JDBC-like conversions.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCell {
    Null,
    Long(i64),
    /// Integer or decimal digits of any size.
    Number(String),
    Double(f64),
    Decimal(Decimal),
    Boolean(bool),
    Text(String),
    Bytes(Vec<u8>),
    /// Binary data whose stream fails after yielding its bytes.
    FailingStream(Vec<u8>),
    DateTime(SqlDateTime),
}

impl From<i64> for NativeCell {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<i32> for NativeCell {
    fn from(value: i32) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<f64> for NativeCell {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<Decimal> for NativeCell {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for NativeCell {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for NativeCell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for NativeCell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for NativeCell {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<SqlDateTime> for NativeCell {
    fn from(value: SqlDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<NaiveDateTime> for NativeCell {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value.into())
    }
}

impl From<NaiveDate> for NativeCell {
    fn from(value: NaiveDate) -> Self {
        Self::DateTime(value.into())
    }
}

impl<T: Into<NativeCell>> From<Option<T>> for NativeCell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A scripted result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryResultSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<NativeCell>>,
}

impl InMemoryResultSet {
    pub fn builder() -> InMemoryResultBuilder {
        InMemoryResultBuilder::new()
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Builder for creating scripted results easily.
#[derive(Debug, Default)]
pub struct InMemoryResultBuilder {
    columns: Vec<ColumnMetadata>,
    rows: Vec<Vec<NativeCell>>,
}

impl InMemoryResultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: &str, sql_type: SqlType) -> Self {
        self.columns.push(ColumnMetadata::new(name, sql_type));
        self
    }

    /// Add a column with full metadata (precision, scale).
    pub fn column_with(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    pub fn row(mut self, values: Vec<NativeCell>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn build(self) -> InMemoryResultSet {
        InMemoryResultSet {
            columns: self.columns,
            rows: self.rows,
        }
    }
}

/// A parameter as bound through [`NativeStatement`].
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Null(SqlType),
    Int(i32),
    Long(i64),
    Double(f64),
    Decimal(Decimal),
    Boolean(bool),
    Text(String),
    Bytes(Vec<u8>),
    Date(SqlDateTime),
    Timestamp(SqlDateTime),
    Object(String, SqlType),
    ReturnParameter(SqlType),
}

impl BoundValue {
    fn literal(&self) -> BoundLiteral {
        match self {
            Self::Null(_) => BoundLiteral::Raw("NULL".to_string()),
            Self::Int(v) => BoundLiteral::Raw(v.to_string()),
            Self::Long(v) => BoundLiteral::Raw(v.to_string()),
            Self::Double(v) => BoundLiteral::Raw(v.to_string()),
            Self::Decimal(v) => BoundLiteral::Raw(v.to_string()),
            Self::Boolean(v) => BoundLiteral::Raw(v.to_string()),
            Self::Text(v) | Self::Object(v, _) => BoundLiteral::Text(v.clone()),
            Self::Bytes(v) => BoundLiteral::Raw(format!("<{} bytes>", v.len())),
            Self::Date(v) | Self::Timestamp(v) => BoundLiteral::Text(render_datetime(v)),
            Self::ReturnParameter(_) => BoundLiteral::Raw("?".to_string()),
        }
    }
}

/// A recorded statement execution for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    /// Bound values in slot order.
    pub params: Vec<BoundValue>,
    pub return_generated_keys: bool,
}

#[derive(Debug)]
struct State {
    results: VecDeque<InMemoryResultSet>,
    update_counts: VecDeque<u64>,
    generated_keys: VecDeque<i64>,
    parameter_types: Option<Vec<SqlType>>,
    introspection: bool,
    connect_error: Option<NativeError>,
    execute_errors: VecDeque<NativeError>,
    batch_error: Option<NativeError>,
    close_error: Option<NativeError>,
    statements: Vec<RecordedStatement>,
    batches: Vec<String>,
    targets: Vec<NativeTarget>,
    close_count: usize,
    streams_opened: usize,
    streams_closed: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            results: VecDeque::new(),
            update_counts: VecDeque::new(),
            generated_keys: VecDeque::new(),
            parameter_types: Some(Vec::new()),
            introspection: true,
            connect_error: None,
            execute_errors: VecDeque::new(),
            batch_error: None,
            close_error: None,
            statements: Vec::new(),
            batches: Vec::new(),
            targets: Vec::new(),
            close_count: 0,
            streams_opened: 0,
            streams_closed: 0,
        }
    }
}

type Shared = Arc<Mutex<State>>;

fn lock(state: &Shared) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory connector for testing.
///
/// Allows scripting results and failures, and verifying the statements,
/// bound parameters and session setup a connection produced. Clones share
/// the same script and recordings.
///
/// # Example
/// ```
/// use sqlbridge::transport::{InMemoryConnector, InMemoryResultSet, NativeCell};
/// use sqlbridge::types::SqlType;
///
/// let connector = InMemoryConnector::new("memory").with_result(
///     InMemoryResultSet::builder()
///         .column("id", SqlType::Integer)
///         .column("name", SqlType::Varchar)
///         .row(vec![NativeCell::from(1), NativeCell::from("Alice")])
///         .build(),
/// );
/// assert_eq!(connector.statement_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    name: String,
    state: Shared,
}

impl InMemoryConnector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Queue a result for the next query. Results are returned in FIFO order.
    pub fn with_result(self, result: InMemoryResultSet) -> Self {
        lock(&self.state).results.push_back(result);
        self
    }

    /// Queue an affected-row count for the next update.
    pub fn with_update_count(self, count: u64) -> Self {
        lock(&self.state).update_counts.push_back(count);
        self
    }

    /// Queue a key returned as generated key or return parameter.
    pub fn with_generated_key(self, key: i64) -> Self {
        lock(&self.state).generated_keys.push_back(key);
        self
    }

    /// Declared parameter types, by slot. Slots past the list report VARCHAR.
    pub fn with_parameter_types(self, types: Vec<SqlType>) -> Self {
        lock(&self.state).parameter_types = Some(types);
        self
    }

    /// Make parameter-type introspection fail.
    pub fn without_parameter_metadata(self) -> Self {
        lock(&self.state).parameter_types = None;
        self
    }

    /// Hide bound values from statement introspection.
    pub fn without_statement_introspection(self) -> Self {
        lock(&self.state).introspection = false;
        self
    }

    pub fn with_connect_error(self, err: NativeError) -> Self {
        lock(&self.state).connect_error = Some(err);
        self
    }

    /// Fail the next statement execution.
    pub fn with_execute_error(self, err: NativeError) -> Self {
        lock(&self.state).execute_errors.push_back(err);
        self
    }

    /// Fail the next batch (session setup) statement.
    pub fn with_batch_error(self, err: NativeError) -> Self {
        lock(&self.state).batch_error = Some(err);
        self
    }

    pub fn with_close_error(self, err: NativeError) -> Self {
        lock(&self.state).close_error = Some(err);
        self
    }

    /// Get all recorded statement executions.
    pub fn recorded_statements(&self) -> Vec<RecordedStatement> {
        lock(&self.state).statements.clone()
    }

    pub fn last_statement(&self) -> Option<RecordedStatement> {
        lock(&self.state).statements.last().cloned()
    }

    pub fn statement_count(&self) -> usize {
        lock(&self.state).statements.len()
    }

    /// Parameterless SQL run through `execute_batch`, in order.
    pub fn batches(&self) -> Vec<String> {
        lock(&self.state).batches.clone()
    }

    /// Targets passed to `connect`, in order.
    pub fn connect_targets(&self) -> Vec<NativeTarget> {
        lock(&self.state).targets.clone()
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).close_count
    }

    /// Column streams handed out and not yet closed.
    pub fn open_stream_count(&self) -> usize {
        let state = lock(&self.state);
        state.streams_opened - state.streams_closed
    }

    pub fn streams_opened(&self) -> usize {
        lock(&self.state).streams_opened
    }

    /// Assert that the last statement matches the expected SQL and parameters.
    pub fn assert_last_statement(&self, expected_sql: &str, expected_params: &[BoundValue]) {
        let last = self.last_statement().expect("No statements were recorded");
        assert_eq!(
            last.sql, expected_sql,
            "SQL mismatch.\nExpected: {}\nActual: {}",
            expected_sql, last.sql
        );
        assert_eq!(
            last.params, expected_params,
            "Parameters mismatch.\nExpected: {:?}\nActual: {:?}",
            expected_params, last.params
        );
    }

    /// Assert that exactly n statements were executed.
    pub fn assert_statement_count(&self, expected: usize) {
        let actual = self.statement_count();
        assert_eq!(
            actual, expected,
            "Statement count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new("in-memory")
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, target: &NativeTarget) -> Result<Box<dyn NativeConnection>, NativeError> {
        let mut state = lock(&self.state);
        state.targets.push(target.clone());
        if let Some(err) = state.connect_error.take() {
            return Err(err);
        }
        Ok(Box::new(InMemoryConnection {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct InMemoryConnection {
    state: Shared,
    closed: bool,
}

impl InMemoryConnection {
    fn ensure_open(&self) -> Result<(), NativeError> {
        if self.closed {
            return Err(NativeError::new("connection is closed").with_sql_state("08003"));
        }
        Ok(())
    }
}

#[async_trait]
impl NativeConnection for InMemoryConnection {
    async fn execute_batch(&mut self, sql: &str) -> Result<(), NativeError> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        state.batches.push(sql.to_string());
        match state.batch_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn prepare(
        &mut self,
        sql: &str,
        options: PrepareOptions,
    ) -> Result<Box<dyn NativeStatement>, NativeError> {
        self.ensure_open()?;
        Ok(Box::new(InMemoryStatement {
            sql: sql.to_string(),
            params: BTreeMap::new(),
            options,
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&mut self) -> Result<(), NativeError> {
        self.closed = true;
        let mut state = lock(&self.state);
        state.close_count += 1;
        match state.close_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct InMemoryStatement {
    sql: String,
    params: BTreeMap<usize, BoundValue>,
    options: PrepareOptions,
    state: Shared,
}

impl InMemoryStatement {
    fn bind(&mut self, slot: usize, value: BoundValue) -> Result<(), NativeError> {
        if slot == 0 {
            return Err(NativeError::new("parameter index out of range: 0").with_sql_state("07009"));
        }
        self.params.insert(slot, value);
        Ok(())
    }

    /// Record this execution; a scripted execution failure wins over results.
    fn record(&self) -> Result<(), NativeError> {
        let mut state = lock(&self.state);
        state.statements.push(RecordedStatement {
            sql: self.sql.clone(),
            params: self.params.values().cloned().collect(),
            return_generated_keys: self.options.return_generated_keys,
        });
        match state.execute_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn key_result(&self) -> Option<Box<dyn ResultAccessor>> {
        let key = lock(&self.state).generated_keys.pop_front()?;
        let result = InMemoryResultSet::builder()
            .column("GENERATED_KEY", SqlType::BigInt)
            .row(vec![NativeCell::Long(key)])
            .build();
        Some(Box::new(InMemoryRows::new(result, Arc::clone(&self.state))))
    }
}

#[async_trait]
impl NativeStatement for InMemoryStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn parameter_type(&mut self, slot: usize) -> Result<SqlType, NativeError> {
        match &lock(&self.state).parameter_types {
            None => Err(NativeError::unsupported("parameter metadata")),
            Some(types) => Ok(slot
                .checked_sub(1)
                .and_then(|i| types.get(i).copied())
                .unwrap_or(SqlType::Varchar)),
        }
    }

    fn set_null(&mut self, slot: usize, sql_type: SqlType) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Null(sql_type))
    }

    fn set_int(&mut self, slot: usize, value: i32) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Int(value))
    }

    fn set_long(&mut self, slot: usize, value: i64) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Long(value))
    }

    fn set_double(&mut self, slot: usize, value: f64) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Double(value))
    }

    fn set_decimal(&mut self, slot: usize, value: Decimal) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Decimal(value))
    }

    fn set_boolean(&mut self, slot: usize, value: bool) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Boolean(value))
    }

    fn set_string(&mut self, slot: usize, value: &str) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Text(value.to_string()))
    }

    fn set_bytes(&mut self, slot: usize, value: &[u8]) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Bytes(value.to_vec()))
    }

    fn set_date(&mut self, slot: usize, value: SqlDateTime) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Date(value))
    }

    fn set_timestamp(&mut self, slot: usize, value: SqlDateTime) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Timestamp(value))
    }

    fn set_object(
        &mut self,
        slot: usize,
        value: &str,
        sql_type: SqlType,
    ) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::Object(value.to_string(), sql_type))
    }

    fn register_return_parameter(
        &mut self,
        slot: usize,
        sql_type: SqlType,
    ) -> Result<(), NativeError> {
        self.bind(slot, BoundValue::ReturnParameter(sql_type))
    }

    async fn execute_update(&mut self) -> Result<u64, NativeError> {
        self.record()?;
        Ok(lock(&self.state).update_counts.pop_front().unwrap_or(0))
    }

    async fn execute_query(&mut self) -> Result<Box<dyn ResultAccessor>, NativeError> {
        self.record()?;
        let result = lock(&self.state).results.pop_front().unwrap_or_default();
        Ok(Box::new(InMemoryRows::new(result, Arc::clone(&self.state))))
    }

    async fn generated_keys(&mut self) -> Result<Option<Box<dyn ResultAccessor>>, NativeError> {
        if !self.options.return_generated_keys {
            return Ok(None);
        }
        Ok(self.key_result())
    }

    async fn return_result(&mut self) -> Result<Option<Box<dyn ResultAccessor>>, NativeError> {
        let registered = self
            .params
            .values()
            .any(|v| matches!(v, BoundValue::ReturnParameter(_)));
        if !registered {
            return Ok(None);
        }
        Ok(self.key_result())
    }

    fn describe(&self) -> String {
        format!("InMemoryStatement[{}]", self.sql)
    }

    fn introspection(&self) -> Option<StatementIntrospection> {
        if !lock(&self.state).introspection {
            return None;
        }
        Some(StatementIntrospection {
            sql: self.sql.clone(),
            parameters: self
                .params
                .values()
                .filter(|v| !matches!(v, BoundValue::ReturnParameter(_)))
                .map(BoundValue::literal)
                .collect(),
        })
    }
}

struct InMemoryRows {
    result: InMemoryResultSet,
    /// Index of the current row; `None` before the first `next`.
    cursor: Option<usize>,
    state: Shared,
}

impl InMemoryRows {
    fn new(result: InMemoryResultSet, state: Shared) -> Self {
        Self {
            result,
            cursor: None,
            state,
        }
    }

    fn cell(&self, index: usize) -> Result<&NativeCell, NativeError> {
        let row = self
            .cursor
            .and_then(|c| self.result.rows.get(c))
            .ok_or_else(|| NativeError::new("no current row").with_sql_state("24000"))?;
        index
            .checked_sub(1)
            .and_then(|i| row.get(i))
            .ok_or_else(|| invalid_index(index))
    }

    fn stream(&self, bytes: Vec<u8>, fail: bool) -> Box<dyn ColumnStream> {
        lock(&self.state).streams_opened += 1;
        Box::new(TrackedStream {
            inner: Cursor::new(bytes),
            fail,
            state: Arc::clone(&self.state),
            closed: false,
        })
    }
}

fn invalid_index(index: usize) -> NativeError {
    NativeError::new(format!("invalid column index: {index}")).with_sql_state("07009")
}

fn conversion_error(cell: &NativeCell, target: &str) -> NativeError {
    NativeError::new(format!("cannot convert {cell:?} to {target}")).with_sql_state("22018")
}

fn parse_number(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

fn long_from_decimal(value: Decimal) -> IntegerRead {
    value
        .trunc()
        .to_i64()
        .map_or(IntegerRead::Overflow, IntegerRead::Value)
}

fn render_datetime(v: &SqlDateTime) -> String {
    let mut text = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        v.year, v.month, v.day, v.hour, v.minute, v.second
    );
    if v.nanos > 0 {
        text.push_str(&format!(".{:09}", v.nanos).trim_end_matches('0').to_string());
    }
    text
}

/// Parse `yyyy-mm-dd[ hh:mm:ss[.fff]]`, including all-zero values.
fn parse_datetime_text(text: &str) -> Option<SqlDateTime> {
    let parts: Vec<&str> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 3 {
        return None;
    }
    let field = |i: usize| parts.get(i).map_or(Some(0), |p| p.parse::<u32>().ok());
    let nanos = match parts.get(6) {
        Some(frac) => {
            let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
            digits.parse().ok()?
        }
        None => 0,
    };
    Some(SqlDateTime {
        year: parts[0].parse().ok()?,
        month: field(1)?,
        day: field(2)?,
        hour: field(3)?,
        minute: field(4)?,
        second: field(5)?,
        nanos,
    })
}

impl ResultAccessor for InMemoryRows {
    fn column_count(&self) -> usize {
        self.result.columns.len()
    }

    fn column_metadata(&self, index: usize) -> Result<ColumnMetadata, NativeError> {
        index
            .checked_sub(1)
            .and_then(|i| self.result.columns.get(i))
            .cloned()
            .ok_or_else(|| invalid_index(index))
    }

    fn next(&mut self) -> Result<bool, NativeError> {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.cursor = Some(next.min(self.result.rows.len()));
        Ok(next < self.result.rows.len())
    }

    fn get_long(&mut self, index: usize) -> Result<IntegerRead, NativeError> {
        let cell = self.cell(index)?;
        match cell {
            NativeCell::Null => Ok(IntegerRead::Null),
            NativeCell::Long(v) => Ok(IntegerRead::Value(*v)),
            NativeCell::Boolean(b) => Ok(IntegerRead::Value(i64::from(*b))),
            NativeCell::Decimal(d) => Ok(long_from_decimal(*d)),
            NativeCell::Double(f) => Decimal::from_f64_retain(*f)
                .map(long_from_decimal)
                .ok_or_else(|| conversion_error(cell, "long")),
            NativeCell::Number(text) | NativeCell::Text(text) => match text.trim().parse::<i64>() {
                Ok(v) => Ok(IntegerRead::Value(v)),
                Err(_) => parse_number(text)
                    .map(long_from_decimal)
                    .ok_or_else(|| conversion_error(cell, "long")),
            },
            _ => Err(conversion_error(cell, "long")),
        }
    }

    fn get_decimal(&mut self, index: usize) -> Result<Option<Decimal>, NativeError> {
        let cell = self.cell(index)?;
        match cell {
            NativeCell::Null => Ok(None),
            NativeCell::Long(v) => Ok(Some(Decimal::from(*v))),
            NativeCell::Boolean(b) => Ok(Some(Decimal::from(i64::from(*b)))),
            NativeCell::Decimal(d) => Ok(Some(*d)),
            NativeCell::Double(f) => Decimal::from_f64_retain(*f)
                .map(Some)
                .ok_or_else(|| conversion_error(cell, "decimal")),
            NativeCell::Number(text) | NativeCell::Text(text) => parse_number(text)
                .map(Some)
                .ok_or_else(|| conversion_error(cell, "decimal")),
            _ => Err(conversion_error(cell, "decimal")),
        }
    }

    fn get_string(&mut self, index: usize) -> Result<Option<String>, NativeError> {
        Ok(match self.cell(index)? {
            NativeCell::Null => None,
            NativeCell::Long(v) => Some(v.to_string()),
            NativeCell::Number(s) | NativeCell::Text(s) => Some(s.clone()),
            NativeCell::Double(f) => Some(f.to_string()),
            NativeCell::Decimal(d) => Some(d.to_string()),
            NativeCell::Boolean(b) => Some(b.to_string()),
            NativeCell::Bytes(b) | NativeCell::FailingStream(b) => {
                Some(String::from_utf8_lossy(b).into_owned())
            }
            NativeCell::DateTime(v) => Some(render_datetime(v)),
        })
    }

    fn get_boolean(&mut self, index: usize) -> Result<bool, NativeError> {
        let cell = self.cell(index)?;
        match cell {
            NativeCell::Null => Ok(false),
            NativeCell::Boolean(b) => Ok(*b),
            NativeCell::Long(v) => Ok(*v != 0),
            NativeCell::Double(f) => Ok(*f != 0.0),
            NativeCell::Decimal(d) => Ok(!d.is_zero()),
            NativeCell::Number(text) | NativeCell::Text(text) => {
                match text.trim().to_ascii_lowercase().as_str() {
                    "1" | "t" | "true" | "y" | "yes" => Ok(true),
                    "0" | "f" | "false" | "n" | "no" => Ok(false),
                    _ => Err(conversion_error(cell, "boolean")),
                }
            }
            _ => Err(conversion_error(cell, "boolean")),
        }
    }

    fn get_date(&mut self, index: usize) -> Result<Option<SqlDateTime>, NativeError> {
        Ok(self.get_timestamp(index)?.map(|v| SqlDateTime {
            year: v.year,
            month: v.month,
            day: v.day,
            ..SqlDateTime::default()
        }))
    }

    fn get_time(&mut self, index: usize) -> Result<Option<SqlDateTime>, NativeError> {
        Ok(self.get_timestamp(index)?.map(|v| SqlDateTime {
            year: 1970,
            month: 1,
            day: 1,
            ..v
        }))
    }

    fn get_timestamp(&mut self, index: usize) -> Result<Option<SqlDateTime>, NativeError> {
        let cell = self.cell(index)?;
        match cell {
            NativeCell::Null => Ok(None),
            NativeCell::DateTime(v) => Ok(Some(*v)),
            NativeCell::Text(text) => parse_datetime_text(text)
                .map(Some)
                .ok_or_else(|| conversion_error(cell, "timestamp")),
            _ => Err(conversion_error(cell, "timestamp")),
        }
    }

    fn binary_stream(
        &mut self,
        index: usize,
    ) -> Result<Option<Box<dyn ColumnStream>>, NativeError> {
        let (bytes, fail) = match self.cell(index)? {
            NativeCell::Null => return Ok(None),
            NativeCell::Bytes(b) => (b.clone(), false),
            NativeCell::FailingStream(b) => (b.clone(), true),
            NativeCell::Text(s) => (s.clone().into_bytes(), false),
            other => return Err(conversion_error(other, "binary stream")),
        };
        Ok(Some(self.stream(bytes, fail)))
    }

    fn ascii_stream(
        &mut self,
        index: usize,
    ) -> Result<Option<Box<dyn ColumnStream>>, NativeError> {
        let (bytes, fail) = match self.cell(index)? {
            NativeCell::Null => return Ok(None),
            NativeCell::Text(s) | NativeCell::Number(s) => (s.clone().into_bytes(), false),
            NativeCell::Bytes(b) => (b.clone(), false),
            NativeCell::FailingStream(b) => (b.clone(), true),
            other => return Err(conversion_error(other, "character stream")),
        };
        Ok(Some(self.stream(bytes, fail)))
    }
}

/// Stream that reports its `close` to the connector.
struct TrackedStream {
    inner: Cursor<Vec<u8>>,
    /// Fail once the data is exhausted instead of reporting end of stream.
    fail: bool,
    state: Shared,
    closed: bool,
}

impl Read for TrackedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && self.fail {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream reset by peer"));
        }
        Ok(n)
    }
}

impl ColumnStream for TrackedStream {
    fn close(&mut self) -> io::Result<()> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).streams_closed += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(result: InMemoryResultSet) -> (InMemoryConnector, InMemoryRows) {
        let connector = InMemoryConnector::default();
        let rows = InMemoryRows::new(result, Arc::clone(&connector.state));
        (connector, rows)
    }

    #[test]
    fn test_jdbc_like_conversions() {
        let (_, mut rs) = rows(
            InMemoryResultSet::builder()
                .column("big", SqlType::Numeric)
                .column("flag", SqlType::Boolean)
                .column("ts", SqlType::Timestamp)
                .row(vec![
                    NativeCell::Number("9223372036854775808".into()),
                    NativeCell::Null,
                    NativeCell::Text("0000-00-00 00:00:00".into()),
                ])
                .build(),
        );

        assert!(rs.next().unwrap());
        assert_eq!(rs.get_long(1).unwrap(), IntegerRead::Overflow);
        assert!(!rs.get_boolean(2).unwrap());
        assert_eq!(rs.get_string(2).unwrap(), None);
        assert!(rs.get_timestamp(3).unwrap().unwrap().is_zero());
        assert!(!rs.next().unwrap());
    }

    #[test]
    fn test_cell_access_requires_current_row() {
        let (_, mut rs) = rows(
            InMemoryResultSet::builder()
                .column("id", SqlType::Integer)
                .row(vec![NativeCell::Long(1)])
                .build(),
        );
        let err = rs.get_long(1).unwrap_err();
        assert_eq!(err.sql_state.as_deref(), Some("24000"));

        rs.next().unwrap();
        let err = rs.get_long(2).unwrap_err();
        assert_eq!(err.sql_state.as_deref(), Some("07009"));
    }

    #[test]
    fn test_stream_close_is_tracked() {
        let (connector, mut rs) = rows(
            InMemoryResultSet::builder()
                .column("data", SqlType::Blob)
                .row(vec![NativeCell::Bytes(vec![1, 2, 3])])
                .build(),
        );
        rs.next().unwrap();
        let mut stream = rs.binary_stream(1).unwrap().unwrap();
        assert_eq!(connector.open_stream_count(), 1);

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        stream.close().unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
        assert_eq!(connector.open_stream_count(), 0);
    }

    #[test]
    fn test_parse_datetime_text() {
        let parsed = parse_datetime_text("2009-05-17 12:30:45.5").unwrap();
        assert_eq!((parsed.year, parsed.month, parsed.day), (2009, 5, 17));
        assert_eq!((parsed.hour, parsed.minute, parsed.second), (12, 30, 45));
        assert_eq!(parsed.nanos, 500_000_000);
        assert_eq!(render_datetime(&parsed), "2009-05-17 12:30:45.5");
        assert!(parse_datetime_text("noon").is_none());
    }

    #[tokio::test]
    async fn test_statement_records_bound_parameters() {
        let connector = InMemoryConnector::default().with_update_count(2);
        let target = NativeTarget {
            connection_string: "jdbc:h2:mem".into(),
            properties: BTreeMap::new(),
        };
        let mut conn = connector.connect(&target).await.unwrap();
        let mut stmt = conn
            .prepare("UPDATE t SET a = ? WHERE b = ?", PrepareOptions::default())
            .await
            .unwrap();
        stmt.set_string(1, "x").unwrap();
        stmt.set_long(2, 7).unwrap();

        assert_eq!(stmt.execute_update().await.unwrap(), 2);
        connector.assert_last_statement(
            "UPDATE t SET a = ? WHERE b = ?",
            &[BoundValue::Text("x".into()), BoundValue::Long(7)],
        );
        connector.assert_statement_count(1);
        assert_eq!(connector.connect_targets().len(), 1);
    }
}
