use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::{Client, Config, NoTls, Row, Statement};
use url::Url;

use crate::error::NativeError;
use crate::traits::{
    ColumnStream, Connector, NativeConnection, NativeStatement, NativeTarget, PrepareOptions,
    ResultAccessor,
};
use crate::types::{ColumnMetadata, IntegerRead, SqlDateTime, SqlType};

type PgValue = Box<dyn ToSql + Sync + Send>;

/// Opens PostgreSQL sessions with tokio-postgres.
///
/// Understands `postgresql://` targets plus the `user`, `password`,
/// `application_name`, `client_encoding` and `connect_timeout` properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPostgresConnector;

impl TokioPostgresConnector {
    pub fn new() -> Self {
        Self
    }
}

fn config_for(target: &NativeTarget) -> Result<Config, NativeError> {
    let url = Url::parse(&target.connection_string).map_err(|e| {
        NativeError::new(format!("invalid connection string: {e}")).with_sql_state("08001")
    })?;

    let mut config = Config::new();
    if let Some(host) = url.host_str() {
        config.host(host);
    }
    if let Some(port) = url.port() {
        config.port(port);
    }
    let dbname = url.path().trim_start_matches('/');
    if !dbname.is_empty() {
        config.dbname(dbname);
    }

    let user = target
        .property("user")
        .or_else(|| Some(url.username()).filter(|u| !u.is_empty()));
    if let Some(user) = user {
        config.user(user);
    }
    if let Some(password) = target.property("password").or(url.password()) {
        config.password(password);
    }
    if let Some(name) = target.property("application_name") {
        config.application_name(name);
    }
    if let Some(encoding) = target.property("client_encoding") {
        config.options(&format!("-c client_encoding={encoding}"));
    }
    if let Some(timeout) = target.property("connect_timeout") {
        let secs = timeout.parse::<u64>().map_err(|_| {
            NativeError::new(format!("invalid connect_timeout: {timeout}")).with_sql_state("08001")
        })?;
        config.connect_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

#[async_trait]
impl Connector for TokioPostgresConnector {
    fn name(&self) -> &str {
        "tokio-postgres"
    }

    async fn connect(&self, target: &NativeTarget) -> Result<Box<dyn NativeConnection>, NativeError> {
        let config = config_for(target)?;
        let (client, connection) = config.connect(NoTls).await.map_err(pg_error)?;

        // Spawn the connection handler
        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection error");
            }
        });

        Ok(Box::new(PgConnection {
            client: Arc::new(client),
            task,
        }))
    }
}

struct PgConnection {
    client: Arc<Client>,
    task: JoinHandle<()>,
}

#[async_trait]
impl NativeConnection for PgConnection {
    async fn execute_batch(&mut self, sql: &str) -> Result<(), NativeError> {
        self.client.batch_execute(sql).await.map_err(pg_error)
    }

    async fn prepare(
        &mut self,
        sql: &str,
        _options: PrepareOptions,
    ) -> Result<Box<dyn NativeStatement>, NativeError> {
        let statement = self
            .client
            .prepare(&rewrite_placeholders(sql))
            .await
            .map_err(pg_error)?;
        let params = vec![None; statement.params().len()];
        Ok(Box::new(PgStatement {
            client: Arc::clone(&self.client),
            statement,
            sql: sql.to_string(),
            params,
        }))
    }

    async fn close(&mut self) -> Result<(), NativeError> {
        self.task.abort();
        Ok(())
    }
}

/// Rewrite `?` placeholders to `$n`, leaving quoted text alone.
fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut n = 0;
    for c in sql.chars() {
        match (quote, c) {
            (None, '\'' | '"') => {
                quote = Some(c);
                out.push(c);
            }
            (Some(q), _) if c == q => {
                quote = None;
                out.push(c);
            }
            (None, '?') => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum PgParam {
    Null,
    Long(i64),
    Double(f64),
    Decimal(Decimal),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(SqlDateTime),
}

/// Server types grouped the way values are converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PgKind {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Bool,
    Text,
    Bytea,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Other,
}

fn kind(ty: &Type) -> PgKind {
    if *ty == Type::INT2 {
        PgKind::Int2
    } else if *ty == Type::INT4 {
        PgKind::Int4
    } else if *ty == Type::INT8 {
        PgKind::Int8
    } else if *ty == Type::FLOAT4 {
        PgKind::Float4
    } else if *ty == Type::FLOAT8 {
        PgKind::Float8
    } else if *ty == Type::NUMERIC {
        PgKind::Numeric
    } else if *ty == Type::BOOL {
        PgKind::Bool
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::UNKNOWN].contains(ty) {
        PgKind::Text
    } else if *ty == Type::BYTEA {
        PgKind::Bytea
    } else if *ty == Type::DATE {
        PgKind::Date
    } else if *ty == Type::TIME {
        PgKind::Time
    } else if *ty == Type::TIMESTAMP {
        PgKind::Timestamp
    } else if *ty == Type::TIMESTAMPTZ {
        PgKind::TimestampTz
    } else {
        PgKind::Other
    }
}

/// Native type code for a server type.
fn sql_type_for(ty: &Type) -> SqlType {
    match kind(ty) {
        PgKind::Int2 => SqlType::SmallInt,
        PgKind::Int4 => SqlType::Integer,
        PgKind::Int8 => SqlType::BigInt,
        PgKind::Float4 => SqlType::Real,
        PgKind::Float8 => SqlType::Double,
        PgKind::Numeric => SqlType::Numeric,
        PgKind::Bool => SqlType::Boolean,
        PgKind::Text if *ty == Type::BPCHAR => SqlType::Char,
        PgKind::Text => SqlType::Varchar,
        PgKind::Bytea => SqlType::Binary,
        PgKind::Date => SqlType::Date,
        PgKind::Time => SqlType::Time,
        PgKind::Timestamp => SqlType::Timestamp,
        PgKind::TimestampTz => SqlType::TimestampWithTimeZone,
        PgKind::Other => SqlType::Other(1111),
    }
}

fn type_mismatch(value: &PgParam, ty: &Type) -> NativeError {
    NativeError::new(format!("cannot bind {value:?} to a parameter of type {ty}"))
        .with_sql_state("22018")
}

/// SQL NULL for a parameter of any server type, e.g. jsonb or uuid.
#[derive(Debug)]
struct UntypedNull;

impl ToSql for UntypedNull {
    fn to_sql(
        &self,
        _ty: &Type,
        _out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn typed_null(ty: &Type) -> PgValue {
    match kind(ty) {
        PgKind::Int2 => Box::new(None::<i16>),
        PgKind::Int4 => Box::new(None::<i32>),
        PgKind::Int8 => Box::new(None::<i64>),
        PgKind::Float4 => Box::new(None::<f32>),
        PgKind::Float8 => Box::new(None::<f64>),
        PgKind::Numeric => Box::new(None::<Decimal>),
        PgKind::Bool => Box::new(None::<bool>),
        PgKind::Bytea => Box::new(None::<Vec<u8>>),
        PgKind::Date => Box::new(None::<NaiveDate>),
        PgKind::Time => Box::new(None::<NaiveTime>),
        PgKind::Timestamp => Box::new(None::<NaiveDateTime>),
        PgKind::TimestampTz => Box::new(None::<DateTime<Utc>>),
        PgKind::Text => Box::new(None::<String>),
        PgKind::Other => Box::new(UntypedNull),
    }
}

fn integer_value(v: i64, param: &PgParam, ty: &Type) -> Result<PgValue, NativeError> {
    let out_of_range = || {
        NativeError::new(format!("value {v} out of range for type {ty}")).with_sql_state("22003")
    };
    let value: PgValue = match kind(ty) {
        PgKind::Int2 => Box::new(i16::try_from(v).map_err(|_| out_of_range())?),
        PgKind::Int4 => Box::new(i32::try_from(v).map_err(|_| out_of_range())?),
        PgKind::Int8 => Box::new(v),
        PgKind::Float4 => Box::new(v as f32),
        PgKind::Float8 => Box::new(v as f64),
        PgKind::Numeric => Box::new(Decimal::from(v)),
        PgKind::Bool => Box::new(v != 0),
        PgKind::Text => Box::new(v.to_string()),
        _ => return Err(type_mismatch(param, ty)),
    };
    Ok(value)
}

fn decimal_value(d: Decimal, param: &PgParam, ty: &Type) -> Result<PgValue, NativeError> {
    match kind(ty) {
        PgKind::Numeric => Ok(Box::new(d)),
        PgKind::Float4 | PgKind::Float8 => {
            let v = d.to_f64().ok_or_else(|| type_mismatch(param, ty))?;
            let value: PgValue = if kind(ty) == PgKind::Float4 {
                Box::new(v as f32)
            } else {
                Box::new(v)
            };
            Ok(value)
        }
        PgKind::Text => Ok(Box::new(d.to_string())),
        _ if d.fract().is_zero() => {
            let v = d.to_i64().ok_or_else(|| {
                NativeError::new(format!("value {d} out of range for type {ty}"))
                    .with_sql_state("22003")
            })?;
            integer_value(v, param, ty)
        }
        _ => Err(type_mismatch(param, ty)),
    }
}

fn datetime_value(v: &SqlDateTime, param: &PgParam, ty: &Type) -> Result<PgValue, NativeError> {
    let invalid = || NativeError::new(format!("invalid date/time {v:?}")).with_sql_state("22007");
    let dt = v.to_datetime().ok_or_else(invalid)?;
    let value: PgValue = match kind(ty) {
        PgKind::Date => Box::new(dt.date()),
        PgKind::Time => Box::new(dt.time()),
        PgKind::Timestamp => Box::new(dt),
        PgKind::TimestampTz => Box::new(dt.and_utc()),
        PgKind::Text => Box::new(dt.to_string()),
        _ => return Err(type_mismatch(param, ty)),
    };
    Ok(value)
}

/// Convert a bound value to the server's declared type for its slot.
fn encode(param: &PgParam, ty: &Type) -> Result<PgValue, NativeError> {
    match param {
        PgParam::Null => Ok(typed_null(ty)),
        PgParam::Long(v) => integer_value(*v, param, ty),
        PgParam::Decimal(d) => decimal_value(*d, param, ty),
        PgParam::Double(v) => match kind(ty) {
            PgKind::Float8 => Ok(Box::new(*v)),
            PgKind::Float4 => Ok(Box::new(*v as f32)),
            PgKind::Text => Ok(Box::new(v.to_string())),
            _ => {
                let d = Decimal::from_f64(*v).ok_or_else(|| type_mismatch(param, ty))?;
                decimal_value(d, param, ty)
            }
        },
        PgParam::Bool(b) => match kind(ty) {
            PgKind::Bool => Ok(Box::new(*b)),
            PgKind::Text => Ok(Box::new(b.to_string())),
            _ => integer_value(i64::from(*b), param, ty),
        },
        PgParam::Bytes(b) => match kind(ty) {
            PgKind::Bytea => Ok(Box::new(b.clone())),
            _ => Err(type_mismatch(param, ty)),
        },
        PgParam::DateTime(v) => datetime_value(v, param, ty),
        PgParam::Text(s) => match kind(ty) {
            PgKind::Text | PgKind::Other => Ok(Box::new(s.clone())),
            PgKind::Bytea => Ok(Box::new(s.clone().into_bytes())),
            PgKind::Bool => match s.trim().to_ascii_lowercase().as_str() {
                "t" | "true" | "1" => Ok(Box::new(true)),
                "f" | "false" | "0" => Ok(Box::new(false)),
                _ => Err(type_mismatch(param, ty)),
            },
            PgKind::Date | PgKind::Time | PgKind::Timestamp | PgKind::TimestampTz => {
                let parsed = NaiveDateTime::from_str(s.trim())
                    .or_else(|_| NaiveDate::from_str(s.trim()).map(|d| d.and_time(NaiveTime::MIN)))
                    .map_err(|_| type_mismatch(param, ty))?;
                datetime_value(&parsed.into(), param, ty)
            }
            _ => {
                let d = Decimal::from_str(s.trim()).map_err(|_| type_mismatch(param, ty))?;
                decimal_value(d, param, ty)
            }
        },
    }
}

struct PgStatement {
    client: Arc<Client>,
    statement: Statement,
    sql: String,
    params: Vec<Option<PgParam>>,
}

impl PgStatement {
    fn set(&mut self, slot: usize, value: PgParam) -> Result<(), NativeError> {
        let count = self.params.len();
        let entry = slot
            .checked_sub(1)
            .and_then(|i| self.params.get_mut(i))
            .ok_or_else(|| {
                NativeError::new(format!("parameter index {slot} out of range (1..={count})"))
                    .with_sql_state("07009")
            })?;
        *entry = Some(value);
        Ok(())
    }

    fn encoded(&self) -> Result<Vec<PgValue>, NativeError> {
        self.params
            .iter()
            .zip(self.statement.params())
            .enumerate()
            .map(|(i, (param, ty))| match param {
                Some(param) => encode(param, ty),
                None => Err(NativeError::new(format!(
                    "no value specified for parameter {}",
                    i + 1
                ))
                .with_sql_state("07002")),
            })
            .collect()
    }
}

#[async_trait]
impl NativeStatement for PgStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn parameter_type(&mut self, slot: usize) -> Result<SqlType, NativeError> {
        slot.checked_sub(1)
            .and_then(|i| self.statement.params().get(i))
            .map(sql_type_for)
            .ok_or_else(|| {
                NativeError::new(format!("parameter index {slot} out of range"))
                    .with_sql_state("07009")
            })
    }

    fn set_null(&mut self, slot: usize, _sql_type: SqlType) -> Result<(), NativeError> {
        self.set(slot, PgParam::Null)
    }

    fn set_int(&mut self, slot: usize, value: i32) -> Result<(), NativeError> {
        self.set(slot, PgParam::Long(i64::from(value)))
    }

    fn set_long(&mut self, slot: usize, value: i64) -> Result<(), NativeError> {
        self.set(slot, PgParam::Long(value))
    }

    fn set_double(&mut self, slot: usize, value: f64) -> Result<(), NativeError> {
        self.set(slot, PgParam::Double(value))
    }

    fn set_decimal(&mut self, slot: usize, value: Decimal) -> Result<(), NativeError> {
        self.set(slot, PgParam::Decimal(value))
    }

    fn set_boolean(&mut self, slot: usize, value: bool) -> Result<(), NativeError> {
        self.set(slot, PgParam::Bool(value))
    }

    fn set_string(&mut self, slot: usize, value: &str) -> Result<(), NativeError> {
        self.set(slot, PgParam::Text(value.to_string()))
    }

    fn set_bytes(&mut self, slot: usize, value: &[u8]) -> Result<(), NativeError> {
        self.set(slot, PgParam::Bytes(value.to_vec()))
    }

    fn set_date(&mut self, slot: usize, value: SqlDateTime) -> Result<(), NativeError> {
        self.set(slot, PgParam::DateTime(value))
    }

    fn set_timestamp(&mut self, slot: usize, value: SqlDateTime) -> Result<(), NativeError> {
        self.set(slot, PgParam::DateTime(value))
    }

    fn set_object(
        &mut self,
        slot: usize,
        value: &str,
        _sql_type: SqlType,
    ) -> Result<(), NativeError> {
        self.set(slot, PgParam::Text(value.to_string()))
    }

    async fn execute_update(&mut self) -> Result<u64, NativeError> {
        let values = self.encoded()?;
        let refs: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|b| b.as_ref() as &(dyn ToSql + Sync))
            .collect();
        self.client
            .execute(&self.statement, &refs)
            .await
            .map_err(pg_error)
    }

    async fn execute_query(&mut self) -> Result<Box<dyn ResultAccessor>, NativeError> {
        let values = self.encoded()?;
        let refs: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|b| b.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let rows = self
            .client
            .query(&self.statement, &refs)
            .await
            .map_err(pg_error)?;
        let columns = self
            .statement
            .columns()
            .iter()
            .map(|c| (ColumnMetadata::new(c.name(), sql_type_for(c.type_())), c.type_().clone()))
            .collect();
        Ok(Box::new(PgRows {
            columns,
            rows,
            cursor: None,
        }))
    }
}

struct PgRows {
    columns: Vec<(ColumnMetadata, Type)>,
    rows: Vec<Row>,
    cursor: Option<usize>,
}

impl PgRows {
    fn current(&self, index: usize) -> Result<(&Row, usize, &Type), NativeError> {
        let row = self
            .cursor
            .and_then(|c| self.rows.get(c))
            .ok_or_else(|| NativeError::new("no current row").with_sql_state("24000"))?;
        let (_, ty) = index
            .checked_sub(1)
            .and_then(|i| self.columns.get(i))
            .ok_or_else(|| {
                NativeError::new(format!("invalid column index: {index}")).with_sql_state("07009")
            })?;
        Ok((row, index - 1, ty))
    }

    fn read<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, NativeError> {
        row.try_get::<_, Option<T>>(idx).map_err(pg_error)
    }

    fn text(&self, index: usize) -> Result<Option<String>, NativeError> {
        let (row, idx, ty) = self.current(index)?;
        Ok(match kind(ty) {
            PgKind::Int2 => Self::read::<i16>(row, idx)?.map(|v| v.to_string()),
            PgKind::Int4 => Self::read::<i32>(row, idx)?.map(|v| v.to_string()),
            PgKind::Int8 => Self::read::<i64>(row, idx)?.map(|v| v.to_string()),
            PgKind::Float4 => Self::read::<f32>(row, idx)?.map(|v| v.to_string()),
            PgKind::Float8 => Self::read::<f64>(row, idx)?.map(|v| v.to_string()),
            PgKind::Numeric => Self::read::<Decimal>(row, idx)?.map(|v| v.to_string()),
            PgKind::Bool => Self::read::<bool>(row, idx)?.map(|v| v.to_string()),
            PgKind::Bytea => {
                Self::read::<Vec<u8>>(row, idx)?.map(|v| String::from_utf8_lossy(&v).into_owned())
            }
            PgKind::Date => Self::read::<NaiveDate>(row, idx)?.map(|v| v.to_string()),
            PgKind::Time => Self::read::<NaiveTime>(row, idx)?.map(|v| v.to_string()),
            PgKind::Timestamp => Self::read::<NaiveDateTime>(row, idx)?.map(|v| v.to_string()),
            PgKind::TimestampTz => Self::read::<DateTime<Utc>>(row, idx)?.map(|v| v.to_rfc3339()),
            PgKind::Text | PgKind::Other => Self::read::<String>(row, idx)?,
        })
    }
}

fn conversion_error(ty: &Type, target: &str) -> NativeError {
    NativeError::new(format!("cannot read {ty} as {target}")).with_sql_state("22018")
}

/// NaN and the infinities have no decimal form.
fn float_to_decimal(value: f64, ty: &Type) -> Result<Decimal, NativeError> {
    Decimal::from_f64_retain(value).ok_or_else(|| {
        NativeError::new(format!("cannot read {ty} value {value} as decimal"))
            .with_sql_state("22003")
    })
}

fn long_from_decimal(value: Decimal) -> IntegerRead {
    value
        .trunc()
        .to_i64()
        .map_or(IntegerRead::Overflow, IntegerRead::Value)
}

impl ResultAccessor for PgRows {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_metadata(&self, index: usize) -> Result<ColumnMetadata, NativeError> {
        index
            .checked_sub(1)
            .and_then(|i| self.columns.get(i))
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| {
                NativeError::new(format!("invalid column index: {index}")).with_sql_state("07009")
            })
    }

    fn next(&mut self) -> Result<bool, NativeError> {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.cursor = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn get_long(&mut self, index: usize) -> Result<IntegerRead, NativeError> {
        let (row, idx, ty) = self.current(index)?;
        let value = match kind(ty) {
            PgKind::Int2 => Self::read::<i16>(row, idx)?.map(|v| IntegerRead::Value(v.into())),
            PgKind::Int4 => Self::read::<i32>(row, idx)?.map(|v| IntegerRead::Value(v.into())),
            PgKind::Int8 => Self::read::<i64>(row, idx)?.map(IntegerRead::Value),
            PgKind::Bool => Self::read::<bool>(row, idx)?.map(|v| IntegerRead::Value(v.into())),
            PgKind::Numeric => Self::read::<Decimal>(row, idx)?.map(long_from_decimal),
            PgKind::Float4 | PgKind::Float8 | PgKind::Text => match self.text(index)? {
                None => None,
                Some(text) => Some(
                    Decimal::from_str(text.trim())
                        .map(long_from_decimal)
                        .map_err(|_| conversion_error(ty, "long"))?,
                ),
            },
            _ => return Err(conversion_error(ty, "long")),
        };
        Ok(value.unwrap_or(IntegerRead::Null))
    }

    fn get_decimal(&mut self, index: usize) -> Result<Option<Decimal>, NativeError> {
        let (row, idx, ty) = self.current(index)?;
        match kind(ty) {
            PgKind::Numeric => Self::read::<Decimal>(row, idx),
            PgKind::Float8 => Self::read::<f64>(row, idx)?
                .map(|v| float_to_decimal(v, ty))
                .transpose(),
            PgKind::Float4 => Self::read::<f32>(row, idx)?
                .map(|v| float_to_decimal(f64::from(v), ty))
                .transpose(),
            PgKind::Int2 | PgKind::Int4 | PgKind::Int8 | PgKind::Bool | PgKind::Text => {
                match self.text(index)? {
                    None => Ok(None),
                    Some(text) => Decimal::from_str(text.trim())
                        .map(Some)
                        .map_err(|_| conversion_error(ty, "decimal")),
                }
            }
            _ => Err(conversion_error(ty, "decimal")),
        }
    }

    fn get_string(&mut self, index: usize) -> Result<Option<String>, NativeError> {
        self.text(index)
    }

    fn get_boolean(&mut self, index: usize) -> Result<bool, NativeError> {
        let (row, idx, ty) = self.current(index)?;
        if kind(ty) == PgKind::Bool {
            return Ok(Self::read::<bool>(row, idx)?.unwrap_or(false));
        }
        match self.text(index)? {
            None => Ok(false),
            Some(text) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "t" | "true" => Ok(true),
                "0" | "f" | "false" => Ok(false),
                _ => Err(conversion_error(ty, "boolean")),
            },
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
        let (row, idx, ty) = self.current(index)?;
        if kind(ty) == PgKind::Time {
            return Ok(Self::read::<NaiveTime>(row, idx)?.and_then(|t| {
                NaiveDate::from_ymd_opt(1970, 1, 1).map(|epoch| epoch.and_time(t).into())
            }));
        }
        self.get_timestamp(index)
    }

    fn get_timestamp(&mut self, index: usize) -> Result<Option<SqlDateTime>, NativeError> {
        let (row, idx, ty) = self.current(index)?;
        match kind(ty) {
            PgKind::Date => Ok(Self::read::<NaiveDate>(row, idx)?.map(SqlDateTime::from)),
            PgKind::Timestamp => Ok(Self::read::<NaiveDateTime>(row, idx)?.map(SqlDateTime::from)),
            PgKind::TimestampTz => {
                Ok(Self::read::<DateTime<Utc>>(row, idx)?.map(|v| v.naive_utc().into()))
            }
            PgKind::Time => self.get_time(index),
            _ => Err(conversion_error(ty, "timestamp")),
        }
    }

    fn binary_stream(
        &mut self,
        index: usize,
    ) -> Result<Option<Box<dyn ColumnStream>>, NativeError> {
        let (row, idx, ty) = self.current(index)?;
        let bytes = match kind(ty) {
            PgKind::Bytea => Self::read::<Vec<u8>>(row, idx)?,
            _ => self.text(index)?.map(String::into_bytes),
        };
        Ok(bytes.map(|b| Box::new(Cursor::new(b)) as Box<dyn ColumnStream>))
    }

    fn ascii_stream(
        &mut self,
        index: usize,
    ) -> Result<Option<Box<dyn ColumnStream>>, NativeError> {
        Ok(self
            .text(index)?
            .map(|s| Box::new(Cursor::new(s.into_bytes())) as Box<dyn ColumnStream>))
    }
}

fn pg_error(err: tokio_postgres::Error) -> NativeError {
    if let Some(db) = err.as_db_error() {
        return NativeError::new(db.message()).with_sql_state(db.code().code());
    }
    let native = NativeError::new(err.to_string());
    if err.is_closed() {
        native.with_sql_state("08006")
    } else {
        native
    }
}
