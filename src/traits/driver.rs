use std::borrow::Cow;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::config::SessionConfig;
use crate::drivers::base;
use crate::error::{DriverError, NativeError, Result};
use crate::traits::native::{NativeConnection, NativeStatement, ResultAccessor};
use crate::types::{CanonicalType, CanonicalValue, ColumnMetadata, SqlDateTime};
use crate::uri::{self, ConnectionDescriptor, ConnectionUri, QueryMap};

/// Fixed per-backend capability flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub generated_keys: bool,
    pub scrollable_results: bool,
    pub connection_encodings: bool,
    /// Generated keys must be requested when the statement is prepared.
    pub generated_keys_via_prepare_flag: bool,
}

/// Identity and capabilities of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverProfile {
    /// Canonical URI scheme, e.g. `oracle`.
    pub scheme: &'static str,
    /// Scheme of the backend's own connection strings, e.g. `oracle.thin`.
    pub native_scheme: &'static str,
    /// Display name, e.g. `Oracle`.
    pub module_name: &'static str,
    /// Prepended to native connection strings that lack it.
    pub connection_prefix: Option<&'static str>,
    pub capabilities: Capabilities,
}

impl DriverProfile {
    pub const fn new(
        scheme: &'static str,
        native_scheme: &'static str,
        module_name: &'static str,
    ) -> Self {
        Self {
            scheme,
            native_scheme,
            module_name,
            connection_prefix: None,
            capabilities: Capabilities {
                generated_keys: false,
                scrollable_results: false,
                connection_encodings: false,
                generated_keys_via_prepare_flag: false,
            },
        }
    }

    pub const fn with_connection_prefix(mut self, prefix: &'static str) -> Self {
        self.connection_prefix = Some(prefix);
        self
    }

    pub const fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Per-backend behaviour behind every connection.
///
/// Every hook has a shared default in [`crate::drivers::base`]. A backend
/// provides [`profile`](DriverDefinition::profile) and overrides only the
/// hooks where its native driver deviates. Definitions are immutable and
/// shared across connections.
#[async_trait]
pub trait DriverDefinition: Send + Sync {
    fn profile(&self) -> &DriverProfile;

    fn scheme(&self) -> &'static str {
        self.profile().scheme
    }

    fn native_scheme(&self) -> &'static str {
        self.profile().native_scheme
    }

    fn module_name(&self) -> &'static str {
        self.profile().module_name
    }

    fn capabilities(&self) -> Capabilities {
        self.profile().capabilities
    }

    fn supports_generated_keys(&self) -> bool {
        self.capabilities().generated_keys
    }

    fn supports_scrollable_results(&self) -> bool {
        self.capabilities().scrollable_results
    }

    fn supports_connection_encodings(&self) -> bool {
        self.capabilities().connection_encodings
    }

    fn supports_generated_keys_via_prepare_flag(&self) -> bool {
        self.capabilities().generated_keys_via_prepare_flag
    }

    fn parse_connection_uri(&self, descriptor: &ConnectionDescriptor) -> Result<ConnectionUri> {
        uri::resolve(self.profile(), descriptor)
    }

    /// Canonical type for a column when the caller supplied none.
    fn infer_type(&self, column: &ColumnMetadata) -> CanonicalType {
        base::infer_type(column)
    }

    /// Decode the current row's column `index` (1-based) as `ty`. SQL NULL
    /// always decodes to [`CanonicalValue::Nil`].
    fn decode_column(
        &self,
        rs: &mut dyn ResultAccessor,
        index: usize,
        ty: CanonicalType,
    ) -> std::result::Result<CanonicalValue, NativeError> {
        base::decode_column(self, rs, index, ty)
    }

    /// Bind `value` into parameter `slot` (1-based), dispatching on the
    /// value's own type.
    fn bind_parameter(
        &self,
        stmt: &mut dyn NativeStatement,
        value: &CanonicalValue,
        slot: usize,
    ) -> std::result::Result<(), NativeError> {
        base::bind_parameter(stmt, value, slot)
    }

    fn wrap_error(&self, err: &NativeError, stmt: Option<&dyn NativeStatement>) -> DriverError {
        DriverError::from_native(self.module_name(), err, stmt.map(|s| self.statement_text(s)))
    }

    /// Best-effort rendering of the statement for diagnostics. Never fails.
    fn statement_text(&self, stmt: &dyn NativeStatement) -> String {
        stmt.describe()
    }

    fn quote_string(&self, value: &str) -> String {
        base::quote_string(value)
    }

    fn default_connection_properties(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Record the client encoding among the connection properties.
    fn encoding_property(&self, _properties: &mut BTreeMap<String, String>, _encoding: &str) {}

    /// Session setup run once, right after the native connection opens.
    async fn after_connect(
        &self,
        _conn: &mut dyn NativeConnection,
        _query: &QueryMap,
        _config: &SessionConfig,
    ) -> std::result::Result<(), NativeError> {
        Ok(())
    }

    /// Whether a timestamp read is the backend's stand-in for NULL. The
    /// default also treats the Unix epoch as NULL; override to keep it.
    fn is_null_timestamp(&self, value: &SqlDateTime) -> bool {
        base::is_null_timestamp(value)
    }

    /// Whether a time read is the backend's stand-in for NULL.
    fn is_null_time(&self, value: NaiveDateTime) -> bool {
        base::is_null_time(value)
    }

    /// SQL actually prepared for `sql`.
    fn prepare_sql_text<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(sql)
    }

    /// Register an output parameter at `slot` if `sql` returns a value
    /// through one. Returns whether a parameter was registered.
    fn register_return_param(
        &self,
        _sql: &str,
        _stmt: &mut dyn NativeStatement,
        _slot: usize,
    ) -> std::result::Result<bool, NativeError> {
        Ok(false)
    }

    /// Value of the registered output parameter after execution.
    async fn return_param(
        &self,
        _stmt: &mut dyn NativeStatement,
    ) -> std::result::Result<Option<i64>, NativeError> {
        Ok(None)
    }

    /// Key of the last inserted row, fetched through a separate query.
    async fn generated_keys(
        &self,
        _conn: &mut dyn NativeConnection,
    ) -> std::result::Result<Option<i64>, NativeError> {
        Ok(None)
    }
}
