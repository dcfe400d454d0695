use std::fmt;

use thiserror::Error;

/// Failure reported by a native driver collaborator (the tabular-access
/// layer underneath this crate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NativeError {
    /// Vendor-specific error code; zero or negative when the driver has none.
    pub vendor_code: i32,
    /// Five-character SQL state, if the driver reported one.
    pub sql_state: Option<String>,
    /// Localized driver message.
    pub message: String,
}

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            vendor_code: 0,
            sql_state: None,
            message: message.into(),
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    pub fn with_vendor_code(mut self, code: i32) -> Self {
        self.vendor_code = code;
        self
    }

    /// Wrap an I/O failure raised while reading a column stream.
    pub fn io(err: std::io::Error) -> Self {
        Self::new(format!("I/O error while reading column stream: {err}")).with_sql_state("58030")
    }

    /// The driver does not implement the requested capability.
    pub fn unsupported(feature: &str) -> Self {
        Self::new(format!("feature not supported: {feature}")).with_sql_state("0A000")
    }
}

/// A SQL-level failure normalized into one shape per backend family.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.render())]
pub struct DriverError {
    /// Backend module name, e.g. `Sqlite3`.
    pub module: String,
    pub vendor_code: Option<i32>,
    pub sql_state: Option<String>,
    pub message: String,
    /// Reconstructed text of the offending statement.
    pub statement: Option<String>,
}

impl DriverError {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            vendor_code: None,
            sql_state: None,
            message: message.into(),
            statement: None,
        }
    }

    /// Normalize a native failure. Vendor codes that are not positive are
    /// treated as absent.
    pub fn from_native(
        module: impl Into<String>,
        err: &NativeError,
        statement: Option<String>,
    ) -> Self {
        Self {
            module: module.into(),
            vendor_code: (err.vendor_code > 0).then_some(err.vendor_code),
            sql_state: err.sql_state.clone(),
            message: err.message.clone(),
            statement,
        }
    }

    /// Prefix the driver message with context such as the connection target.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    /// Name of the error family, e.g. `OracleError`.
    pub fn error_name(&self) -> String {
        format!("{}Error", self.module)
    }

    fn render(&self) -> String {
        let mut rendered = match (self.vendor_code, &self.sql_state) {
            (Some(code), Some(state)) => format!("(vendor_errno={code}, sql_state={state}) "),
            (Some(code), None) => format!("(vendor_errno={code}) "),
            (None, Some(state)) => format!("(sql_state={state}) "),
            (None, None) => String::new(),
        };
        rendered.push_str(&self.message);
        if let Some(statement) = &self.statement {
            rendered.push_str("\nQuery: ");
            rendered.push_str(statement);
        }
        rendered
    }
}

/// Broad classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Structural problems with caller input (URIs, encodings, schemes).
    Argument,
    /// Native driver could not be located or connection could not be made.
    Connection,
    /// Post-connect session setup failed.
    Initialization,
    Execution,
    Decode,
    Bind,
    /// Misuse of a connection or result, e.g. after dispose.
    Usage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument => write!(f, "argument"),
            Self::Connection => write!(f, "connection"),
            Self::Initialization => write!(f, "initialization"),
            Self::Execution => write!(f, "execution"),
            Self::Decode => write!(f, "decode"),
            Self::Bind => write!(f, "bind"),
            Self::Usage => write!(f, "usage"),
        }
    }
}

/// Error type for sqlbridge operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed URI: {0}")]
    MalformedUri(String),

    #[error("no database specified")]
    NoDatabaseSpecified,

    #[error("unsupported encoding in query parameters: {0}")]
    UnsupportedEncoding(String),

    #[error("scheme mismatch, expected: {expected} but got: {actual}")]
    SchemeMismatch { expected: String, actual: String },

    #[error("no driver definition registered for scheme: {0}")]
    UnknownScheme(String),

    #[error("driver library ({0}) not found")]
    DriverLoad(String),

    #[error("{0}")]
    Connect(DriverError),

    #[error("connection initialization error: {0}")]
    ConnectionInit(DriverError),

    #[error("{0}")]
    Execution(DriverError),

    #[error("{0}")]
    Decode(DriverError),

    #[error("{0}")]
    Bind(DriverError),

    #[error("connection is already disposed")]
    ConnectionClosed,

    #[error("field-count mismatch: expected {expected} fields, result has {actual}")]
    FieldCountMismatch { expected: usize, actual: usize },

    #[error("expected {expected} row(s), got {actual}")]
    UnexpectedRowCount { expected: usize, actual: usize },

    #[error("column not found: {0}")]
    ColumnNotFound(String),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedUri(_)
            | Self::NoDatabaseSpecified
            | Self::UnsupportedEncoding(_)
            | Self::SchemeMismatch { .. }
            | Self::UnknownScheme(_) => ErrorCategory::Argument,
            Self::DriverLoad(_) | Self::Connect(_) => ErrorCategory::Connection,
            Self::ConnectionInit(_) => ErrorCategory::Initialization,
            Self::Execution(_) => ErrorCategory::Execution,
            Self::Decode(_) | Self::FieldCountMismatch { .. } => ErrorCategory::Decode,
            Self::Bind(_) => ErrorCategory::Bind,
            Self::ConnectionClosed
            | Self::UnexpectedRowCount { .. }
            | Self::ColumnNotFound(_) => ErrorCategory::Usage,
        }
    }

    /// Structural errors raised before any SQL runs. These are never the
    /// result of a database round-trip.
    pub fn is_argument_error(&self) -> bool {
        self.category() == ErrorCategory::Argument
    }

    /// The normalized SQL error, for the variants that carry one.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Connect(e)
            | Self::ConnectionInit(e)
            | Self::Execution(e)
            | Self::Decode(e)
            | Self::Bind(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for sqlbridge operations
pub type Result<T> = std::result::Result<T, Error>;
