pub mod canonical;
pub mod native;
pub mod row;

pub use canonical::{CanonicalType, CanonicalValue};
pub use native::{ColumnMetadata, IntegerRead, SqlDateTime, SqlType};
pub use row::{ExecResult, ResultSet, Row};
