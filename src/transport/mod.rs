//! Native connectors.
//!
//! [`InMemoryConnector`] scripts results for tests; [`TokioPostgresConnector`]
//! talks to a real PostgreSQL server.

mod in_memory;
mod tokio_postgres;

pub use self::in_memory::{
    BoundValue, InMemoryConnector, InMemoryResultBuilder, InMemoryResultSet, NativeCell,
    RecordedStatement,
};
pub use self::tokio_postgres::TokioPostgresConnector;
