pub mod base;
mod derby;
mod h2;
mod hsqldb;
mod oracle;
mod postgres;
mod sqlite3;

use std::sync::Arc;

use crate::traits::DriverDefinition;

pub use self::derby::DerbyDefinition;
pub use self::h2::H2Definition;
pub use self::hsqldb::HsqldbDefinition;
pub use self::oracle::OracleDefinition;
pub use self::postgres::PostgresDefinition;
pub use self::sqlite3::Sqlite3Definition;

/// Every definition shipped with the crate.
pub fn builtin_definitions() -> Vec<Arc<dyn DriverDefinition>> {
    vec![
        Arc::new(Sqlite3Definition::new()),
        Arc::new(DerbyDefinition::new()),
        Arc::new(H2Definition::new()),
        Arc::new(HsqldbDefinition::new()),
        Arc::new(PostgresDefinition::new()),
        Arc::new(OracleDefinition::new()),
    ]
}
