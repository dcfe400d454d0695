//! sqlbridge - one connection, binding and decoding surface over many SQL
//! backends
//!
//! Each backend is described by a [`DriverDefinition`]: its URI schemes,
//! capability flags, and the hooks that coerce native column values into
//! [`CanonicalValue`]s and back. Native sessions come from a [`Connector`].
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use sqlbridge::{Connection, DriverRegistry, UriDescriptor};
//! use sqlbridge::transport::TokioPostgresConnector;
//!
//! let registry = DriverRegistry::builder()
//!     .with_builtin_definitions()
//!     .default_connector("postgres", Arc::new(TokioPostgresConnector::new()))
//!     .build();
//!
//! let descriptor = UriDescriptor::new("postgres")
//!     .host("localhost")
//!     .path("/orders")
//!     .user("app")
//!     .password("secret");
//! let mut conn = Connection::open(&registry, descriptor).await?;
//!
//! let row = conn
//!     .query("SELECT id, name FROM users WHERE name = ?", &["John".into()], None)
//!     .await?
//!     .single_row()?;
//! let id = row.get_by_name("id")?;
//!
//! conn.dispose().await;
//! ```

pub mod config;
pub mod connection;
pub mod drivers;
pub mod error;
pub mod registry;
pub mod traits;
pub mod transport;
pub mod types;
pub mod uri;

// Re-export main types for convenient access
pub use config::SessionConfig;
pub use connection::{Connection, ConnectionState};
pub use error::{DriverError, Error, ErrorCategory, NativeError, Result};
pub use registry::{DriverRegistry, DriverRegistryBuilder};
pub use traits::{Capabilities, Connector, DriverDefinition, DriverProfile};
pub use types::{CanonicalType, CanonicalValue, ExecResult, ResultSet, Row};
pub use uri::{ConnectionDescriptor, ConnectionUri, UriDescriptor};
