use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::SessionConfig;
use crate::error::NativeError;
use crate::traits::{Capabilities, DriverDefinition, DriverProfile, NativeConnection};
use crate::uri::QueryMap;

static PROFILE: DriverProfile = DriverProfile::new("postgres", "postgresql", "Postgres")
    .with_capabilities(Capabilities {
        generated_keys: false,
        scrollable_results: true,
        connection_encodings: true,
        generated_keys_via_prepare_flag: true,
    });

/// PostgreSQL over a client/server connection. Honours the `encoding`
/// and `time_zone` query parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDefinition;

impl PostgresDefinition {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DriverDefinition for PostgresDefinition {
    fn profile(&self) -> &DriverProfile {
        &PROFILE
    }

    fn default_connection_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("application_name".to_string(), env!("CARGO_PKG_NAME").to_string());
        props
    }

    fn encoding_property(&self, properties: &mut BTreeMap<String, String>, encoding: &str) {
        properties.insert("client_encoding".to_string(), encoding.to_string());
    }

    async fn after_connect(
        &self,
        conn: &mut dyn NativeConnection,
        query: &QueryMap,
        _config: &SessionConfig,
    ) -> Result<(), NativeError> {
        if let Some(tz) = query.get("time_zone") {
            tracing::debug!(time_zone = %tz, "setting postgres session time zone");
            let sql = format!("SET TIME ZONE {}", self.quote_string(tz));
            conn.execute_batch(&sql).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_property() {
        let def = PostgresDefinition::new();
        let mut props = def.default_connection_properties();
        def.encoding_property(&mut props, "UTF-8");

        assert_eq!(props.get("client_encoding").map(String::as_str), Some("UTF-8"));
        assert_eq!(props.get("application_name").map(String::as_str), Some("sqlbridge"));
        assert!(def.supports_connection_encodings());
        assert_eq!(def.profile().connection_prefix, None);
    }
}
