//! Explicit registry of driver definitions and native connectors.
//!
//! Built once at startup with [`DriverRegistryBuilder`] and shared by
//! reference (usually behind an `Arc`); it is never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::drivers::builtin_definitions;
use crate::error::{Error, Result};
use crate::traits::{Connector, DriverDefinition};
use crate::uri::ConnectionDescriptor;

/// Maps URI schemes to driver definitions and names to connectors.
pub struct DriverRegistry {
    definitions: HashMap<String, Arc<dyn DriverDefinition>>,
    connectors: HashMap<String, Arc<dyn Connector>>,
    /// Canonical scheme to connector name.
    default_connectors: HashMap<String, String>,
    config: SessionConfig,
}

impl DriverRegistry {
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::new()
    }

    /// A registry holding every built-in definition and no connectors.
    pub fn with_builtin_definitions() -> Self {
        Self::builder().with_builtin_definitions().build()
    }

    /// Get a definition by canonical or native scheme.
    pub fn definition(&self, scheme: &str) -> Option<Arc<dyn DriverDefinition>> {
        self.definitions.get(&scheme.to_ascii_lowercase()).cloned()
    }

    /// Pick the definition that owns a descriptor's scheme.
    pub fn definition_for(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn DriverDefinition>> {
        let scheme = descriptor
            .scheme()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MalformedUri("missing scheme".to_string()))?;
        self.definition(scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))
    }

    pub fn connector(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(name).cloned()
    }

    /// Connector for a definition. A `driver` override names the connector
    /// directly; otherwise the scheme's default is used.
    pub fn connector_for(
        &self,
        definition: &dyn DriverDefinition,
        driver_override: Option<&str>,
    ) -> Result<Arc<dyn Connector>> {
        let name = match driver_override {
            Some(name) => name,
            None => self
                .default_connectors
                .get(definition.scheme())
                .map(String::as_str)
                .ok_or_else(|| {
                    Error::DriverLoad(format!(
                        "no connector registered for {}",
                        definition.module_name()
                    ))
                })?,
        };
        self.connector(name)
            .ok_or_else(|| Error::DriverLoad(name.to_string()))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Canonical schemes with a registered definition, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self
            .definitions
            .iter()
            .filter(|(key, def)| key.as_str() == def.scheme())
            .map(|(key, _)| key.as_str())
            .collect();
        schemes.sort_unstable();
        schemes
    }

    /// Check if a definition is registered for a scheme
    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.definitions.contains_key(&scheme.to_ascii_lowercase())
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut connectors: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        connectors.sort_unstable();
        f.debug_struct("DriverRegistry")
            .field("schemes", &self.schemes())
            .field("connectors", &connectors)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`DriverRegistry`].
///
/// Starts from [`SessionConfig::from_env`], so `TZ` is the fallback session
/// time zone unless [`config`](DriverRegistryBuilder::config) replaces it.
pub struct DriverRegistryBuilder {
    definitions: HashMap<String, Arc<dyn DriverDefinition>>,
    connectors: HashMap<String, Arc<dyn Connector>>,
    default_connectors: HashMap<String, String>,
    config: SessionConfig,
}

impl Default for DriverRegistryBuilder {
    fn default() -> Self {
        Self {
            definitions: HashMap::new(),
            connectors: HashMap::new(),
            default_connectors: HashMap::new(),
            config: SessionConfig::from_env(),
        }
    }
}

impl DriverRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_definitions(self) -> Self {
        builtin_definitions()
            .into_iter()
            .fold(self, |builder, def| builder.definition(def))
    }

    /// Register a definition under its canonical and native schemes.
    /// A later registration for the same scheme replaces the earlier one.
    pub fn definition(mut self, definition: Arc<dyn DriverDefinition>) -> Self {
        tracing::info!(
            scheme = definition.scheme(),
            native_scheme = definition.native_scheme(),
            module = definition.module_name(),
            "registered driver definition"
        );
        self.definitions
            .insert(definition.native_scheme().to_string(), Arc::clone(&definition));
        self.definitions
            .insert(definition.scheme().to_string(), definition);
        self
    }

    /// Register a connector under its own name.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        tracing::info!(connector = connector.name(), "registered connector");
        self.connectors.insert(connector.name().to_string(), connector);
        self
    }

    /// Register a connector and make it the default for a canonical scheme.
    pub fn default_connector(mut self, scheme: &str, connector: Arc<dyn Connector>) -> Self {
        self.default_connectors
            .insert(scheme.to_ascii_lowercase(), connector.name().to_string());
        self.connector(connector)
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> DriverRegistry {
        DriverRegistry {
            definitions: self.definitions,
            connectors: self.connectors,
            default_connectors: self.default_connectors,
            config: self.config,
        }
    }
}
