use crate::traits::{Capabilities, DriverDefinition, DriverProfile};

static PROFILE: DriverProfile = DriverProfile::new("hsqldb", "hsqldb", "Hsqldb")
    .with_connection_prefix("jdbc:")
    .with_capabilities(Capabilities {
        generated_keys: true,
        scrollable_results: true,
        connection_encodings: false,
        generated_keys_via_prepare_flag: true,
    });

#[derive(Debug, Default, Clone, Copy)]
pub struct HsqldbDefinition;

impl HsqldbDefinition {
    pub fn new() -> Self {
        Self
    }
}

impl DriverDefinition for HsqldbDefinition {
    fn profile(&self) -> &DriverProfile {
        &PROFILE
    }
}
