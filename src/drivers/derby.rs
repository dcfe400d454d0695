use crate::traits::{Capabilities, DriverDefinition, DriverProfile};

static PROFILE: DriverProfile = DriverProfile::new("derby", "derby", "Derby")
    .with_connection_prefix("jdbc:")
    .with_capabilities(Capabilities {
        generated_keys: true,
        scrollable_results: true,
        connection_encodings: false,
        generated_keys_via_prepare_flag: true,
    });

/// Apache Derby. The shared rules already cover its NULL binary streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct DerbyDefinition;

impl DerbyDefinition {
    pub fn new() -> Self {
        Self
    }
}

impl DriverDefinition for DerbyDefinition {
    fn profile(&self) -> &DriverProfile {
        &PROFILE
    }
}
