use crate::traits::{Capabilities, DriverDefinition, DriverProfile};

static PROFILE: DriverProfile = DriverProfile::new("h2", "h2", "H2")
    .with_connection_prefix("jdbc:")
    .with_capabilities(Capabilities {
        generated_keys: true,
        scrollable_results: true,
        connection_encodings: false,
        generated_keys_via_prepare_flag: true,
    });

/// H2, embedded or in-memory (`h2:mem:name`).
#[derive(Debug, Default, Clone, Copy)]
pub struct H2Definition;

impl H2Definition {
    pub fn new() -> Self {
        Self
    }
}

impl DriverDefinition for H2Definition {
    fn profile(&self) -> &DriverProfile {
        &PROFILE
    }
}
