use std::collections::BTreeMap;
use std::fmt;

/// Encoding applied when a connection URI names none.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Process-level settings applied to every connection opened with them.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Session time zone used when the URI carries no `time_zone` parameter.
    pub time_zone: Option<String>,
    pub default_encoding: String,
    /// Extra native connection properties, merged over each definition's
    /// defaults.
    pub properties: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_zone: None,
            default_encoding: DEFAULT_ENCODING.to_string(),
            properties: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the time zone taken from `TZ` when set.
    pub fn from_env() -> Self {
        let time_zone = std::env::var("TZ").ok().filter(|tz| !tz.trim().is_empty());
        Self {
            time_zone,
            ..Self::default()
        }
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    pub fn with_default_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.default_encoding = encoding.into();
        self
    }

    /// Add a connection property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

pub(crate) fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("password") || key.contains("secret") || key == "pwd"
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keep credentials out of logs.
        let properties: BTreeMap<&str, &str> = self
            .properties
            .iter()
            .map(|(k, v)| {
                let shown = if is_secret_key(k) { "***" } else { v.as_str() };
                (k.as_str(), shown)
            })
            .collect();

        f.debug_struct("SessionConfig")
            .field("time_zone", &self.time_zone)
            .field("default_encoding", &self.default_encoding)
            .field("properties", &properties)
            .finish()
    }
}
