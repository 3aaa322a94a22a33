//! Connection configuration.
//!
//! Configuration is a two-level mapping of namespace (`api`, `app`) to
//! key/value pairs. Caller overrides are merged onto the defaults with
//! [`merge`], which only overwrites keys that already exist in the
//! defaults. Unknown keys are dropped, not merged in.

use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::ConfigError;

/// Default endpoint host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default endpoint port.
pub const DEFAULT_PORT: u16 = 5899;

/// Namespace holding endpoint settings.
pub const API: &str = "api";

/// Namespace holding the application identity sent in the handshake.
pub const APP: &str = "app";

/// Merges `overrides` into `base` in place.
///
/// A key from `overrides` is applied only when `base` already has it at the
/// same level. When both sides hold an object at that key the merge
/// recurses; otherwise the override value replaces the base value.
pub fn merge(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        let Some(slot) = base.get_mut(key) else {
            debug!(key = %key, "Dropping config key absent from defaults");
            continue;
        };

        match (slot, value) {
            (Value::Object(base_inner), Value::Object(override_inner)) => {
                merge(base_inner, override_inner);
            }
            (slot, value) => *slot = value.clone(),
        }
    }
}

/// Identity fields sent with the authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub identifier: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Merged configuration for one connection.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use tsr_core::Config;
///
/// let config = Config::new(&json!({ "api": { "port": 1234, "unknownField": true } }));
/// assert_eq!(config.api_host(), "localhost");
/// assert_eq!(config.api_port().unwrap(), 1234);
/// assert!(config.get("api").unwrap().get("unknownField").is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    values: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        let template = json!({
            "api": {
                "host": DEFAULT_HOST,
                "port": DEFAULT_PORT,
                "key": "",
                "eventDebug": false,
            },
            "app": {
                "name": "TS Remote Apps Client",
                "identifier": "tsremote-client",
                "version": env!("CARGO_PKG_VERSION"),
                "description": "A Rust client for the TeamSpeak remote apps WebSocket API.",
            },
        });

        let values = match template {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self { values }
    }
}

impl Config {
    /// Builds a configuration from the defaults and caller overrides.
    ///
    /// Overrides that are not an object are ignored.
    pub fn new(overrides: &Value) -> Self {
        let mut config = Self::default();
        config.set(overrides);
        config
    }

    /// Parses TOML overrides (`[api]` / `[app]` tables) and merges them onto
    /// the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = source.parse()?;
        let overrides = serde_json::to_value(table)?;
        Ok(Self::new(&overrides))
    }

    /// Reads TOML overrides from a file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Returns the merged map for a namespace, or `None` if unknown.
    pub fn get(&self, namespace: &str) -> Option<&Map<String, Value>> {
        self.values.get(namespace).and_then(Value::as_object)
    }

    /// Applies a partial override with the same asymmetric merge used at
    /// construction.
    pub fn set(&mut self, partial: &Value) {
        if let Value::Object(overrides) = partial {
            merge(&mut self.values, overrides);
        }
    }

    /// Returns the full merged mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    fn lookup(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.get(namespace).and_then(|ns| ns.get(key))
    }

    fn lookup_str(&self, namespace: &str, key: &str) -> &str {
        self.lookup(namespace, key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Endpoint host.
    pub fn api_host(&self) -> &str {
        self.lookup(API, "host")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_HOST)
    }

    /// Endpoint port. Accepts a number or a numeric string.
    pub fn api_port(&self) -> Result<u16, ConfigError> {
        let invalid = |value: &Value| ConfigError::InvalidValue {
            field: "api.port".to_string(),
            value: value.to_string(),
            expected: "port number between 0 and 65535".to_string(),
        };

        match self.lookup(API, "port") {
            None => Ok(DEFAULT_PORT),
            Some(value @ Value::Number(n)) => n
                .as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .ok_or_else(|| invalid(value)),
            Some(value @ Value::String(s)) => s.trim().parse().map_err(|_| invalid(value)),
            Some(value) => Err(invalid(value)),
        }
    }

    /// Secret API key. Empty until the endpoint hands one out.
    pub fn api_key(&self) -> &str {
        self.lookup_str(API, "key")
    }

    /// Stores a rotated API key.
    pub fn set_api_key(&mut self, key: &str) {
        self.set(&json!({ "api": { "key": key } }));
    }

    /// Whether synthesized events should be logged as they are emitted.
    pub fn event_debug(&self) -> bool {
        self.lookup(API, "eventDebug")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Identity fields for the handshake payload.
    pub fn app_identity(&self) -> AppIdentity {
        AppIdentity {
            identifier: self.lookup_str(APP, "identifier").to_string(),
            name: self.lookup_str(APP, "name").to_string(),
            version: self.lookup_str(APP, "version").to_string(),
            description: self.lookup_str(APP, "description").to_string(),
        }
    }

    /// WebSocket address of the endpoint, `ws://host:port/`.
    pub fn socket_url(&self) -> Result<String, ConfigError> {
        Ok(format!("ws://{}:{}/", self.api_host(), self.api_port()?))
    }
}
