//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observability::capture::DEFAULT_CAPTURE_BUDGET;

/// Root configuration for the OPC XML-DA client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Server endpoint URL (http or https).
    pub endpoint: String,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Browse request settings.
    pub browse: BrowseConfig,

    /// Single item read.
    pub read: ReadConfig,

    /// HTTP exchange tracing.
    pub net_debug: NetDebugConfig,

    /// Optional basic authentication.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// What the client does once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Status,
    Browse,
    Read,
}

impl ClientConfig {
    /// Read when an item is named, browse when a root is named, else status.
    pub fn mode(&self) -> Mode {
        if self.read.has_item() {
            Mode::Read
        } else if self.browse.has_root() {
            Mode::Browse
        } else {
            Mode::Status
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds. Zero disables it.
    pub connect_secs: u64,

    /// Timeout for one whole operation in seconds. Zero disables it.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            request_secs: 90,
        }
    }
}

/// Where and how deep to browse.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrowseConfig {
    /// ItemPath of the root node.
    pub item_path: String,

    /// ItemName of the root node.
    pub item_name: String,

    /// Levels to expand below the root.
    pub max_depth: i64,

    /// LocaleID sent with every request.
    pub locale: String,

    /// ClientRequestHandle sent with every request.
    pub client_handle: String,
}

impl BrowseConfig {
    /// True when a browse root was named.
    pub fn has_root(&self) -> bool {
        !self.item_path.is_empty() || !self.item_name.is_empty()
    }
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            item_path: String::new(),
            item_name: String::new(),
            max_depth: 1,
            locale: String::new(),
            client_handle: String::new(),
        }
    }
}

/// The item a read targets.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReadConfig {
    /// ItemPath of the item.
    pub item_path: String,

    /// ItemName of the item.
    pub item_name: String,
}

impl ReadConfig {
    pub fn has_item(&self) -> bool {
        !self.item_path.is_empty() || !self.item_name.is_empty()
    }
}

/// HTTP exchange tracing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetDebugConfig {
    /// Log every request, response and connection phase.
    pub enabled: bool,

    /// Body bytes retained per exchange.
    pub max_body_bytes: usize,
}

impl Default for NetDebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_body_bytes: DEFAULT_CAPTURE_BUDGET,
        }
    }
}

/// Basic authentication credentials.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn is_set(&self) -> bool {
        !self.username.is_empty()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn or warning, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_gets_defaults() {
        let config: ClientConfig = toml::from_str(r#"endpoint = "http://plc.local/da""#).unwrap();
        assert_eq!(config.endpoint, "http://plc.local/da");
        assert_eq!(config.timeouts.connect(), Duration::from_secs(30));
        assert_eq!(config.timeouts.request(), Duration::from_secs(90));
        assert_eq!(config.browse.max_depth, 1);
        assert!(!config.browse.has_root());
        assert_eq!(config.mode(), Mode::Status);
        assert!(!config.net_debug.enabled);
        assert_eq!(config.net_debug.max_body_bytes, 65_536);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn sections_override_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            endpoint = "https://plc.local/da"

            [browse]
            item_name = "Line1"
            max_depth = 3

            [auth]
            username = "op"
            password = "hunter2"
            "#,
        )
        .unwrap();
        assert!(config.browse.has_root());
        assert_eq!(config.mode(), Mode::Browse);
        assert_eq!(config.browse.max_depth, 3);
        assert!(config.auth.is_set());
        assert!(!format!("{:?}", config.auth).contains("hunter2"));
    }

    #[test]
    fn read_item_selects_read_mode() {
        let config: ClientConfig = toml::from_str(
            r#"
            endpoint = "http://plc.local/da"

            [read]
            item_name = "Plant.Line1.Speed"
            "#,
        )
        .unwrap();
        assert!(config.read.has_item());
        assert_eq!(config.mode(), Mode::Read);
    }
}
