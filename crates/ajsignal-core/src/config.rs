//! Client configuration
//!
//! Holds the fixed values the signal consumer uses to reach its service:
//! connect spec, application name, well-known and interface names, object
//! path, and session port. Supports JSON and TOML files; missing keys take
//! their default values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::names;
use crate::types::SessionPort;

/// Connect spec of the in-process transport
pub const DEFAULT_CONNECT_SPEC: &str = "null:";

/// Application name reported to the bus
pub const DEFAULT_APPLICATION_NAME: &str = "signalConsumerClient";

/// Well-known name of the signal sample service
pub const DEFAULT_WELL_KNOWN_NAME: &str = "org.alljoyn.Bus.signal_sample";

/// Interface the `nameChanged` signal belongs to
pub const DEFAULT_INTERFACE_NAME: &str = "org.alljoyn.Bus.signal_sample";

/// Object path of the service object
pub const DEFAULT_OBJECT_PATH: &str = "/";

/// Session port the service binds
pub const DEFAULT_SESSION_PORT: SessionPort = 25;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Transport selection string
    pub connect_spec: String,
    /// Name identifying this process to the bus
    pub application_name: String,
    /// Name of the remote service to discover
    pub well_known_name: String,
    /// Interface holding the `nameChanged` signal
    pub interface_name: String,
    /// Object path of the remote service object
    pub object_path: String,
    /// Session port used for the client-service session
    pub session_port: SessionPort,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_spec: DEFAULT_CONNECT_SPEC.to_string(),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            well_known_name: DEFAULT_WELL_KNOWN_NAME.to_string(),
            interface_name: DEFAULT_INTERFACE_NAME.to_string(),
            object_path: DEFAULT_OBJECT_PATH.to_string(),
            session_port: DEFAULT_SESSION_PORT,
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

impl ClientConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ajsignal").join("client.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("Invalid JSON config: {}", e)))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("Invalid TOML config: {}", e)))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()).into());
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()).into());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path`, or from the default location, or fall back to defaults
    ///
    /// An explicit path must exist and parse. The default location is only
    /// read when the file is present.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => {
                tracing::debug!("Loading client config from {}", default.display());
                Self::load_from_file(&default)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.connect_spec.is_empty() {
            return Err(invalid("connect_spec", "must not be empty"));
        }
        if !self.connect_spec.contains(':') {
            return Err(invalid("connect_spec", "must name a transport, e.g. 'null:'"));
        }
        if self.application_name.trim().is_empty() {
            return Err(invalid("application_name", "must not be empty"));
        }
        names::check_bus_name(&self.well_known_name)
            .map_err(|reason| invalid("well_known_name", reason))?;
        names::check_bus_name(&self.interface_name)
            .map_err(|reason| invalid("interface_name", reason))?;
        names::check_object_path(&self.object_path)
            .map_err(|reason| invalid("object_path", reason))?;
        if self.session_port == 0 {
            return Err(invalid("session_port", "must be > 0"));
        }
        Ok(())
    }

    /// Transport part of the connect spec, without the trailing options
    pub fn transport(&self) -> &str {
        self.connect_spec
            .split_once(':')
            .map_or(self.connect_spec.as_str(), |(transport, _)| transport)
    }
}
