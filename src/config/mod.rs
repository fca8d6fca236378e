//! Configuration for the asset server and the push client.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::key::DEFAULT_APPLICATION_SERVER_KEY;

/// Environment variable that overrides the listening port.
pub const PORT_ENV: &str = "PUSH_CODELAB_PORT";

/// Asset server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// Directory to serve instead of the built-in application bundle.
    pub asset_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            asset_dir: None,
        }
    }
}

impl ServerConfig {
    /// Sets the bind address.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the listening port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serves files from `dir` instead of the built-in bundle.
    #[must_use]
    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(dir.into());
        self
    }
}

/// Push client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Base64url application server public key handed to the push service.
    pub application_server_key: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            application_server_key: DEFAULT_APPLICATION_SERVER_KEY.to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub push: PushConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default config file location,
    /// `$XDG_CONFIG_HOME/push-codelab/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("push-codelab")
            .join("config.toml")
    }

    /// Loads the default config file if it exists, falling back to defaults,
    /// then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> crate::Result<Self> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    /// Loads configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies `PUSH_CODELAB_PORT` if it is set to a valid port.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let port = std::env::var(PORT_ENV).ok();
        self.with_port_override(port.as_deref())
    }

    fn with_port_override(mut self, port: Option<&str>) -> Self {
        if let Some(port) = port {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => log::warn!("Ignoring invalid {PORT_ENV}={port}"),
            }
        }
        self
    }
}
