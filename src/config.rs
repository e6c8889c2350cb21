//! Configuration file support.
//!
//! A config file holds the listen address and the raw route settings:
//!
//! ```yaml
//! port: 8080
//! routes:
//!   - url: /path1
//!     status_code: 200
//!     content_type: application/json
//!     content: '{"foo": "bar"}'
//! ```

use crate::error::{Error, ValidationError};
use crate::routes::RouteTable;
use crate::server::{ServerHandle, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown file type: {0}")]
    UnknownFileType(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Interface to listen on
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Route settings, validated by the route table builder
    #[serde(default)]
    pub routes: Vec<serde_json::Value>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            routes: Vec::new(),
        }
    }
}

impl MockServerConfig {
    /// Load and validate a configuration file, picking the format by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("yaml" | "yml") => Self::from_yaml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => return Err(ConfigError::UnknownFileType(path.display().to_string())),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Validate the route settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.route_table().map(|_| ())
    }

    pub fn route_table(&self) -> Result<RouteTable, ValidationError> {
        RouteTable::from_values(&self.routes)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Bind the configured address and serve the configured routes.
    pub async fn start(&self) -> Result<ServerHandle, Error> {
        let routes = self.route_table()?;
        ServerHandle::bind(self.socket_addr(), routes).await
    }
}
