// crates/worker/src/config.rs
//! Worker configuration.
//!
//! Precedence, lowest first: built-in defaults, TOML file, environment,
//! command-line flags (applied by the binary).

use std::path::{Path, PathBuf};
use std::time::Duration;

use odoo_inspector_core::{AutoEnablePolicy, TargetConventions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 47894;
pub const CONFIG_ENV: &str = "ODOO_INSPECTOR_CONFIG";
pub const PORT_ENV: &str = "ODOO_INSPECTOR_PORT";
pub const BRIDGE_TOKEN_ENV: &str = "ODOO_INSPECTOR_BRIDGE_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub server: ServerConfig,
    pub host_bridge: BridgeConfig,
    pub conventions: TargetConventions,
    pub policy: AutoEnablePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound for one in-page probe.
    pub probe_timeout_ms: u64,
    /// Upper bound for every other host command.
    pub command_timeout_ms: u64,
    /// Shared secret the shim must present in its first frame. With no token
    /// configured every shim is refused.
    pub token: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 2000,
            command_timeout_ms: 5000,
            token: None,
        }
    }
}

impl BridgeConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl WorkerConfig {
    /// Load defaults, then the first config file found, then env overrides.
    ///
    /// An explicitly named file must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// `ODOO_INSPECTOR_PORT`, then `PORT`; an unparseable value falls through
    /// to the next one. `ODOO_INSPECTOR_BRIDGE_TOKEN` replaces the file's
    /// bridge token when non-empty.
    pub fn apply_env(&mut self) {
        if let Some(port) = env_port(PORT_ENV).or_else(|| env_port("PORT")) {
            self.server.port = port;
        }
        if let Some(token) = std::env::var(BRIDGE_TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
            self.host_bridge.token = Some(token);
        }
    }
}

fn env_port(name: &str) -> Option<u16> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(port) => Some(port),
        Err(_) => {
            tracing::warn!(var = name, value = %value, "ignoring unparseable port");
            None
        }
    }
}

/// `<config dir>/odoo-inspector/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("odoo-inspector").join("config.toml"))
}
