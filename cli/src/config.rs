// Configuration management for the onionnet CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/onionnet/config.json
// - Linux: ~/.config/onionnet/config.json
// - Windows: %APPDATA%\onionnet\config.json
//
// `--config <path>` points at any other file instead.

use anyhow::{Context, Result};
use onionnet_core::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ports, host and circuit settings shared by every node
    pub network: NetworkConfig,

    /// Filter used when RUST_LOG is unset
    pub log_filter: String,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            log_filter: "info".to_string(),
            path: None,
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("onionnet");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load from `path` if given, else from the platform config file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::config_file()?),
        }
    }

    /// Load config from file, or create a default one there if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };

        config.path = Some(path.to_path_buf());
        if !path.exists() {
            config.save()?;
        }
        config
            .network
            .validate()
            .context("Invalid network configuration")?;
        Ok(config)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Save config to the file it was loaded from
    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => Self::config_file()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        let network = &mut updated.network;
        match key {
            "host" => network.host = value.to_string(),
            "registry_port" => {
                network.registry_port = value.parse().context("Invalid port number")?;
            }
            "base_router_port" => {
                network.base_router_port = value.parse().context("Invalid port number")?;
            }
            "base_user_port" => {
                network.base_user_port = value.parse().context("Invalid port number")?;
            }
            "circuit_length" => {
                network.circuit_length = value.parse().context("Invalid number")?;
            }
            "event_history" => {
                network.event_history = value.parse().context("Invalid number")?;
            }
            "expose_private_keys" => {
                network.expose_private_keys = value.parse().context("Invalid boolean value")?;
            }
            "log_filter" => updated.log_filter = value.to_string(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        updated
            .network
            .validate()
            .with_context(|| format!("Rejected {} = {}", key, value))?;
        *self = updated;
        self.save()?;
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        let network = &self.network;
        vec![
            ("host".to_string(), network.host.clone()),
            ("registry_port".to_string(), network.registry_port.to_string()),
            ("base_router_port".to_string(), network.base_router_port.to_string()),
            ("base_user_port".to_string(), network.base_user_port.to_string()),
            ("circuit_length".to_string(), network.circuit_length.to_string()),
            ("event_history".to_string(), network.event_history.to_string()),
            ("expose_private_keys".to_string(), network.expose_private_keys.to_string()),
            ("log_filter".to_string(), self.log_filter.clone()),
        ]
    }
}
