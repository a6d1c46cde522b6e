//! Configuration system for the broker.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $NETBROKER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/netbroker/config.toml
//!   3. ~/.config/netbroker/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::Uid;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub api: ApiConfig,
    pub policy: PolicyConfig,
    pub registry: RegistryConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Localhost port of the call surface.
    pub port: u16,
    /// Token every inbound call must present.
    pub interface_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Write UID policies to `persist_path` on every change.
    pub persist: bool,
    pub persist_path: PathBuf,
    /// Initial global background policy. true = restricted.
    pub background_restricted: bool,
    /// UIDs that may mutate suppliers/policy and are never firewalled.
    pub system_uids: Vec<Uid>,
}

/// What `RegisterSupplier` does with a `(net_type, identity)` pair that is
/// already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    ReturnExisting,
}

impl DuplicatePolicy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "reject" => Some(Self::Reject),
            "return_existing" => Some(Self::ReturnExisting),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub duplicate_suppliers: DuplicatePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Depth of each listener's outbound stream. A full stream only
    /// stalls that listener's own delivery task.
    pub listener_queue_depth: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_API_PORT: u16 = 9101;
pub const DEFAULT_INTERFACE_TOKEN: &str = "netbroker.broker.v1";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_API_PORT,
            interface_token: DEFAULT_INTERFACE_TOKEN.to_string(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            persist: true,
            persist_path: data_dir().join("uid_policy.json"),
            background_restricted: true,
            system_uids: vec![0],
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            listener_queue_depth: 64,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("netbroker")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("netbroker")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BrokerConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BrokerConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("NETBROKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BrokerConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply NETBROKER_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NETBROKER_API__PORT") {
            if let Ok(p) = v.parse() {
                self.api.port = p;
            }
        }
        if let Some(v) = lookup("NETBROKER_POLICY__BACKGROUND_RESTRICTED") {
            self.policy.background_restricted = v == "true" || v == "1";
        }
        if let Some(v) = lookup("NETBROKER_POLICY__PERSIST") {
            self.policy.persist = v == "true" || v == "1";
        }
        if let Some(v) = lookup("NETBROKER_REGISTRY__DUPLICATE_SUPPLIERS") {
            if let Some(p) = DuplicatePolicy::parse(&v) {
                self.registry.duplicate_suppliers = p;
            }
        }
    }
}
