// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use slotstore_storage::{SlotBackend, StoreConfig, DEFAULT_SLOTS};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Slotstore Server Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: NetworkConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// UDP listen address (e.g., "0.0.0.0:7770")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Capacity of the inbound and outbound packet queues
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Slot array file
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Metadata file (cursor and save interval)
    #[serde(default = "default_meta_path")]
    pub meta_path: PathBuf,

    /// Quantization table file
    #[serde(default = "default_quant_path")]
    pub quant_path: PathBuf,

    /// Number of slots; non-positive values fall back to the default
    #[serde(default = "default_slots")]
    pub slots: i64,

    /// Slot array backend: "mmap" or "file"
    #[serde(default)]
    pub backend: SlotBackend,
}

// Default values
fn default_listen_addr() -> String {
    "0.0.0.0:7770".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data.bin")
}

fn default_meta_path() -> PathBuf {
    PathBuf::from("meta_.bin")
}

fn default_quant_path() -> PathBuf {
    PathBuf::from("quantize.bin")
}

fn default_slots() -> i64 {
    DEFAULT_SLOTS
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            meta_path: default_meta_path(),
            quant_path: default_quant_path(),
            slots: default_slots(),
            backend: SlotBackend::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - SLOTSTORE_LISTEN_ADDR: UDP listen address (default: 0.0.0.0:7770)
    /// - SLOTSTORE_PORT: replaces only the port of the listen address
    /// - SLOTSTORE_DATA_PATH: slot array file (default: data.bin)
    /// - SLOTSTORE_META_PATH: metadata file (default: meta_.bin)
    /// - SLOTSTORE_QUANT_PATH: quantization table file (default: quantize.bin)
    /// - SLOTSTORE_SLOTS: slot count (default: 1048576)
    /// - SLOTSTORE_BACKEND: "mmap" or "file" (default: mmap)
    /// - SLOTSTORE_QUEUE_CAPACITY: packet queue capacity (default: 256)
    pub fn from_env() -> Self {
        Self::merge_with_env(Self::default())
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        Ok(Self::merge_with_env(config))
    }

    /// Override fields whose environment variable is set
    fn merge_with_env(mut config: Self) -> Self {
        if let Ok(addr) = std::env::var("SLOTSTORE_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("SLOTSTORE_PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => config.set_port(port),
                Err(_) => tracing::warn!("Ignoring invalid SLOTSTORE_PORT {:?}", port),
            }
        }

        if let Ok(capacity) = std::env::var("SLOTSTORE_QUEUE_CAPACITY") {
            if let Ok(val) = capacity.parse() {
                config.server.queue_capacity = val;
            }
        }

        if let Ok(path) = std::env::var("SLOTSTORE_DATA_PATH") {
            config.storage.data_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("SLOTSTORE_META_PATH") {
            config.storage.meta_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("SLOTSTORE_QUANT_PATH") {
            config.storage.quant_path = PathBuf::from(path);
        }

        if let Ok(slots) = std::env::var("SLOTSTORE_SLOTS") {
            if let Ok(val) = slots.parse() {
                config.storage.slots = val;
            }
        }

        if let Ok(backend) = std::env::var("SLOTSTORE_BACKEND") {
            match backend.parse() {
                Ok(val) => config.storage.backend = val,
                Err(e) => tracing::warn!("Ignoring SLOTSTORE_BACKEND: {}", e),
            }
        }

        config
    }

    /// Replace the port of the listen address, keeping the host
    pub fn set_port(&mut self, port: u16) {
        let addr = &self.server.listen_addr;
        let host = match addr.rsplit_once(':') {
            Some((host, _)) => host,
            None => addr.as_str(),
        };
        self.server.listen_addr = format!("{}:{}", host, port);
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.server.listen_addr))
    }

    /// Store settings, with the slot count defaulted when non-positive
    pub fn store_config(&self) -> StoreConfig {
        let slots = if self.storage.slots > 0 {
            self.storage.slots
        } else {
            DEFAULT_SLOTS
        };
        StoreConfig {
            data_path: self.storage.data_path.clone(),
            meta_path: self.storage.meta_path.clone(),
            quant_path: self.storage.quant_path.clone(),
            slots,
            backend: self.storage.backend,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.server.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be positive");
        }

        Ok(())
    }
}
