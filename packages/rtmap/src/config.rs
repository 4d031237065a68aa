use crate::error::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Channel count addressable by a u16 channel index
pub const MAX_CHANNELS: usize = u16::MAX as usize + 1;

fn default_num_channels() -> usize {
    512
}

fn default_threads() -> usize {
    num_cpus::get()
}

/// Which channels the loader keeps, by parity of the 1-based channel number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveChannels {
    #[default]
    Full,
    Even,
    Odd,
}

impl ActiveChannels {
    /// Whether the 0-based channel index `channel` is active
    pub fn includes(&self, channel: u16) -> bool {
        let number = u32::from(channel) + 1;
        match self {
            ActiveChannels::Full => true,
            ActiveChannels::Even => number % 2 == 0,
            ActiveChannels::Odd => number % 2 == 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_num_channels")]
    pub num_channels: usize,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            num_channels: default_num_channels(),
            threads: default_threads(),
        }
    }
}

/// Sizing of the threaded map pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Reads mapped concurrently before new reads are turned away
    pub max_active_reads: usize,
    /// Chunks fed to one read before it is finalised unmapped
    pub max_chunks: u32,
    /// Bounded queue length of each worker
    pub chunk_queue_len: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active_reads: 128,
            max_chunks: 10,
            chunk_queue_len: 32,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Stop loading after this many reads (0 = no limit)
    pub max_reads: usize,
    pub active_chs: ActiveChannels,
}

/// Complete runtime configuration, fixed once the scheduler is built
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RtMapConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl RtMapConfig {
    /// Parse TOML without validating
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| MapError::Parse(format!("invalid config: {}", e)))
    }

    /// Read, parse and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MapError::ConfigNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `RTMAP_THREADS` / `RTMAP_NUM_CHANNELS` from the environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RTMAP_THREADS") {
            self.global.threads = v
                .trim()
                .parse()
                .map_err(|_| MapError::InvalidConfig(format!("RTMAP_THREADS: '{}'", v)))?;
        }
        if let Some(v) = lookup("RTMAP_NUM_CHANNELS") {
            self.global.num_channels = v
                .trim()
                .parse()
                .map_err(|_| MapError::InvalidConfig(format!("RTMAP_NUM_CHANNELS: '{}'", v)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.global.num_channels == 0 || self.global.num_channels > MAX_CHANNELS {
            return Err(MapError::InvalidConfig(format!(
                "num_channels must be between 1 and {}, got {}",
                MAX_CHANNELS, self.global.num_channels
            )));
        }
        if self.global.threads == 0 {
            return Err(MapError::InvalidConfig("threads must be > 0".to_string()));
        }
        if self.pool.max_active_reads == 0 {
            return Err(MapError::InvalidConfig(
                "pool.max_active_reads must be > 0".to_string(),
            ));
        }
        if self.pool.max_chunks == 0 {
            return Err(MapError::InvalidConfig(
                "pool.max_chunks must be > 0".to_string(),
            ));
        }
        if self.pool.chunk_queue_len == 0 {
            return Err(MapError::InvalidConfig(
                "pool.chunk_queue_len must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
