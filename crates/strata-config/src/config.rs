//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level streaming engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Per-resource-kind pooling policy.
    pub pools: PoolConfig,
    /// Background decode and commit settings.
    pub streaming: StreamingConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Pooling policy for a single resource kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolKindConfig {
    /// When `false`, every acquisition allocates a fresh unpooled resource.
    pub enabled: bool,
    /// Number of backend resources created up front for each new pool.
    /// Pools never grow past this.
    pub initial_capacity: u64,
}

/// Pooling policy for every resource kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Geometry pools (one per geometry definition).
    pub geometry: PoolKindConfig,
    /// Material pools (one per non-shareable material definition).
    pub material: PoolKindConfig,
    /// The single global texture pool.
    pub texture: PoolKindConfig,
}

/// Background decode worker settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Number of background decode workers. `0` uses one per logical CPU.
    pub worker_count: usize,
    /// Maximum number of tiles being prepared at once.
    pub in_flight_budget: usize,
    /// Generate smooth normals for primitives that ship without normals.
    pub smooth_normals: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Never acquire materials; geometry renders with its display color.
    pub disable_materials: bool,
    /// Ignore base color textures and imagery when building materials.
    pub disable_textures: bool,
    /// Write random colors into materials and untextured geometry.
    pub random_colors: bool,
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for PoolKindConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_capacity: 200,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            in_flight_budget: 64,
            smooth_normals: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            disable_materials: false,
            disable_textures: false,
            random_colors: false,
            log_level: "info".to_string(),
        }
    }
}

impl StreamingConfig {
    /// Worker count with `0` resolved to the number of logical CPUs.
    pub fn resolved_worker_count(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get().max(1)
        } else {
            self.worker_count
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for the engine (`<config_dir>/strata`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("strata"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    ///
    /// Pool capacities and pooling toggles only take effect before the first
    /// pool of a kind is created, so callers usually apply a reloaded config
    /// to debug flags and logging only.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
