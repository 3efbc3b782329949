//! Command-line argument parsing for the streaming engine.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata", about = "Strata tile streaming engine")]
pub struct CliArgs {
    /// Initial capacity of each geometry pool.
    #[arg(long)]
    pub geometry_pool_capacity: Option<u64>,

    /// Initial capacity of each material pool.
    #[arg(long)]
    pub material_pool_capacity: Option<u64>,

    /// Initial capacity of the texture pool.
    #[arg(long)]
    pub texture_pool_capacity: Option<u64>,

    /// Enable or disable geometry pooling.
    #[arg(long)]
    pub geometry_pooling: Option<bool>,

    /// Enable or disable material pooling.
    #[arg(long)]
    pub material_pooling: Option<bool>,

    /// Enable or disable texture pooling.
    #[arg(long)]
    pub texture_pooling: Option<bool>,

    /// Number of background decode workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip material acquisition entirely.
    #[arg(long)]
    pub disable_materials: bool,

    /// Ignore base color textures and imagery.
    #[arg(long)]
    pub disable_textures: bool,

    /// Paint materials and untextured geometry with random colors.
    #[arg(long)]
    pub random_colors: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(capacity) = args.geometry_pool_capacity {
            self.pools.geometry.initial_capacity = capacity;
        }
        if let Some(capacity) = args.material_pool_capacity {
            self.pools.material.initial_capacity = capacity;
        }
        if let Some(capacity) = args.texture_pool_capacity {
            self.pools.texture.initial_capacity = capacity;
        }
        if let Some(enabled) = args.geometry_pooling {
            self.pools.geometry.enabled = enabled;
        }
        if let Some(enabled) = args.material_pooling {
            self.pools.material.enabled = enabled;
        }
        if let Some(enabled) = args.texture_pooling {
            self.pools.texture.enabled = enabled;
        }
        if let Some(workers) = args.workers {
            self.streaming.worker_count = workers;
        }
        // Flags only ever switch debug behavior on.
        self.debug.disable_materials |= args.disable_materials;
        self.debug.disable_textures |= args.disable_textures;
        self.debug.random_colors |= args.random_colors;
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
