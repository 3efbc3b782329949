//! Configuration system for the Strata streaming engine.
//!
//! Provides pooling policy, streaming and debug settings that persist to disk
//! as RON files. Supports CLI overrides via clap, hot-reload detection, and
//! forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, PoolConfig, PoolKindConfig, StreamingConfig};
pub use error::ConfigError;
