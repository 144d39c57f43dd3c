//! `tracedrill.toml` config loading.

use serde::{Deserialize, Serialize};

use std::path::Path;

use crate::{DrillError, DrillResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Maximum number of traces kept in the store before the oldest is evicted.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum rows returned by a table drill-down.
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    /// Maximum callers/callees reported for a resolved function.
    #[serde(default = "default_edge_limit")]
    pub edge_limit: usize,

    /// Number of suggestions returned when a function query matches nothing.
    #[serde(default = "default_top_functions")]
    pub top_functions: usize,

    /// Hop cap for the heaviest-path walk.
    #[serde(default = "default_max_path_hops")]
    pub max_path_hops: usize,

    /// Fixed prefix for generated trace ids.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Seed for id generation; ids are drawn from OS entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_capacity() -> usize {
    20
}

fn default_row_limit() -> usize {
    20
}

fn default_edge_limit() -> usize {
    10
}

fn default_top_functions() -> usize {
    15
}

fn default_max_path_hops() -> usize {
    10
}

fn default_id_prefix() -> String {
    "trace_".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            row_limit: default_row_limit(),
            edge_limit: default_edge_limit(),
            top_functions: default_top_functions(),
            max_path_hops: default_max_path_hops(),
            id_prefix: default_id_prefix(),
            seed: None,
        }
    }
}

/// Query caps handed to the drill-down resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrillLimits {
    pub row_limit: usize,
    pub edge_limit: usize,
    pub top_functions: usize,
    pub max_path_hops: usize,
}

impl Default for DrillLimits {
    fn default() -> Self {
        Config::default().limits()
    }
}

impl Config {
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => match cfg.validate() {
                    Ok(()) => cfg,
                    Err(err) => {
                        tracing::warn!("ignoring config {}: {err}", path.display());
                        Self::default()
                    }
                },
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> DrillResult<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> DrillResult<()> {
        if self.capacity == 0 {
            return Err(DrillError::Config("capacity must be at least 1".to_string()));
        }
        if self.row_limit == 0 {
            return Err(DrillError::Config("row_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn limits(&self) -> DrillLimits {
        DrillLimits {
            row_limit: self.row_limit,
            edge_limit: self.edge_limit,
            top_functions: self.top_functions,
            max_path_hops: self.max_path_hops,
        }
    }
}
