//! Configuration for gridlife

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::patterns::Pattern;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Side length of the square grid
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,

    /// Number of partition workers
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Number of generations to run
    #[serde(default = "default_generations")]
    pub generations: u64,

    /// Per-operation communication timeout in milliseconds; 0 disables it
    #[serde(default = "default_phase_timeout_ms")]
    pub phase_timeout_ms: u64,

    /// Inbox capacity of each channel endpoint
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Initial grid pattern
    #[serde(default)]
    pub pattern: Pattern,

    /// Live-cell probability for the random pattern
    #[serde(default = "default_density")]
    pub density: f64,

    /// Fixed RNG seed for reproducible random grids
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_grid_size() -> usize {
    100
}

fn default_worker_count() -> usize {
    4
}

fn default_generations() -> u64 {
    500
}

fn default_phase_timeout_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    crate::channel::local::DEFAULT_CHANNEL_CAPACITY
}

fn default_density() -> f64 {
    0.3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            worker_count: default_worker_count(),
            generations: default_generations(),
            phase_timeout_ms: default_phase_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            pattern: Pattern::default(),
            density: default_density(),
            seed: None,
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            return Ok(config);
        }

        // Try default locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("gridlife").join("config.yml")),
            Some(PathBuf::from("gridlife.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Communication timeout as a duration; `None` means wait forever
    pub fn phase_timeout(&self) -> Option<Duration> {
        match self.phase_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
