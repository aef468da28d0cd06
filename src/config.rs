use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_DIR_NAME: &str = "tracedup";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Similarity threshold must be within [0, 100], got {0}")]
    InvalidThreshold(f64),

    #[error("Fuzzy ratio must be within [0, 1], got {0}")]
    InvalidFuzzyRatio(f64),

    #[error("Comparison window must be at least 1")]
    EmptyWindow,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings for blocking, candidate search and feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum string similarity (0-100) for a pair to be retained.
    pub threshold: f64,
    /// Requested comparison budget, further capped at 10x the distinct keys.
    pub max_comparisons: usize,
    /// Number of sorted successors each key is compared against within a block.
    pub window: usize,
    /// Traces longer than this skip activity similarity (scored 0).
    pub max_trace_events: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 80.0,
            max_comparisons: 5000,
            window: 50,
            max_trace_events: 10,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.window == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        Ok(())
    }
}

/// Settings for the synthetic duplicate generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of source keys to duplicate; each spawns three variants.
    pub count: usize,
    /// Share of sources that receive lexical (fuzzy-detectable) variants.
    pub fuzzy_ratio: f64,
    /// Fixed seed for reproducible runs; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 20,
            fuzzy_ratio: 0.6,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.fuzzy_ratio) {
            return Err(ConfigError::InvalidFuzzyRatio(self.fuzzy_ratio));
        }
        Ok(())
    }

    pub fn fuzzy_count(&self) -> usize {
        (self.count as f64 * self.fuzzy_ratio).floor() as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub detection: DetectionConfig,
    pub generator: GeneratorConfig,
}

impl AnalysisConfig {
    /// Load from `path`, else from the user config directory when a file
    /// exists there, else fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    log::debug!("No config file found; using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| {
            ConfigError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        self.generator.validate()
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
