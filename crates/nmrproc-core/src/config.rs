use crate::domain::ProcessingError;
use crate::numerics::PhaseCycleMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SCRIPT_SUFFIX: &str = "_process";
pub const DEFAULT_SCRIPT_EXTENSION: &str = "txt";
pub const DEFAULT_OUTPUT_EXTENSION: &str = "nv";
pub const DEFAULT_MERGED_OUTPUT_NAME: &str = "merged";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingConfig {
    pub script_suffix: String,
    pub script_extension: String,
    pub output_extension: String,
    pub merged_output_name: String,
    /// Decombination mode per indirect dimension, starting with dimension 2.
    pub decombination: Vec<PhaseCycleMode>,
    pub log_filter: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            script_suffix: DEFAULT_SCRIPT_SUFFIX.to_string(),
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            merged_output_name: DEFAULT_MERGED_OUTPUT_NAME.to_string(),
            decombination: Vec::new(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ProcessingConfig {
    /// Mode for indirect dimension `dim` (1-based dataset numbering).
    pub fn mode_for(&self, dim: usize) -> PhaseCycleMode {
        dim.checked_sub(2)
            .and_then(|index| self.decombination.get(index))
            .copied()
            .unwrap_or_default()
    }

    pub fn merged_output_file(&self) -> String {
        format!("{}.{}", self.merged_output_name, self.output_extension)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read processing config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse processing config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ConfigError> for ProcessingError {
    fn from(error: ConfigError) -> Self {
        match &error {
            ConfigError::Read { .. } => ProcessingError::io_system("IO.CONFIG", error.to_string()),
            ConfigError::Parse { .. } => {
                ProcessingError::input_validation("INPUT.CONFIG", error.to_string())
            }
        }
    }
}

pub fn load_processing_config(
    config_path: impl AsRef<Path>,
) -> Result<ProcessingConfig, ConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
        path: config_path.to_path_buf(),
        source,
    })
}
