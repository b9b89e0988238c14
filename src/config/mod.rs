// Configuration: the stage file (named stage layouts) and per-user settings.
pub mod settings;
pub mod stage;

#[cfg(test)]
mod tests;

pub use settings::Settings;
pub use stage::{
    Action, BattleStep, CheckForm, Operation, Outcome, ResourceCheckStep, StageConfig, Step,
    default_stage,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_STAGE_FILE: &str = "stage_configs.json";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("A stage needs exactly one '{kind}' step, found {found}")]
    StepCount { kind: &'static str, found: usize },

    #[error("The enter step has no actions")]
    EmptyEnter,

    #[error("Battle check lists no images")]
    EmptyBattleCheck,

    #[error("Battle actions do not match the {form} check")]
    BattleActionsMismatch { form: &'static str },

    #[error("A single-outcome battle check needs exactly one unlabeled outcome, found {found}")]
    SingleOutcomeShape { found: usize },

    #[error("Every outcome of a multi-outcome battle check needs a label")]
    UnlabeledOutcome,

    #[error("Battle outcome '{label}' is declared twice")]
    DuplicateOutcome { label: String },

    #[error("Battle actions reference undeclared outcome '{label}'")]
    UnknownOutcome { label: String },

    #[error("'{field}' must be a non-negative number of seconds, got {value}")]
    InvalidSeconds { field: &'static str, value: f64 },

    #[error("No stage named '{name}'")]
    UnknownStage { name: String },

    #[error("Stage '{name}' already exists")]
    StageExists { name: String },

    #[error("Home directory could not be determined")]
    NoHomeDir,
}

/// Every stage in a stage file, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageConfigs {
    stages: BTreeMap<String, StageConfig>,
}

impl StageConfigs {
    pub fn from_json(path: &Path, json: &str) -> ConfigResult<Self> {
        let mut configs: StageConfigs =
            serde_json::from_str(json).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        for (name, stage) in configs.stages.iter_mut() {
            stage.name = name.clone();
        }
        Ok(configs)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, &json)
    }

    /// Like `load`, but a missing file is an empty set of stages.
    pub fn load_or_empty(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, name: &str) -> ConfigResult<&StageConfig> {
        self.stages.get(name).ok_or_else(|| ConfigError::UnknownStage {
            name: name.to_string(),
        })
    }

    pub fn insert(&mut self, stage: StageConfig) -> ConfigResult<()> {
        if self.stages.contains_key(&stage.name) {
            return Err(ConfigError::StageExists { name: stage.name });
        }
        self.stages.insert(stage.name.clone(), stage);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageConfig> {
        self.stages.values()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
