use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use sexp_core::{GoalPolicy, ParseOptions, DEFAULT_MAX_DEPTH};
use thiserror::Error;

pub const BUILTIN_RUNTIME_CONFIG: &str = include_str!("data/runtime_config.json");
pub const RUNTIME_CONFIG_ENV: &str = "SEXP_RUNTIME_CONFIG_PATH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveFormat {
    #[default]
    Json,
    Bincode,
}

impl SaveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
            SaveFormat::Bincode => "bin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub allow_unknown_operators: bool,
    pub max_depth: usize,
    /// Abort mission load on any validation issue instead of logging it.
    pub strict_validation: bool,
    pub primary_failure_fails_mission: bool,
    pub fail_incomplete_at_end: bool,
    pub rng_seed: u64,
    pub save_format: SaveFormat,
    pub save_dir: PathBuf,
    pub tick_seconds: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            allow_unknown_operators: false,
            max_depth: DEFAULT_MAX_DEPTH,
            strict_validation: false,
            primary_failure_fails_mission: true,
            fail_incomplete_at_end: true,
            rng_seed: 0,
            save_format: SaveFormat::Json,
            save_dir: PathBuf::from("saves"),
            tick_seconds: 1.0,
        }
    }
}

impl RuntimeConfig {
    pub fn builtin() -> Arc<Self> {
        let config = Self::from_json_str(BUILTIN_RUNTIME_CONFIG).unwrap_or_else(|err| {
            tracing::error!(
                target: "sexp::config",
                error = %err,
                "runtime_config.builtin_invalid"
            );
            Self::default()
        });
        Arc::new(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, RuntimeConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| RuntimeConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config = RuntimeConfig::from_json_str(&contents)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), RuntimeConfigError> {
        if self.max_depth == 0 {
            return Err(RuntimeConfigError::Invalid("max_depth must be positive".into()));
        }
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            return Err(RuntimeConfigError::Invalid(
                "tick_seconds must be a positive number".into(),
            ));
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            allow_unknown_operators: self.allow_unknown_operators,
            max_depth: self.max_depth,
        }
    }

    pub fn goal_policy(&self) -> GoalPolicy {
        GoalPolicy {
            primary_failure_fails_mission: self.primary_failure_fails_mission,
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("failed to parse runtime config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read runtime config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid runtime config: {0}")]
    Invalid(String),
}

#[derive(Resource, Debug, Clone)]
pub struct RuntimeConfigHandle(pub Arc<RuntimeConfig>);

impl RuntimeConfigHandle {
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<RuntimeConfig> {
        Arc::clone(&self.0)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.0
    }
}

/// Where the active runtime config came from; `None` for the builtin copy.
#[derive(Resource, Debug, Clone, Default)]
pub struct RuntimeConfigMetadata {
    path: Option<PathBuf>,
}

impl RuntimeConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

pub fn load_runtime_config_from_env() -> (Arc<RuntimeConfig>, RuntimeConfigMetadata) {
    let path = env::var(RUNTIME_CONFIG_ENV)
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/runtime_config.json")
        });

    match RuntimeConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "sexp::config",
                path = %path.display(),
                "runtime_config.loaded=file"
            );
            return (Arc::new(config), RuntimeConfigMetadata::new(Some(path)));
        }
        Err(err) => {
            tracing::warn!(
                target: "sexp::config",
                path = %path.display(),
                error = %err,
                "runtime_config.load_failed"
            );
        }
    }

    let config = RuntimeConfig::builtin();
    tracing::info!(target: "sexp::config", "runtime_config.loaded=builtin");
    (config, RuntimeConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses() {
        let config = RuntimeConfig::builtin();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.save_format, SaveFormat::Json);
        assert!(config.primary_failure_fails_mission);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = RuntimeConfig::from_json_str(r#"{ "save_format": "bincode" }"#).unwrap();
        assert_eq!(config.save_format, SaveFormat::Bincode);
        assert_eq!(config.tick_seconds, 1.0);
        assert!(config.check().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = RuntimeConfig::from_json_str(r#"{ "tick_seconds": 0 }"#).unwrap();
        assert!(matches!(config.check(), Err(RuntimeConfigError::Invalid(_))));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = RuntimeConfig::from_file(Path::new("/nonexistent/runtime_config.json"))
            .unwrap_err();
        assert!(err.to_string().contains("runtime_config.json"));
    }
}
