use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{AppPaths, LoopConfig, LoopPacing};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::gameplay::{AgentDriver, ArenaSettings, CombatTuning, DwellTuning, HarvestTuning};

pub(crate) const SESSION_CONFIG_ENV_VAR: &str = "DAYVIVE_SESSION_CONFIG";
const SESSION_CONFIG_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read session config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid session config {path} at '{field}': {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid session config {path}: {field} = '{value}' ({expected})")]
    InvalidValue {
        path: PathBuf,
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum PacingSetting {
    #[default]
    Realtime,
    Unpaced,
}

impl From<PacingSetting> for LoopPacing {
    fn from(setting: PacingSetting) -> Self {
        match setting {
            PacingSetting::Realtime => LoopPacing::Realtime,
            PacingSetting::Unpaced => LoopPacing::Unpaced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LoopSection {
    pub(crate) target_tps: u32,
    pub(crate) pacing: PacingSetting,
    pub(crate) max_ticks: Option<u64>,
}

impl Default for LoopSection {
    fn default() -> Self {
        Self {
            target_tps: 60,
            pacing: PacingSetting::Realtime,
            max_ticks: None,
        }
    }
}

/// Tuning that is not content: agent feel, run length and seeding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionConfig {
    pub(crate) arena: String,
    pub(crate) days_to_run: u32,
    pub(crate) rng_seed: Option<u64>,
    pub(crate) driver: AgentDriver,
    pub(crate) dwell: DwellTuning,
    pub(crate) harvest: HarvestTuning,
    pub(crate) combat: CombatTuning,
    #[serde(rename = "loop")]
    pub(crate) loop_section: LoopSection,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            arena: "arena.meadow".to_string(),
            days_to_run: 3,
            rng_seed: None,
            driver: AgentDriver::Forager,
            dwell: DwellTuning::default(),
            harvest: HarvestTuning::default(),
            combat: CombatTuning::default(),
            loop_section: LoopSection::default(),
        }
    }
}

impl SessionConfig {
    pub(crate) fn arena_settings(&self) -> ArenaSettings {
        ArenaSettings {
            arena: self.arena.clone(),
            days_to_run: self.days_to_run,
            rng_seed: self.rng_seed,
            driver: self.driver,
            dwell: self.dwell,
            harvest: self.harvest,
            combat: self.combat,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoadedConfig {
    pub(crate) session: SessionConfig,
    pub(crate) loop_config: LoopConfig,
    pub(crate) source: Option<PathBuf>,
}

/// Explicit env path first, then `<root>/config/session.json`. A missing
/// default file means built-in defaults; a missing explicit file is an error.
pub(crate) fn load_session_config(app_paths: &AppPaths) -> Result<LoadedConfig, ConfigError> {
    let explicit = std::env::var_os(SESSION_CONFIG_ENV_VAR).map(PathBuf::from);
    let default_path = app_paths.config_dir.join(SESSION_CONFIG_FILE);
    let path = match explicit {
        Some(path) => Some(path),
        None if default_path.is_file() => Some(default_path),
        None => None,
    };

    let Some(path) = path else {
        info!("session_config_defaults");
        let session = SessionConfig::default();
        let loop_config = loop_config_from(&session, Path::new(SESSION_CONFIG_FILE))?;
        return Ok(LoadedConfig {
            session,
            loop_config,
            source: None,
        });
    };

    let session = read_session_config(&path)?;
    let loop_config = loop_config_from(&session, &path)?;
    info!(
        path = %path.display(),
        arena = session.arena.as_str(),
        days_to_run = session.days_to_run,
        "session_config_loaded"
    );
    Ok(LoadedConfig {
        session,
        loop_config,
        source: Some(path),
    })
}

pub(crate) fn read_session_config(path: &Path) -> Result<SessionConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_session_config(&raw, path)
}

fn parse_session_config(raw: &str, path: &Path) -> Result<SessionConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        ConfigError::Parse {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}

fn loop_config_from(session: &SessionConfig, path: &Path) -> Result<LoopConfig, ConfigError> {
    let section = &session.loop_section;
    if section.target_tps == 0 {
        return Err(ConfigError::InvalidValue {
            path: path.to_path_buf(),
            field: "loop.target_tps",
            value: section.target_tps.to_string(),
            expected: "an integer >= 1",
        });
    }
    Ok(LoopConfig {
        target_tps: section.target_tps,
        pacing: section.pacing.into(),
        max_ticks: section.max_ticks,
        ..LoopConfig::default()
    })
}
