use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;

pub use app::{
    run_app, run_app_with_metrics, run_scene, AppError, Collider, Entity, EntityId, IdleInput,
    IndexedCollider, InputAction, InputSnapshot, InputSource, Layer, LayerMask, LoopConfig,
    LoopExit, LoopMetricsSnapshot, LoopPacing, LoopSummary, MetricsHandle, Scene, SceneCommand,
    SceneWorld, SpatialIndex, Transform, Vec2, DEFAULT_CELL_SIZE, PACING_ENV_VAR,
};
pub use content::{
    compile_def_database, ArenaDef, ContentCompileError, ContentErrorCode, ContentPlanError,
    ContentPlanRequest, DefDatabase, DefDatabaseBuilder, DensityRounding, HostileDef,
    InteractableDef, ObstacleDef, RefillDef, SourceLocation, SpawnRuleDef, YieldEntryDef,
};

pub const ROOT_ENV_VAR: &str = "DAYVIVE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        Self {
            base_content_dir: root.join("assets").join("base"),
            mods_dir: root.join("mods"),
            config_dir: root.join("config"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "DAYVIVE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
export {env_var}=\"/path/to/dayvive\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    resolve_root().map(AppPaths::from_root)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let cwd = env::current_dir().expect("cwd");
        assert!(!is_repo_marker(&cwd.join("definitely_not_a_marker")));
    }

    #[test]
    fn repo_marker_accepts_cargo_toml_with_assets() {
        let temp = tempfile::TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("write");
        assert!(!is_repo_marker(temp.path()));

        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn app_paths_derive_from_root() {
        let paths = AppPaths::from_root(PathBuf::from("/srv/dayvive"));
        assert_eq!(paths.base_content_dir, PathBuf::from("/srv/dayvive/assets/base"));
        assert_eq!(paths.mods_dir, PathBuf::from("/srv/dayvive/mods"));
        assert_eq!(paths.config_dir, PathBuf::from("/srv/dayvive/config"));
    }
}
