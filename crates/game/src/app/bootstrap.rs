use engine::{resolve_app_paths, ContentPlanRequest, IdleInput, InputSource, LoopConfig, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{load_session_config, ConfigError};
use super::gameplay::{ArenaScene, DayEvent};

const ENABLED_MODS_ENV_VAR: &str = "DAYVIVE_ENABLED_MODS";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: ArenaScene,
    pub(crate) input: Box<dyn InputSource>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Dayvive Startup ===");

    let app_paths = resolve_app_paths()?;
    let loaded = load_session_config(&app_paths)?;
    info!(
        root = %app_paths.root.display(),
        source = ?loaded.source,
        arena = loaded.session.arena.as_str(),
        "session_ready"
    );
    let config = LoopConfig {
        content_plan_request: parse_enabled_mods_from_env(),
        app_paths: Some(app_paths),
        ..loaded.loop_config
    };

    let mut scene = ArenaScene::new(loaded.session.arena_settings());
    scene.subscribe(Box::new(|event: &DayEvent| match event {
        DayEvent::Started { day_index } => info!(day = *day_index, "day_listener_started"),
        DayEvent::Ended(result) => info!(
            day = result.day_index,
            alive = result.population.total_alive(),
            spawned = result.population.total_spawned_today(),
            "day_listener_ended"
        ),
    }));

    Ok(AppWiring {
        config,
        scene,
        input: Box::new(IdleInput),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_enabled_mods_from_env() -> ContentPlanRequest {
    std::env::var(ENABLED_MODS_ENV_VAR)
        .ok()
        .map(|raw| ContentPlanRequest::from_mod_list(&raw))
        .unwrap_or_default()
}
