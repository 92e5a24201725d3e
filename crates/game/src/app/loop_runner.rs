use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::{build_app, AppWiring};

pub(crate) fn run() -> ExitCode {
    let AppWiring {
        config,
        mut scene,
        mut input,
    } = match build_app() {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let summary = match run_app(&config, &mut scene, input.as_mut()) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    if let Some(err) = scene.setup_error() {
        error!(error = %err, "arena_unavailable");
        return ExitCode::FAILURE;
    }

    let stats = scene.stats();
    info!(
        ticks = summary.ticks_run,
        simulated_seconds = summary.simulated_seconds,
        exit = ?summary.exit,
        days = stats.days_completed,
        harvested = stats.nodes_harvested,
        hostiles_defeated = stats.hostiles_defeated,
        shots_fired = stats.shots_fired,
        agent_hits = stats.agent_hits,
        "run_summary"
    );
    for (item_id, count) in scene.loot_totals() {
        info!(item = item_id.as_str(), count, "run_loot");
    }
    ExitCode::SUCCESS
}
