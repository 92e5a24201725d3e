use std::env;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::{compile_def_database, resolve_app_paths, ContentCompileError, ContentPlanRequest};
use crate::{AppPaths, DefDatabase, StartupError};

use super::input::InputSource;
use super::metrics::MetricsAccumulator;
use super::{MetricsHandle, Scene, SceneCommand, SceneWorld};

pub const PACING_ENV_VAR: &str = "DAYVIVE_PACING";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPacing {
    /// Sleep between ticks so simulated time tracks wall time.
    Realtime,
    /// Run one tick per iteration without sleeping.
    Unpaced,
}

impl LoopPacing {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "realtime" => Some(Self::Realtime),
            "unpaced" => Some(Self::Unpaced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub pacing: LoopPacing,
    pub max_ticks: Option<u64>,
    pub content_plan_request: ContentPlanRequest,
    /// Already-resolved project paths; resolved from the environment when `None`.
    pub app_paths: Option<AppPaths>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            pacing: LoopPacing::Realtime,
            max_ticks: None,
            content_plan_request: ContentPlanRequest::default(),
            app_paths: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to compile content definitions: {0}")]
    Content(#[from] ContentCompileError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    SceneQuit,
    InputQuit,
    TickBudget,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSummary {
    pub ticks_run: u64,
    pub simulated_seconds: f64,
    pub exit: LoopExit,
}

pub fn run_app(
    config: &LoopConfig,
    scene: &mut dyn Scene,
    input: &mut dyn InputSource,
) -> Result<LoopSummary, AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, scene, input, &metrics_handle)
}

/// Resolves the project root (unless the config carries one), compiles
/// content, then drives `scene` until it
/// quits, input asks to quit, or the tick budget runs out.
pub fn run_app_with_metrics(
    config: &LoopConfig,
    scene: &mut dyn Scene,
    input: &mut dyn InputSource,
    metrics_handle: &MetricsHandle,
) -> Result<LoopSummary, AppError> {
    let app_paths = match &config.app_paths {
        Some(app_paths) => app_paths.clone(),
        None => resolve_app_paths()?,
    };
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        mods_dir = %app_paths.mods_dir.display(),
        config_dir = %app_paths.config_dir.display(),
        enabled_mods = ?config.content_plan_request.enabled_mods,
        "startup"
    );
    let def_database = compile_def_database(&app_paths, &config.content_plan_request)?;
    Ok(run_scene(
        config,
        scene,
        input,
        Some(def_database),
        metrics_handle,
    ))
}

/// Fixed-step loop without any filesystem access.
pub fn run_scene(
    config: &LoopConfig,
    scene: &mut dyn Scene,
    input: &mut dyn InputSource,
    def_database: Option<DefDatabase>,
    metrics_handle: &MetricsHandle,
) -> LoopSummary {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let pacing = resolve_pacing(config.pacing);

    let mut world = SceneWorld::default();
    if let Some(def_database) = def_database {
        world.set_def_database(def_database);
    }
    scene.load(&mut world);
    world.apply_pending();
    info!(entity_count = world.entity_count(), "scene_loaded");

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        pacing = ?pacing,
        max_ticks = ?config.max_ticks,
        "loop_config"
    );

    let mut tick_index = 0u64;
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, Instant::now());

    let exit = 'frames: loop {
        let ticks_to_run = match pacing {
            LoopPacing::Unpaced => 1,
            LoopPacing::Realtime => {
                let now = Instant::now();
                let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                last_frame_instant = now;
                accumulator =
                    accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

                let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                accumulator = step_plan.remaining_accumulator;
                if step_plan.dropped_backlog > Duration::ZERO {
                    warn!(
                        dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                        max_ticks_per_frame, "sim_clamp_triggered"
                    );
                }
                step_plan.ticks_to_run
            }
        };

        for _ in 0..ticks_to_run {
            if config.max_ticks.is_some_and(|max| tick_index >= max) {
                break 'frames LoopExit::TickBudget;
            }
            let input_snapshot = input.next_snapshot(tick_index);
            if input_snapshot.quit_requested() {
                info!(reason = "input", tick = tick_index, "shutdown_requested");
                break 'frames LoopExit::InputQuit;
            }

            let tick_start = Instant::now();
            let command = scene.update(fixed_dt_seconds, &input_snapshot, &mut world);
            world.apply_pending();
            metrics_accumulator.record_tick(tick_start.elapsed());
            tick_index = tick_index.saturating_add(1);

            if command == SceneCommand::Quit {
                info!(reason = "scene", tick = tick_index, "shutdown_requested");
                break 'frames LoopExit::SceneQuit;
            }
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            let title = scene.debug_title(&world).unwrap_or_default();
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                max_tick_time_ms = snapshot.max_tick_time_ms,
                total_ticks = snapshot.total_ticks,
                entity_count = world.entity_count(),
                title = title.as_str(),
                "loop_metrics"
            );
        }

        if pacing == LoopPacing::Realtime {
            let until_next_tick = fixed_dt.saturating_sub(accumulator);
            if until_next_tick > Duration::ZERO {
                thread::sleep(until_next_tick);
            }
        }
    };

    scene.unload(&mut world);
    world.apply_pending();

    let summary = LoopSummary {
        ticks_run: tick_index,
        simulated_seconds: tick_index as f64 * fixed_dt.as_secs_f64(),
        exit,
    };
    info!(
        ticks_run = summary.ticks_run,
        simulated_seconds = summary.simulated_seconds,
        exit = ?summary.exit,
        "shutdown"
    );
    summary
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::replace(&mut accumulator, Duration::ZERO)
    } else {
        Duration::ZERO
    };

    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn resolve_pacing(configured: LoopPacing) -> LoopPacing {
    match env::var(PACING_ENV_VAR) {
        Ok(value) => LoopPacing::parse(&value).unwrap_or_else(|| {
            warn!(
                env_var = PACING_ENV_VAR,
                value = value.as_str(),
                "invalid pacing env var value; falling back to config"
            );
            configured
        }),
        Err(env::VarError::NotPresent) => configured,
        Err(err) => {
            warn!(
                env_var = PACING_ENV_VAR,
                error = %err,
                "unable to read pacing env var; falling back to config"
            );
            configured
        }
    }
}
