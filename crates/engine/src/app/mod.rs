mod input;
mod loop_runner;
mod metrics;
mod scene;
mod spatial;

pub use input::{IdleInput, InputAction, InputSnapshot, InputSource};
pub use loop_runner::{
    run_app, run_app_with_metrics, run_scene, AppError, LoopConfig, LoopExit, LoopPacing,
    LoopSummary, PACING_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{Entity, EntityId, Scene, SceneCommand, SceneWorld, Transform, Vec2};
pub use spatial::{Collider, IndexedCollider, Layer, LayerMask, SpatialIndex, DEFAULT_CELL_SIZE};
