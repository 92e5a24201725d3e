mod compiler;
mod database;
mod discovery;
mod types;

pub use compiler::{compile_def_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{
    ArenaDef, DefDatabase, DefDatabaseBuilder, DensityRounding, HostileDef, InteractableDef,
    ObstacleDef, RefillDef, SpawnRuleDef, YieldEntryDef,
};
pub use types::{ContentPlanError, ContentPlanRequest};
