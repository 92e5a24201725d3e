use std::collections::HashSet;
use std::path::PathBuf;

use crate::AppPaths;

use super::types::{ContentPlanError, ContentPlanRequest};

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub source_dir: PathBuf,
}

/// Base content first, then enabled mods in request order.
pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentPlanRequest,
) -> Result<Vec<ModSource>, ContentPlanError> {
    let mut seen = HashSet::<&str>::new();
    let mut sources = vec![ModSource {
        mod_id: "base".to_string(),
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for mod_id in &request.enabled_mods {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentPlanError::EmptyEnabledMod);
        }
        if !seen.insert(trimmed) {
            return Err(ContentPlanError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        if !mod_dir.is_dir() {
            return Err(ContentPlanError::EnabledModMissing {
                mod_id: trimmed.to_string(),
                expected_dir: mod_dir,
            });
        }
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}
