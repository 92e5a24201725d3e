use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPlanRequest {
    pub enabled_mods: Vec<String>,
}

impl ContentPlanRequest {
    /// Parses a comma-separated mod list, skipping blank segments.
    pub fn from_mod_list(raw: &str) -> Self {
        Self {
            enabled_mods: raw
                .split(',')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContentPlanError {
    #[error("enabled mod id cannot be empty")]
    EmptyEnabledMod,
    #[error("duplicate enabled mod id in request: {mod_id}")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod does not exist on disk: {mod_id} at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_list_is_trimmed_and_keeps_order() {
        let request = ContentPlanRequest::from_mod_list(" harder , ,extra_ore");
        assert_eq!(request.enabled_mods, vec!["harder", "extra_ore"]);
    }
}
