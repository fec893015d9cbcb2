// src/infra/paths.rs — Config path management
//
// RLM_REFINE_HOME overrides the config directory. When unset, config lives
// in ~/.rlm-refine/.

use std::path::PathBuf;

/// Returns the RLM_REFINE_HOME override, if set.
fn rlm_home() -> Option<PathBuf> {
    std::env::var_os("RLM_REFINE_HOME").map(PathBuf::from)
}

/// Home directory, when one can be determined.
pub fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// Configuration directory: $RLM_REFINE_HOME/ or ~/.rlm-refine/
pub fn config_dir() -> Option<PathBuf> {
    if let Some(home) = rlm_home() {
        return Some(home);
    }
    dirs_home().map(|h| h.join(".rlm-refine"))
}

/// Config file path
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}
