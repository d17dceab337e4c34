//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable pointing at the software root, the directory holding `params/` and
/// `sessions/`.
pub const SW_ROOT_ENV_VAR: &str = "NAV_BRIDGE_ROOT";

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the software root directory.
///
/// Returns the value of `NAV_BRIDGE_ROOT` if set, otherwise an error.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Get the software root, falling back to the current working directory if the environment
/// variable is not set.
pub fn get_sw_root_or_cwd() -> PathBuf {
    match get_sw_root() {
        Ok(p) => p,
        Err(_) => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
