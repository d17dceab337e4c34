//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load the parameter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file {0:?}: {1}")]
    DeserialiseError(PathBuf, toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file from the given parameters directory.
///
/// Executables pass `<root>/params`, with the root resolved by [`crate::host::get_sw_root_or_cwd`]
/// or given on the command line.
pub fn load_from<P>(params_dir: &Path, param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let path = params_dir.join(param_file_path);

    // Load the file into a string
    let params_str = match read_to_string(&path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(path, e)),
    };

    // Parse the string into the parameter struct
    toml::from_str(params_str.as_str()).map_err(|e| LoadError::DeserialiseError(path, e))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
