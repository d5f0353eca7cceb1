//! Config path resolution
//!
//! The config file location comes from the `DSSOBJ_CONFIG` environment
//! variable, falling back to `dssobj.toml` in the working directory.

use std::path::PathBuf;

use super::{ConfigError, ConfigResult};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "DSSOBJ_CONFIG";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "dssobj.toml";

/// Returns the core config path.
///
/// Path: `$DSSOBJ_CONFIG`, or `./dssobj.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => {
            let cwd = std::env::current_dir().map_err(|_| ConfigError::NoConfigDirectory)?;
            Ok(cwd.join(CONFIG_FILE_NAME))
        }
    }
}
