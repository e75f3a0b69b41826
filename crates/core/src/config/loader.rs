//! Config path resolution

use std::path::PathBuf;

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "CTXPERMS_HOME";

/// Returns the ctxperms base directory.
///
/// `$CTXPERMS_HOME` if set, otherwise `<current dir>/ctxperms`.
pub fn base_dir() -> ConfigResult<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    let cwd = std::env::current_dir().map_err(ConfigError::IoError)?;
    Ok(cwd.join("ctxperms"))
}

/// Returns the core config path.
///
/// Path: `<base>/config.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(base_dir()?.join("config.toml"))
}
