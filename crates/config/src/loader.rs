//! Load configuration from disk or from a string.

use std::{fs, path::Path};

use tracing::debug;

use crate::{Config, Error, Result, parse::parse};

/// Config path used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "./config.txt";

/// Load and parse the configuration file at `path`.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let source = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: format!("failed to read config file: {e}"),
    })?;
    let config = load_from_str(&source, Some(path))?;
    debug!(path = %path.display(), entries = config.entries.len(), "config_loaded");
    Ok(config)
}

/// Parse configuration text. `path` is only used to annotate errors.
pub fn load_from_str(source: &str, path: Option<&Path>) -> Result<Config> {
    parse(source, path)
}
