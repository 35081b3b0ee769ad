use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use dotver_model::GlobalConfig;

const GLOBAL_CONFIG_FILE: &str = "global.json";

#[derive(Debug, Error)]
pub enum GlobalConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// SDK version pinned by the nearest `global.json`, walking up from
/// `start`.
///
/// The walk stops at the first `global.json` found, even when it pins
/// nothing, matching how the SDK host resolves the file.
///
/// # Errors
/// Fails when a `global.json` exists but cannot be read or parsed.
pub fn pinned_sdk_version(start: &Path) -> Result<Option<String>, GlobalConfigError> {
    for dir in start.ancestors() {
        let path = dir.join(GLOBAL_CONFIG_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
            Err(source) => return Err(GlobalConfigError::Read { path, source }),
        };
        let config: GlobalConfig =
            serde_json::from_str(&data).map_err(|source| GlobalConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!("found {}", path.display());
        return Ok(config.pinned_version().map(str::to_string));
    }
    Ok(None)
}
