use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use semver::Version;
use thiserror::Error;

use dotver_model::{ChannelEntry, Registry};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry file not found at {path}")]
    NotFound { path: PathBuf },
    #[error("registry file {path} is corrupted or contains invalid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to {context} registry file {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Owns the persisted registry document.
///
/// Every mutation loads the whole registry, changes it in memory, and
/// overwrites the file atomically (temp file plus rename). Concurrent
/// invocations are excluded by the process-level lock, not here.
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the registry.
    ///
    /// # Errors
    /// `NotFound` when no registry exists yet, `Corrupt` when the file
    /// does not parse, `Io` when it cannot be read.
    pub fn load(&self) -> Result<Registry, RegistryError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(RegistryError::Io {
                    context: "read",
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&data).map_err(|source| RegistryError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Load the registry, treating a missing file as an empty registry.
    ///
    /// # Errors
    /// Propagates `Corrupt` and `Io`.
    pub fn load_or_default(&self) -> Result<Registry, RegistryError> {
        match self.load() {
            Ok(registry) => Ok(registry),
            Err(RegistryError::NotFound { .. }) => Ok(Registry::default()),
            Err(error) => Err(error),
        }
    }

    /// Whether the channel has an entry. A missing registry file means
    /// nothing is installed, not an error.
    ///
    /// # Errors
    /// Propagates `Corrupt` and `Io`.
    pub fn is_channel_installed(&self, channel: &str) -> Result<bool, RegistryError> {
        match self.load() {
            Ok(registry) => Ok(registry.installed_channels.contains_key(channel)),
            Err(RegistryError::NotFound { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Insert or overwrite a channel entry and persist the registry.
    /// When `is_new_primary` is set the primary CLI version is bumped to
    /// `sdk_version`.
    ///
    /// # Errors
    /// Returns an error when the registry cannot be written.
    pub fn upsert(
        &self,
        channel: &str,
        registry: &mut Registry,
        sdk_version: Version,
        runtime_version: Version,
        sdk_manifests: Vec<Version>,
        is_new_primary: bool,
    ) -> Result<(), RegistryError> {
        if is_new_primary {
            registry.cli_version = Some(sdk_version.clone());
        }
        registry.installed_channels.insert(
            channel.to_string(),
            ChannelEntry {
                sdk_version,
                runtime_version,
                sdk_manifests,
            },
        );
        self.save(registry)
    }

    /// Delete a channel entry (absent entries are fine) and persist.
    ///
    /// # Errors
    /// Returns an error when the registry cannot be written.
    pub fn remove(&self, channel: &str, registry: &mut Registry) -> Result<(), RegistryError> {
        registry.installed_channels.remove(channel);
        self.save(registry)
    }

    /// Persist the registry atomically.
    ///
    /// # Errors
    /// Returns an error when the registry cannot be written.
    pub fn save(&self, registry: &Registry) -> Result<(), RegistryError> {
        let data = serde_json::to_vec_pretty(registry).map_err(|source| RegistryError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &data).map_err(|source| RegistryError::Io {
            context: "write",
            path: self.path.clone(),
            source,
        })?;
        debug!("registry persisted to {}", self.path.display());
        Ok(())
    }
}

/// Write to a uniquely-named temp file, then rename over the target, so
/// an interrupted write never leaves a half-written registry behind.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "registry path has no parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("registry");
    let pid = std::process::id();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());

    let mut tmp_path = None;
    for attempt in 0..16_u8 {
        let candidate = parent.join(format!(".{file_name}.{pid}.{timestamp}.{attempt}.tmp"));
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                file.write_all(data)?;
                file.sync_all()?;
                tmp_path = Some(candidate);
                break;
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }

    let Some(tmp_path) = tmp_path else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "failed to create unique registry temp file",
        ));
    };

    if let Err(error) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(error);
    }

    Ok(())
}
