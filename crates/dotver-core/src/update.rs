use log::{debug, info};
use semver::Version;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use dotver_model::Registry;
use dotver_platform::InstallRoot;

use crate::catalog::CatalogSnapshot;
use crate::extract::ArchiveExtractor;
use crate::install::{InstallError, InstallProgress, Installer};
use crate::resolve::{ChannelSpec, ResolveError, SpecParseError, resolve_sdk, select_artifact};
use crate::store::{RegistryError, RegistryStore};
use crate::uninstall::{UninstallError, Uninstaller};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("channel {channel} is not installed")]
    NotInstalled { channel: String },
    #[error(transparent)]
    Spec(#[from] SpecParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Uninstall(#[from] UninstallError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    UpToDate,
    Updated { from: Version, to: Version },
}

/// Moves an installed channel to the latest release it resolves to,
/// then retires artifacts only the replaced release used.
pub struct Updater<'a> {
    http: &'a reqwest::Client,
    root: &'a InstallRoot,
    store: &'a RegistryStore,
    extractor: &'a dyn ArchiveExtractor,
    rid: &'a str,
}

impl<'a> Updater<'a> {
    #[must_use]
    pub fn new(
        http: &'a reqwest::Client,
        root: &'a InstallRoot,
        store: &'a RegistryStore,
        extractor: &'a dyn ArchiveExtractor,
        rid: &'a str,
    ) -> Self {
        Self {
            http,
            root,
            store,
            extractor,
            rid,
        }
    }

    /// Update a single installed channel.
    ///
    /// The new release is installed before anything is removed, so a
    /// failed download or extraction leaves the old installation
    /// intact. Cleanup of the replaced release reuses the uninstall
    /// reference counting: the old versions are counted under a
    /// synthetic entry in a scratch copy of the registry, so artifacts
    /// the new release (or any other channel) shares are kept.
    ///
    /// # Errors
    /// See [`UpdateError`].
    pub async fn update_channel(
        &self,
        channel: &str,
        registry: &mut Registry,
        snapshot: &CatalogSnapshot,
        progress: &mpsc::Sender<InstallProgress>,
        cancel: &CancellationToken,
    ) -> Result<UpdateOutcome, UpdateError> {
        let previous = registry
            .installed_channels
            .get(channel)
            .cloned()
            .ok_or_else(|| UpdateError::NotInstalled {
                channel: channel.to_string(),
            })?;

        let spec: ChannelSpec = channel.parse()?;
        let target = resolve_sdk(&spec, &snapshot.channels, &snapshot.sdks).ok_or_else(|| {
            ResolveError::NoMatch {
                spec: spec.to_string(),
            }
        })?;

        if target.version == previous.sdk_version {
            debug!("channel {channel} is already at {}", target.version);
            return Ok(UpdateOutcome::UpToDate);
        }

        if let Some(existing) = registry.entry_with_sdk(&target.version).cloned() {
            // Another channel already carries the target SDK; only the
            // registry entry needs to change.
            info!(
                "SDK {} already present, relinking channel {channel}",
                target.version
            );
            self.store.upsert(
                channel,
                registry,
                existing.sdk_version,
                existing.runtime_version,
                existing.sdk_manifests,
                false,
            )?;
        } else {
            let runtime_version = target.runtime_version.clone().ok_or_else(|| {
                ResolveError::MissingRuntimeVersion {
                    version: target.version.clone(),
                }
            })?;
            let file = select_artifact(target, self.rid)?;
            let installer = Installer::new(
                self.http,
                self.root,
                self.store,
                self.extractor,
                progress.clone(),
                cancel.clone(),
            );
            installer
                .install(file, channel, registry, &target.version, &runtime_version)
                .await?;
        }

        let mut scratch = registry.clone();
        let synthetic = Uuid::new_v4().to_string();
        scratch
            .installed_channels
            .insert(synthetic.clone(), previous.clone());
        let uninstaller = Uninstaller::new(self.root, self.store, self.rid);
        uninstaller.uninstall(&synthetic, &mut scratch, false)?;

        info!(
            "updated channel {channel} from {} to {}",
            previous.sdk_version, target.version
        );
        Ok(UpdateOutcome::Updated {
            from: previous.sdk_version,
            to: target.version.clone(),
        })
    }

    /// Update every installed channel, stopping at the first failure.
    ///
    /// # Errors
    /// Propagates the first failing channel's error.
    pub async fn update_all(
        &self,
        registry: &mut Registry,
        snapshot: &CatalogSnapshot,
        progress: &mpsc::Sender<InstallProgress>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, UpdateOutcome)>, UpdateError> {
        let channels: Vec<String> = registry.installed_channels.keys().cloned().collect();
        let mut outcomes = Vec::with_capacity(channels.len());
        for channel in channels {
            let outcome = self
                .update_channel(&channel, registry, snapshot, progress, cancel)
                .await?;
            outcomes.push((channel, outcome));
        }
        Ok(outcomes)
    }
}
