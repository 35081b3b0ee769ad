use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use dotver_model::Registry;
use dotver_platform::InstallRoot;

use crate::store::{RegistryError, RegistryStore};

#[derive(Debug, Error)]
pub enum UninstallError {
    #[error("channel {channel} is not installed")]
    NotInstalled { channel: String },
    #[error("failed to remove {path}: {source}")]
    Remove {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Removes a channel's artifacts from the shared installation tree,
/// keeping anything still referenced by another channel.
pub struct Uninstaller<'a> {
    root: &'a InstallRoot,
    store: &'a RegistryStore,
    rid: &'a str,
}

impl<'a> Uninstaller<'a> {
    #[must_use]
    pub fn new(root: &'a InstallRoot, store: &'a RegistryStore, rid: &'a str) -> Self {
        Self { root, store, rid }
    }

    /// Uninstall `channel`, deleting only artifacts no other channel
    /// references.
    ///
    /// The registry entry is removed (when `remove_entry` is set) even
    /// if an on-disk deletion fails partway, so a partially deleted
    /// installation is never still claimed by the registry.
    ///
    /// # Errors
    /// Fails if the channel is not installed, a deletion fails, or the
    /// registry cannot be persisted.
    pub fn uninstall(
        &self,
        channel: &str,
        registry: &mut Registry,
        remove_entry: bool,
    ) -> Result<(), UninstallError> {
        let entry = registry
            .installed_channels
            .get(channel)
            .cloned()
            .ok_or_else(|| UninstallError::NotInstalled {
                channel: channel.to_string(),
            })?;

        let deletion = self.delete_artifacts(channel, registry, &entry);

        if remove_entry {
            self.store.remove(channel, registry)?;
        }

        deletion?;
        info!("uninstalled channel {channel}");
        Ok(())
    }

    fn delete_artifacts(
        &self,
        channel: &str,
        registry: &Registry,
        entry: &dotver_model::ChannelEntry,
    ) -> Result<(), UninstallError> {
        if registry.sdk_ref_count(&entry.sdk_version) > 1 {
            debug!(
                "SDK {} still referenced by another channel, keeping all artifacts for {channel}",
                entry.sdk_version
            );
            return Ok(());
        }

        delete_dir_if_exists(&self.root.sdk_dir(&entry.sdk_version))?;

        for manifest in &entry.sdk_manifests {
            if registry.manifest_ref_count(manifest) == 1 {
                delete_dir_if_exists(&self.root.sdk_manifests_dir(manifest))?;
            } else {
                debug!("manifest {manifest} still referenced, keeping it");
            }
        }

        if registry.runtime_ref_count(&entry.runtime_version) > 1 {
            debug!(
                "runtime {} still referenced by another channel, keeping shared components",
                entry.runtime_version
            );
            return Ok(());
        }

        for dir in self.root.runtime_scoped_dirs(self.rid, &entry.runtime_version) {
            delete_dir_if_exists(&dir)?;
        }

        Ok(())
    }
}

fn delete_dir_if_exists(path: &Path) -> Result<(), UninstallError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("removed {}", path.display());
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UninstallError::Remove {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use semver::Version;

    use dotver_model::ChannelEntry;

    use super::*;

    const RID: &str = "linux-x64";

    fn version(text: &str) -> Version {
        text.parse().expect("test version should parse")
    }

    fn entry(sdk: &str, runtime: &str, manifests: &[&str]) -> ChannelEntry {
        ChannelEntry {
            sdk_version: version(sdk),
            runtime_version: version(runtime),
            sdk_manifests: manifests.iter().map(|m| version(m)).collect(),
        }
    }

    fn populate(root: &InstallRoot, entry: &ChannelEntry) {
        std::fs::create_dir_all(root.sdk_dir(&entry.sdk_version))
            .expect("sdk dir should be created");
        for manifest in &entry.sdk_manifests {
            std::fs::create_dir_all(root.sdk_manifests_dir(manifest))
                .expect("manifest dir should be created");
        }
        for dir in root.runtime_scoped_dirs(RID, &entry.runtime_version) {
            std::fs::create_dir_all(dir).expect("runtime dir should be created");
        }
    }

    struct Fixture {
        _temp: tempfile::TempDir,
        root: InstallRoot,
        store: RegistryStore,
        registry: Registry,
    }

    fn fixture(channels: &[(&str, ChannelEntry)]) -> Fixture {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let root = InstallRoot::at(temp.path().to_path_buf());
        let store = RegistryStore::new(root.registry_file());

        let mut installed = BTreeMap::new();
        for (name, entry) in channels {
            populate(&root, entry);
            installed.insert((*name).to_string(), entry.clone());
        }
        let registry = Registry {
            cli_version: channels
                .iter()
                .map(|(_, e)| e.sdk_version.clone())
                .max(),
            installed_channels: installed,
        };
        store.save(&registry).expect("registry should persist");

        Fixture {
            _temp: temp,
            root,
            store,
            registry,
        }
    }

    #[test]
    fn sole_channel_removes_everything() {
        let mut fx = fixture(&[("10.0", entry("10.0.100", "10.0.0", &["10.0.100"]))]);
        let uninstaller = Uninstaller::new(&fx.root, &fx.store, RID);

        uninstaller
            .uninstall("10.0", &mut fx.registry, true)
            .expect("uninstall should succeed");

        assert!(!fx.root.sdk_dir(&version("10.0.100")).exists());
        assert!(!fx.root.sdk_manifests_dir(&version("10.0.100")).exists());
        for dir in fx.root.runtime_scoped_dirs(RID, &version("10.0.0")) {
            assert!(!dir.exists(), "{} should be deleted", dir.display());
        }
        assert!(!fx.registry.installed_channels.contains_key("10.0"));
    }

    #[test]
    fn shared_sdk_keeps_all_artifacts() {
        let mut fx = fixture(&[
            ("10.0", entry("10.0.100", "10.0.0", &["10.0.100"])),
            ("latest", entry("10.0.100", "10.0.0", &["10.0.100"])),
        ]);
        let uninstaller = Uninstaller::new(&fx.root, &fx.store, RID);

        uninstaller
            .uninstall("latest", &mut fx.registry, true)
            .expect("uninstall should succeed");

        assert!(fx.root.sdk_dir(&version("10.0.100")).exists());
        assert!(fx.root.sdk_manifests_dir(&version("10.0.100")).exists());
        for dir in fx.root.runtime_scoped_dirs(RID, &version("10.0.0")) {
            assert!(dir.exists(), "{} should survive", dir.display());
        }
        assert!(!fx.registry.installed_channels.contains_key("latest"));
        assert!(fx.registry.installed_channels.contains_key("10.0"));
    }

    #[test]
    fn shared_runtime_keeps_runtime_components_only() {
        // Different SDK feature bands over the same runtime.
        let mut fx = fixture(&[
            ("10.0", entry("10.0.100", "10.0.0", &["10.0.100"])),
            ("10.0.2xx", entry("10.0.200", "10.0.0", &["10.0.200"])),
        ]);
        let uninstaller = Uninstaller::new(&fx.root, &fx.store, RID);

        uninstaller
            .uninstall("10.0.2xx", &mut fx.registry, true)
            .expect("uninstall should succeed");

        assert!(!fx.root.sdk_dir(&version("10.0.200")).exists());
        assert!(!fx.root.sdk_manifests_dir(&version("10.0.200")).exists());
        assert!(fx.root.sdk_dir(&version("10.0.100")).exists());
        for dir in fx.root.runtime_scoped_dirs(RID, &version("10.0.0")) {
            assert!(dir.exists(), "{} should survive", dir.display());
        }
    }

    #[test]
    fn shared_manifest_survives_sdk_removal() {
        let mut fx = fixture(&[
            ("9.0", entry("9.0.300", "9.0.3", &["9.0.100"])),
            ("9.0.1xx", entry("9.0.100", "9.0.3", &["9.0.100"])),
        ]);
        let uninstaller = Uninstaller::new(&fx.root, &fx.store, RID);

        uninstaller
            .uninstall("9.0", &mut fx.registry, true)
            .expect("uninstall should succeed");

        assert!(!fx.root.sdk_dir(&version("9.0.300")).exists());
        assert!(fx.root.sdk_manifests_dir(&version("9.0.100")).exists());
        for dir in fx.root.runtime_scoped_dirs(RID, &version("9.0.3")) {
            assert!(dir.exists(), "{} should survive", dir.display());
        }
    }

    #[test]
    fn keeping_entry_leaves_registry_untouched() {
        let mut fx = fixture(&[("10.0", entry("10.0.100", "10.0.0", &[]))]);
        let uninstaller = Uninstaller::new(&fx.root, &fx.store, RID);

        uninstaller
            .uninstall("10.0", &mut fx.registry, false)
            .expect("uninstall should succeed");

        assert!(fx.registry.installed_channels.contains_key("10.0"));
    }

    #[test]
    fn unknown_channel_is_an_error() {
        let mut fx = fixture(&[]);
        let uninstaller = Uninstaller::new(&fx.root, &fx.store, RID);

        let result = uninstaller.uninstall("8.0", &mut fx.registry, true);
        assert!(matches!(result, Err(UninstallError::NotInstalled { .. })));
    }

    #[test]
    fn missing_directories_are_tolerated() {
        let mut fx = fixture(&[("10.0", entry("10.0.100", "10.0.0", &[]))]);
        std::fs::remove_dir_all(fx.root.sdk_dir(&version("10.0.100")))
            .expect("dir should be removable");

        let uninstaller = Uninstaller::new(&fx.root, &fx.store, RID);
        uninstaller
            .uninstall("10.0", &mut fx.registry, true)
            .expect("uninstall should tolerate missing dirs");
    }
}
