use std::path::{Path, PathBuf};

use semver::Version;
use thiserror::Error;

/// Environment variable overriding the default installation root.
pub const ENV_ROOT: &str = "DOTVER_ROOT";

const REGISTRY_FILE: &str = "registry.json";
const CACHE_DIR: &str = "cache";
const LOCK_FILE: &str = "dotver.lock";
const INSTANCES_DIR: &str = "dotnetroot";
const CLI_NAME: &str = "dotnet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RootError {
    #[error("could not determine the local data directory")]
    DataDirUnavailable,
}

/// Layout of one installation root.
///
/// All persisted state (registry, cache, downloaded artifacts, the shared
/// installation tree) lives under a single configurable directory.
#[derive(Debug, Clone)]
pub struct InstallRoot {
    root: PathBuf,
}

impl InstallRoot {
    /// Resolve the root from `DOTVER_ROOT`, falling back to the
    /// platform's local data directory.
    ///
    /// # Errors
    /// Returns an error when no base directory can be determined.
    pub fn from_env() -> Result<Self, RootError> {
        match std::env::var(ENV_ROOT) {
            Ok(value) if !value.trim().is_empty() => Ok(Self::at(PathBuf::from(value))),
            _ => {
                let base = dirs::data_local_dir().ok_or(RootError::DataDirUnavailable)?;
                Ok(Self::at(base.join("dotver")))
            }
        }
    }

    #[must_use]
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// The shared installation tree all channels merge into.
    #[must_use]
    pub fn instances_dir(&self) -> PathBuf {
        self.root.join(INSTANCES_DIR)
    }

    #[must_use]
    pub fn cli_path(&self) -> PathBuf {
        self.instances_dir().join(CLI_NAME)
    }

    #[must_use]
    pub fn sdk_dir(&self, version: &Version) -> PathBuf {
        self.instances_dir().join("sdk").join(version.to_string())
    }

    #[must_use]
    pub fn sdk_manifests_dir(&self, version: &Version) -> PathBuf {
        self.instances_dir()
            .join("sdk-manifests")
            .join(version.to_string())
    }

    #[must_use]
    pub fn host_fxr_dir(&self, runtime: &Version) -> PathBuf {
        self.instances_dir()
            .join("host")
            .join("fxr")
            .join(runtime.to_string())
    }

    #[must_use]
    pub fn apphost_pack_dir(&self, rid: &str, runtime: &Version) -> PathBuf {
        self.instances_dir()
            .join("packs")
            .join(format!("Microsoft.NETCore.App.Host.{rid}"))
            .join(runtime.to_string())
    }

    #[must_use]
    pub fn netcore_ref_pack_dir(&self, runtime: &Version) -> PathBuf {
        self.instances_dir()
            .join("packs")
            .join("Microsoft.NETCore.App.Ref")
            .join(runtime.to_string())
    }

    #[must_use]
    pub fn aspnet_ref_pack_dir(&self, runtime: &Version) -> PathBuf {
        self.instances_dir()
            .join("packs")
            .join("Microsoft.AspNetCore.App.Ref")
            .join(runtime.to_string())
    }

    #[must_use]
    pub fn shared_netcore_dir(&self, runtime: &Version) -> PathBuf {
        self.instances_dir()
            .join("shared")
            .join("Microsoft.NETCore.App")
            .join(runtime.to_string())
    }

    #[must_use]
    pub fn shared_aspnet_dir(&self, runtime: &Version) -> PathBuf {
        self.instances_dir()
            .join("shared")
            .join("Microsoft.AspNetCore.App")
            .join(runtime.to_string())
    }

    #[must_use]
    pub fn shared_aspnet_all_dir(&self, runtime: &Version) -> PathBuf {
        self.instances_dir()
            .join("shared")
            .join("Microsoft.AspNetCore.All")
            .join(runtime.to_string())
    }

    #[must_use]
    pub fn templates_dir(&self, runtime: &Version) -> PathBuf {
        self.instances_dir()
            .join("templates")
            .join(runtime.to_string())
    }

    /// Every directory scoped to one runtime version: the host resolver,
    /// the three packs, the three shared frameworks, and the templates.
    #[must_use]
    pub fn runtime_scoped_dirs(&self, rid: &str, runtime: &Version) -> Vec<PathBuf> {
        vec![
            self.host_fxr_dir(runtime),
            self.apphost_pack_dir(rid, runtime),
            self.netcore_ref_pack_dir(runtime),
            self.aspnet_ref_pack_dir(runtime),
            self.shared_netcore_dir(runtime),
            self.shared_aspnet_dir(runtime),
            self.shared_aspnet_all_dir(runtime),
            self.templates_dir(runtime),
        ]
    }

    /// Create the root and cache directories if missing.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> InstallRoot {
        InstallRoot::at(PathBuf::from("/tmp/dotver-root"))
    }

    fn version(text: &str) -> Version {
        text.parse().expect("test version should parse")
    }

    #[test]
    fn layout_matches_shared_tree_shape() {
        let root = root();
        let sdk = version("10.0.100");
        let runtime = version("10.0.0");

        assert_eq!(
            root.sdk_dir(&sdk),
            Path::new("/tmp/dotver-root/dotnetroot/sdk/10.0.100")
        );
        assert_eq!(
            root.sdk_manifests_dir(&sdk),
            Path::new("/tmp/dotver-root/dotnetroot/sdk-manifests/10.0.100")
        );
        assert_eq!(
            root.host_fxr_dir(&runtime),
            Path::new("/tmp/dotver-root/dotnetroot/host/fxr/10.0.0")
        );
        assert_eq!(
            root.apphost_pack_dir("linux-x64", &runtime),
            Path::new("/tmp/dotver-root/dotnetroot/packs/Microsoft.NETCore.App.Host.linux-x64/10.0.0")
        );
        assert_eq!(
            root.shared_netcore_dir(&runtime),
            Path::new("/tmp/dotver-root/dotnetroot/shared/Microsoft.NETCore.App/10.0.0")
        );
        assert_eq!(
            root.templates_dir(&runtime),
            Path::new("/tmp/dotver-root/dotnetroot/templates/10.0.0")
        );
    }

    #[test]
    fn runtime_scoped_dirs_cover_all_runtime_directories() {
        let dirs = root().runtime_scoped_dirs("linux-x64", &version("10.0.0"));
        assert_eq!(dirs.len(), 8);
        assert!(dirs.iter().all(|d| d.ends_with("10.0.0")));
    }

    #[test]
    fn ensure_dirs_creates_root_and_cache() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let root = InstallRoot::at(temp.path().join("dotver"));
        root.ensure_dirs().expect("directories should be created");
        assert!(root.cache_dir().is_dir());
    }
}
