use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Persisted state of an installation root: the primary CLI version plus
/// the mapping from channel name to the versions installed for it.
///
/// This document is the single source of truth for reference counting:
/// an artifact is live on disk iff at least one entry references its
/// version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    /// Version of the primary `dotnet` CLI, i.e. the highest SDK version
    /// ever installed in this root. Wins file-overwrite conflicts.
    #[serde(rename = "cli-version", skip_serializing_if = "Option::is_none")]
    pub cli_version: Option<Version>,
    #[serde(rename = "installed-channels", default)]
    pub installed_channels: BTreeMap<String, ChannelEntry>,
}

/// The SDK, runtime, and manifest versions installed for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEntry {
    #[serde(rename = "sdk-version")]
    pub sdk_version: Version,
    #[serde(rename = "runtime-version")]
    pub runtime_version: Version,
    #[serde(rename = "sdk-manifests")]
    pub sdk_manifests: Vec<Version>,
}

impl Registry {
    /// Number of channels referencing the given SDK version.
    #[must_use]
    pub fn sdk_ref_count(&self, version: &Version) -> usize {
        self.installed_channels
            .values()
            .filter(|entry| entry.sdk_version == *version)
            .count()
    }

    /// Number of channels referencing the given runtime version.
    #[must_use]
    pub fn runtime_ref_count(&self, version: &Version) -> usize {
        self.installed_channels
            .values()
            .filter(|entry| entry.runtime_version == *version)
            .count()
    }

    /// Number of channels referencing the given manifest version.
    #[must_use]
    pub fn manifest_ref_count(&self, version: &Version) -> usize {
        self.installed_channels
            .values()
            .filter(|entry| entry.sdk_manifests.contains(version))
            .count()
    }

    /// Entry of any channel that already has the given SDK version
    /// installed.
    #[must_use]
    pub fn entry_with_sdk(&self, version: &Version) -> Option<&ChannelEntry> {
        self.installed_channels
            .values()
            .find(|entry| entry.sdk_version == *version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sdk: &str, runtime: &str, manifests: &[&str]) -> ChannelEntry {
        ChannelEntry {
            sdk_version: sdk.parse().expect("test sdk version should parse"),
            runtime_version: runtime.parse().expect("test runtime version should parse"),
            sdk_manifests: manifests
                .iter()
                .map(|m| m.parse().expect("test manifest version should parse"))
                .collect(),
        }
    }

    fn sample_registry() -> Registry {
        Registry {
            cli_version: Some("10.0.100".parse().expect("version should parse")),
            installed_channels: BTreeMap::from([
                ("10.0".to_string(), entry("10.0.100", "10.0.0", &["10.0.100"])),
                ("latest".to_string(), entry("10.0.100", "10.0.0", &[])),
                ("9.0".to_string(), entry("9.0.300", "9.0.3", &["9.0.100"])),
            ]),
        }
    }

    #[test]
    fn ref_counts_scan_all_channels() {
        let registry = sample_registry();
        let shared_sdk: Version = "10.0.100".parse().expect("version should parse");
        let shared_runtime: Version = "10.0.0".parse().expect("version should parse");
        let lone_manifest: Version = "9.0.100".parse().expect("version should parse");

        assert_eq!(registry.sdk_ref_count(&shared_sdk), 2);
        assert_eq!(registry.runtime_ref_count(&shared_runtime), 2);
        assert_eq!(registry.manifest_ref_count(&shared_sdk), 1);
        assert_eq!(registry.manifest_ref_count(&lone_manifest), 1);
    }

    #[test]
    fn entry_with_sdk_finds_existing_installation() {
        let registry = sample_registry();
        let version: Version = "9.0.300".parse().expect("version should parse");
        let found = registry.entry_with_sdk(&version).expect("entry should exist");
        assert_eq!(found.runtime_version.to_string(), "9.0.3");

        let missing: Version = "8.0.100".parse().expect("version should parse");
        assert!(registry.entry_with_sdk(&missing).is_none());
    }

    #[test]
    fn registry_round_trips_through_json() {
        let registry = sample_registry();
        let json = serde_json::to_string(&registry).expect("registry should serialize");
        let restored: Registry = serde_json::from_str(&json).expect("registry should deserialize");
        assert_eq!(registry, restored);
    }

    #[test]
    fn registry_uses_documented_field_names() {
        let json = serde_json::to_value(sample_registry()).expect("registry should serialize");
        assert_eq!(json["cli-version"], "10.0.100");
        assert_eq!(
            json["installed-channels"]["10.0"]["sdk-version"],
            "10.0.100"
        );
        assert_eq!(
            json["installed-channels"]["10.0"]["runtime-version"],
            "10.0.0"
        );
        assert_eq!(
            json["installed-channels"]["10.0"]["sdk-manifests"][0],
            "10.0.100"
        );
    }

    #[test]
    fn missing_cli_version_is_omitted_and_defaulted() {
        let registry = Registry::default();
        let json = serde_json::to_string(&registry).expect("registry should serialize");
        assert!(!json.contains("cli-version"));

        let restored: Registry =
            serde_json::from_str(r#"{"installed-channels": {}}"#).expect("should deserialize");
        assert!(restored.cli_version.is_none());
        assert!(restored.installed_channels.is_empty());
    }
}
