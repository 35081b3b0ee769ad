use std::hash::{Hash, Hasher};

use semver::Version;
use serde::Deserialize;

/// Support phase of a release channel as published by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportPhase {
    Active,
    Preview,
    Eol,
}

/// Release cadence of a channel. The catalog spells "standard" as `sts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Lts,
    #[serde(rename = "sts")]
    Standard,
}

/// Top-level catalog index: one entry per release channel, each pointing
/// at that channel's detailed release list.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleasesIndex {
    #[serde(rename = "releases-index")]
    pub entries: Vec<ChannelSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSummary {
    #[serde(rename = "channel-version")]
    pub channel_version: String,
    #[serde(rename = "latest-release")]
    pub latest_release: Version,
    #[serde(rename = "latest-sdk")]
    pub latest_sdk: Version,
    #[serde(rename = "support-phase")]
    pub support_phase: SupportPhase,
    #[serde(rename = "release-type")]
    pub release_kind: ReleaseKind,
    #[serde(rename = "releases.json")]
    pub releases_json: String,
}

/// One channel's detailed release document.
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    #[serde(rename = "channel-version")]
    pub channel_version: String,
    #[serde(rename = "latest-release")]
    pub latest_release: Version,
    #[serde(rename = "latest-sdk")]
    pub latest_sdk: Version,
    #[serde(rename = "support-phase")]
    pub support_phase: SupportPhase,
    #[serde(rename = "release-type")]
    pub release_kind: ReleaseKind,
    pub releases: Vec<Release>,
}

/// One published toolchain release inside a channel document.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(rename = "release-version")]
    pub release_version: Version,
    pub sdk: SdkRelease,
    #[serde(default)]
    pub sdks: Vec<SdkRelease>,
}

impl Release {
    /// All SDK records shipped by this release, primary first.
    pub fn all_sdks(&self) -> impl Iterator<Item = &SdkRelease> {
        std::iter::once(&self.sdk).chain(self.sdks.iter())
    }
}

/// One installable SDK build.
///
/// Identity is version-based: two records with the same `version` are
/// equal even when their file payloads differ between catalog fetches.
#[derive(Debug, Clone, Deserialize)]
pub struct SdkRelease {
    pub version: Version,
    #[serde(rename = "version-display")]
    pub display_version: Version,
    #[serde(rename = "runtime-version")]
    pub runtime_version: Option<Version>,
    pub files: Vec<DownloadableFile>,
}

impl PartialEq for SdkRelease {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for SdkRelease {}

impl Hash for SdkRelease {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
    }
}

/// A single platform-specific downloadable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadableFile {
    pub name: String,
    #[serde(default)]
    pub rid: Option<String>,
    pub url: String,
    /// Raw bytes of the published SHA-512 digest.
    #[serde(rename = "hash", with = "hex_bytes")]
    pub sha512: Vec<u8>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        hex::decode(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn sdk(version: &str, runtime: Option<&str>) -> SdkRelease {
        SdkRelease {
            version: version.parse().expect("test version should parse"),
            display_version: version.parse().expect("test version should parse"),
            runtime_version: runtime.map(|r| r.parse().expect("test runtime should parse")),
            files: Vec::new(),
        }
    }

    #[test]
    fn sdk_equality_ignores_everything_but_version() {
        let mut a = sdk("10.0.100", Some("10.0.0"));
        let b = sdk("10.0.100", None);
        a.files.push(DownloadableFile {
            name: "dotnet-sdk-linux-x64.tar.gz".to_string(),
            rid: Some("linux-x64".to_string()),
            url: "https://example.com/sdk.tar.gz".to_string(),
            sha512: vec![0xab; 64],
        });

        assert_eq!(a, b);
    }

    #[test]
    fn sdk_dedup_by_version_in_hash_set() {
        let set: HashSet<SdkRelease> = [
            sdk("10.0.100", Some("10.0.0")),
            sdk("10.0.100", None),
            sdk("9.0.300", Some("9.0.3")),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn channel_document_deserializes_catalog_fields() {
        let json = r#"{
            "channel-version": "10.0",
            "latest-release": "10.0.1",
            "latest-sdk": "10.0.101",
            "support-phase": "active",
            "release-type": "lts",
            "releases": [{
                "release-version": "10.0.1",
                "sdk": {
                    "version": "10.0.101",
                    "version-display": "10.0.101",
                    "runtime-version": "10.0.1",
                    "files": [{
                        "name": "dotnet-sdk-linux-x64.tar.gz",
                        "rid": "linux-x64",
                        "url": "https://example.com/sdk.tar.gz",
                        "hash": "00ff"
                    }]
                },
                "sdks": []
            }]
        }"#;

        let channel: Channel = serde_json::from_str(json).expect("channel should deserialize");
        assert_eq!(channel.support_phase, SupportPhase::Active);
        assert_eq!(channel.release_kind, ReleaseKind::Lts);
        assert_eq!(channel.releases[0].sdk.files[0].sha512, vec![0x00, 0xff]);
    }

    #[test]
    fn standard_release_kind_uses_sts_wire_value() {
        let kind: ReleaseKind =
            serde_json::from_str("\"sts\"").expect("sts should deserialize");
        assert_eq!(kind, ReleaseKind::Standard);
    }

    #[test]
    fn invalid_hex_digest_is_rejected() {
        let json = r#"{
            "name": "sdk.tar.gz",
            "url": "https://example.com/sdk.tar.gz",
            "hash": "not-hex"
        }"#;
        let parsed: Result<DownloadableFile, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn release_all_sdks_yields_primary_first() {
        let release = Release {
            release_version: "10.0.1".parse().expect("version should parse"),
            sdk: sdk("10.0.101", Some("10.0.1")),
            sdks: vec![sdk("10.0.200", Some("10.0.1"))],
        };

        let versions: Vec<String> = release
            .all_sdks()
            .map(|s| s.version.to_string())
            .collect();
        assert_eq!(versions, ["10.0.101", "10.0.200"]);
    }
}
