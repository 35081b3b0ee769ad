use std::fmt;
use std::str::FromStr;

use semver::Version;
use thiserror::Error;

use dotver_model::{Channel, DownloadableFile, ReleaseKind, SdkRelease, SupportPhase};
use dotver_platform::is_supported_archive;

/// A parsed channel specification.
///
/// Accepted user input: an exact version (`10.0.100`, `10.0.0`), a
/// feature-band pattern (`10.0.1xx`), a minor wildcard (`10.0.x`), a
/// bare major number (`10`), or one of `lts`, `latest`, `preview`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSpec {
    Exact(Version),
    Latest,
    Lts,
    Preview,
    Major(u64),
    MinorWildcard { major: u64, minor: u64 },
    FeatureBand { major: u64, minor: u64, band: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecParseError {
    #[error("invalid channel specification: {input}")]
    InvalidFormat { input: String },
}

impl FromStr for ChannelSpec {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || SpecParseError::InvalidFormat {
            input: s.to_string(),
        };

        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        if s.eq_ignore_ascii_case("lts") {
            return Ok(Self::Lts);
        }
        if s.eq_ignore_ascii_case("preview") {
            return Ok(Self::Preview);
        }

        if let Ok(major) = s.parse::<u64>() {
            return Ok(Self::Major(major));
        }

        if let Ok(version) = Version::parse(s) {
            return Ok(Self::Exact(version));
        }

        if let Some(prefix) = s.strip_suffix(".x") {
            let mut parts = prefix.split('.');
            let major = parts.next().and_then(|p| p.parse().ok());
            let minor = parts.next().and_then(|p| p.parse().ok());
            return match (major, minor, parts.next()) {
                (Some(major), Some(minor), None) => Ok(Self::MinorWildcard { major, minor }),
                _ => Err(invalid()),
            };
        }

        if let Some(prefix) = s.strip_suffix("xx") {
            let mut parts = prefix.split('.');
            let major = parts.next().and_then(|p| p.parse().ok());
            let minor = parts.next().and_then(|p| p.parse().ok());
            let band = parts.next().and_then(|p| p.parse().ok());
            return match (major, minor, band, parts.next()) {
                (Some(major), Some(minor), Some(band), None) => {
                    Ok(Self::FeatureBand { major, minor, band })
                }
                _ => Err(invalid()),
            };
        }

        Err(invalid())
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(version) => write!(f, "{version}"),
            Self::Latest => write!(f, "latest"),
            Self::Lts => write!(f, "lts"),
            Self::Preview => write!(f, "preview"),
            Self::Major(major) => write!(f, "{major}"),
            Self::MinorWildcard { major, minor } => write!(f, "{major}.{minor}.x"),
            Self::FeatureBand { major, minor, band } => write!(f, "{major}.{minor}.{band}xx"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no release matches the requested channel {spec}")]
    NoMatch { spec: String },
    #[error("SDK {version} does not specify a runtime version")]
    MissingRuntimeVersion { version: Version },
    #[error("SDK {version} publishes no archive for {rid}")]
    NoArtifact { version: Version, rid: String },
    #[error("SDK {version} publishes more than one archive for {rid}")]
    AmbiguousArtifact { version: Version, rid: String },
}

/// Resolve a channel specification against the catalog.
///
/// `sdks` must be pre-sorted descending by version, so "first match" is
/// always the highest matching version. Pure function: same inputs,
/// same answer.
#[must_use]
pub fn resolve_sdk<'a>(
    spec: &ChannelSpec,
    channels: &[Channel],
    sdks: &'a [SdkRelease],
) -> Option<&'a SdkRelease> {
    match spec {
        ChannelSpec::Exact(version) => sdks
            .iter()
            .find(|s| s.version == *version)
            .or_else(|| sdks.iter().find(|s| s.display_version == *version))
            .or_else(|| {
                sdks.iter()
                    .find(|s| s.runtime_version.as_ref() == Some(version))
            }),
        ChannelSpec::Preview => {
            match channels
                .iter()
                .find(|c| c.support_phase == SupportPhase::Preview)
            {
                Some(preview) => sdks.iter().find(|s| s.version == preview.latest_sdk),
                // No preview channel published right now; behave as `latest`.
                None => resolve_latest(channels, sdks),
            }
        }
        ChannelSpec::Latest => resolve_latest(channels, sdks),
        ChannelSpec::Lts => {
            let lts = channels.iter().find(|c| {
                c.support_phase == SupportPhase::Active && c.release_kind == ReleaseKind::Lts
            })?;
            sdks.iter().find(|s| s.version == lts.latest_sdk)
        }
        ChannelSpec::Major(major) => sdks.iter().find(|s| s.version.major == *major),
        ChannelSpec::MinorWildcard { major, minor } => sdks
            .iter()
            .find(|s| s.version.major == *major && s.version.minor == *minor),
        ChannelSpec::FeatureBand { major, minor, band } => {
            let lowest = band * 100;
            let highest = lowest + 99;
            sdks.iter().find(|s| {
                s.version.major == *major
                    && s.version.minor == *minor
                    && (lowest..=highest).contains(&s.version.patch)
            })
        }
    }
}

fn resolve_latest<'a>(channels: &[Channel], sdks: &'a [SdkRelease]) -> Option<&'a SdkRelease> {
    let active = channels
        .iter()
        .find(|c| c.support_phase == SupportPhase::Active)?;
    sdks.iter().find(|s| s.version == active.latest_sdk)
}

/// Pick the single downloadable file matching the running platform.
///
/// # Errors
/// Fails when zero or more than one file matches the platform identifier
/// and the supported archive format.
pub fn select_artifact<'a>(
    sdk: &'a SdkRelease,
    rid: &str,
) -> Result<&'a DownloadableFile, ResolveError> {
    let mut candidates = sdk
        .files
        .iter()
        .filter(|f| f.rid.as_deref() == Some(rid) && is_supported_archive(&f.name));

    let file = candidates.next().ok_or_else(|| ResolveError::NoArtifact {
        version: sdk.version.clone(),
        rid: rid.to_string(),
    })?;

    if candidates.next().is_some() {
        return Err(ResolveError::AmbiguousArtifact {
            version: sdk.version.clone(),
            rid: rid.to_string(),
        });
    }

    Ok(file)
}
