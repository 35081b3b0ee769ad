use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use futures_util::future::try_join_all;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;

use dotver_model::{Channel, ReleasesIndex, SdkRelease};

/// The well-known release catalog index.
pub const RELEASES_INDEX_URL: &str =
    "https://builds.dotnet.microsoft.com/dotnet/release-metadata/releases-index.json";

const LAST_MODIFIED_SUFFIX: &str = "lastmodified";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("catalog request to {url} failed with HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to parse catalog document from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to {context} catalog cache: {source}")]
    Cache {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the version matcher needs: all channel documents plus the
/// flattened, deduplicated, descending-sorted SDK array.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub channels: Vec<Channel>,
    pub sdks: Vec<SdkRelease>,
}

/// Fetches catalog documents with a conditional-request disk cache.
///
/// Each URL maps to two sibling cache files: the raw response body named
/// by the SHA-256 of the URL, and a `.lastmodified` file holding the
/// server's `Last-Modified` value for `If-Modified-Since` revalidation.
pub struct CatalogClient {
    http: reqwest::Client,
    cache_dir: PathBuf,
}

impl CatalogClient {
    #[must_use]
    pub fn new(http: reqwest::Client, cache_dir: PathBuf) -> Self {
        Self { http, cache_dir }
    }

    /// Fetch the index, fan out to all channel documents concurrently,
    /// and flatten their SDKs for resolution.
    ///
    /// # Errors
    /// Returns an error when any fetch fails or a document does not
    /// parse.
    pub async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        let index: ReleasesIndex = self.fetch_cached(RELEASES_INDEX_URL).await?;

        let channels: Vec<Channel> = try_join_all(
            index
                .entries
                .iter()
                .map(|entry| self.fetch_cached(&entry.releases_json)),
        )
        .await?;

        let sdks = flatten_sdks(&channels);
        Ok(CatalogSnapshot { channels, sdks })
    }

    /// Fetch one URL through the cache, parsing the body as `T`.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status other
    /// than 304, an unreadable cache, or a parse failure.
    pub async fn fetch_cached<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|source| CatalogError::Cache {
            context: "create",
            source,
        })?;

        let key = hex::encode(Sha256::digest(url.as_bytes()));
        let body_path = self.cache_dir.join(&key);
        let stamp_path = self.cache_dir.join(format!("{key}.{LAST_MODIFIED_SUFFIX}"));

        let mut request = self.http.get(url);
        if let Some(stamp) = read_valid_stamp(&body_path, &stamp_path) {
            request = request.header(reqwest::header::IF_MODIFIED_SINCE, stamp);
        }

        let response = request.send().await.map_err(|source| CatalogError::Request {
            url: url.to_string(),
            source,
        })?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("cache hit for {url}");
            let body = std::fs::read(&body_path).map_err(|source| CatalogError::Cache {
                context: "read",
                source,
            })?;
            return parse_body(url, &body);
        }

        if !response.status().is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let stamp = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|source| CatalogError::Request {
            url: url.to_string(),
            source,
        })?;

        std::fs::write(&body_path, &body).map_err(|source| CatalogError::Cache {
            context: "write",
            source,
        })?;
        match stamp {
            Some(stamp) => {
                std::fs::write(&stamp_path, stamp).map_err(|source| CatalogError::Cache {
                    context: "write",
                    source,
                })?;
            }
            // No validator to revalidate against next time; drop any
            // stale stamp so the next call refetches unconditionally.
            None => {
                let _ = std::fs::remove_file(&stamp_path);
            }
        }

        parse_body(url, &body)
    }
}

/// Stored `Last-Modified` value if both cache files exist and the stamp
/// is a well-formed HTTP date; anything inconsistent falls back to an
/// unconditional fetch.
fn read_valid_stamp(body_path: &Path, stamp_path: &Path) -> Option<String> {
    if !body_path.is_file() {
        return None;
    }
    let stamp = std::fs::read_to_string(stamp_path).ok()?;
    let stamp = stamp.trim().to_string();
    if DateTime::parse_from_rfc2822(&stamp).is_err() {
        warn!("discarding unparsable cache timestamp at {}", stamp_path.display());
        return None;
    }
    Some(stamp)
}

fn parse_body<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, CatalogError> {
    serde_json::from_slice(body).map_err(|source| CatalogError::Parse {
        url: url.to_string(),
        source,
    })
}

/// Flatten every SDK of every release, deduplicate by version identity,
/// and sort descending by version for the matcher.
#[must_use]
pub fn flatten_sdks(channels: &[Channel]) -> Vec<SdkRelease> {
    let mut seen = HashSet::new();
    let mut sdks: Vec<SdkRelease> = channels
        .iter()
        .flat_map(|channel| channel.releases.iter())
        .flat_map(dotver_model::Release::all_sdks)
        .filter(|sdk| seen.insert(sdk.version.clone()))
        .cloned()
        .collect();
    sdks.sort_by(|a, b| b.version.cmp(&a.version));
    sdks
}

#[cfg(test)]
mod tests {
    use dotver_model::{Release, ReleaseKind, SupportPhase};
    use semver::Version;

    use super::*;

    fn version(text: &str) -> Version {
        text.parse().expect("test version should parse")
    }

    fn sdk(ver: &str) -> SdkRelease {
        SdkRelease {
            version: version(ver),
            display_version: version(ver),
            runtime_version: None,
            files: Vec::new(),
        }
    }

    fn channel_with_releases(releases: Vec<Release>) -> Channel {
        Channel {
            channel_version: "10.0".to_string(),
            latest_release: version("10.0.1"),
            latest_sdk: version("10.0.101"),
            support_phase: SupportPhase::Active,
            release_kind: ReleaseKind::Lts,
            releases,
        }
    }

    #[test]
    fn flatten_sdks_dedups_and_sorts_descending() {
        let channels = vec![
            channel_with_releases(vec![
                Release {
                    release_version: version("10.0.1"),
                    sdk: sdk("10.0.101"),
                    sdks: vec![sdk("10.0.200"), sdk("10.0.101")],
                },
                Release {
                    release_version: version("10.0.0"),
                    sdk: sdk("10.0.100"),
                    sdks: Vec::new(),
                },
            ]),
            channel_with_releases(vec![Release {
                release_version: version("9.0.3"),
                sdk: sdk("9.0.300"),
                sdks: vec![sdk("10.0.200")],
            }]),
        ];

        let flattened = flatten_sdks(&channels);
        let versions: Vec<String> = flattened.iter().map(|s| s.version.to_string()).collect();
        assert_eq!(versions, ["10.0.200", "10.0.101", "10.0.100", "9.0.300"]);
    }

    #[test]
    fn stamp_is_rejected_when_body_or_timestamp_is_inconsistent() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let body = temp.path().join("body");
        let stamp = temp.path().join("body.lastmodified");

        // No cached body at all.
        std::fs::write(&stamp, "Wed, 21 Oct 2015 07:28:00 GMT").expect("stamp should be written");
        assert!(read_valid_stamp(&body, &stamp).is_none());

        // Body present but the stamp is not an HTTP date.
        std::fs::write(&body, b"{}").expect("body should be written");
        std::fs::write(&stamp, "yesterday-ish").expect("stamp should be written");
        assert!(read_valid_stamp(&body, &stamp).is_none());

        // Well-formed pair revalidates.
        std::fs::write(&stamp, "Wed, 21 Oct 2015 07:28:00 GMT").expect("stamp should be written");
        assert_eq!(
            read_valid_stamp(&body, &stamp).as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn cache_keys_are_stable_url_hashes() {
        let a = hex::encode(Sha256::digest(RELEASES_INDEX_URL.as_bytes()));
        let b = hex::encode(Sha256::digest(RELEASES_INDEX_URL.as_bytes()));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
