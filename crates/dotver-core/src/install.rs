use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::StreamExt;
use log::{error, info, warn};
use semver::Version;
use sha2::{Digest, Sha512};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use dotver_model::{DownloadableFile, Registry};
use dotver_platform::{InstallRoot, is_supported_archive};

use crate::extract::{ArchiveExtractor, ExtractError};
use crate::store::{RegistryError, RegistryStore};

const SCRATCH_DIR: &str = "scratch";
const BUFFER_SIZE: usize = 1024 * 1024;
const MANIFESTS_SUBDIR: &str = "sdk-manifests";

#[derive(Debug, Clone)]
pub enum InstallProgress {
    Downloading {
        downloaded: u64,
        total: u64,
        speed_mbps: f64,
    },
    Verifying {
        hashed: u64,
        total: u64,
    },
    Extracting,
    Merging,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to download {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} failed with HTTP {status}")]
    Status { url: String, status: reqwest::StatusCode },
    #[error("{url} reports no content length")]
    MissingContentLength { url: String },
    #[error("failed to {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("digest mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("unsupported archive format: {name}")]
    UnsupportedArchive { name: String },
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("installation was cancelled")]
    Cancelled,
}

impl InstallError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Removes the extraction scratch directory on every exit path.
struct ScratchGuard(PathBuf);

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Err(error) = remove_dir_if_exists(&self.0) {
            warn!("failed to clean up scratch directory: {error}");
        }
    }
}

/// Downloads, verifies, extracts, and merges one SDK artifact into the
/// shared installation tree, then records it in the registry.
pub struct Installer<'a> {
    http: &'a reqwest::Client,
    root: &'a InstallRoot,
    store: &'a RegistryStore,
    extractor: &'a dyn ArchiveExtractor,
    progress: mpsc::Sender<InstallProgress>,
    cancel: CancellationToken,
}

impl<'a> Installer<'a> {
    #[must_use]
    pub fn new(
        http: &'a reqwest::Client,
        root: &'a InstallRoot,
        store: &'a RegistryStore,
        extractor: &'a dyn ArchiveExtractor,
        progress: mpsc::Sender<InstallProgress>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            root,
            store,
            extractor,
            progress,
            cancel,
        }
    }

    /// Install `file` for `channel`.
    ///
    /// Content is verified against the published SHA-512 digest before
    /// extraction; a mismatch aborts without touching the registry.
    /// Temporary artifacts are removed on every exit path, including
    /// cancellation.
    ///
    /// # Errors
    /// See [`InstallError`].
    pub async fn install(
        &self,
        file: &DownloadableFile,
        channel: &str,
        registry: &mut Registry,
        sdk_version: &Version,
        runtime_version: &Version,
    ) -> Result<(), InstallError> {
        let archive_name = sanitized_file_name(&file.name);
        if !is_supported_archive(archive_name) {
            return Err(InstallError::UnsupportedArchive {
                name: file.name.clone(),
            });
        }

        self.root
            .ensure_dirs()
            .map_err(|source| InstallError::io("create installation root", source))?;

        // The staging directory holds the downloaded archive and is
        // removed when dropped; the scratch directory holds the
        // extracted tree and is removed by the guard.
        let staging = tempfile::tempdir_in(self.root.path())
            .map_err(|source| InstallError::io("create staging directory", source))?;
        let archive_path = staging.path().join(archive_name);

        let scratch = self.root.path().join(SCRATCH_DIR);
        remove_dir_if_exists(&scratch)
            .map_err(|source| InstallError::io("clear scratch directory", source))?;
        let _scratch_guard = ScratchGuard(scratch.clone());

        info!("downloading {}", file.url);
        let total = download_file(
            self.http,
            &file.url,
            &archive_path,
            &self.progress,
            &self.cancel,
        )
        .await?;

        verify_sha512(&archive_path, &file.sha512, total, &self.progress, &self.cancel).await?;
        info!("digest verified for {}", file.name);

        let _ = self.progress.send(InstallProgress::Extracting).await;
        self.extractor
            .extract(&archive_path, &scratch, &self.cancel)
            .await?;

        let manifests = enumerate_manifests(&scratch.join(MANIFESTS_SUBDIR))
            .map_err(|source| InstallError::io("enumerate sdk manifests", source))?;

        let is_new_primary = registry
            .cli_version
            .as_ref()
            .is_none_or(|current| sdk_version > current);

        if self.cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        let _ = self.progress.send(InstallProgress::Merging).await;
        merge_tree(&scratch, &self.root.instances_dir(), is_new_primary)
            .map_err(|source| InstallError::io("merge into installation tree", source))?;

        self.store.upsert(
            channel,
            registry,
            sdk_version.clone(),
            runtime_version.clone(),
            manifests,
            is_new_primary,
        )?;

        info!("installed SDK {sdk_version} for channel {channel}");
        Ok(())
    }
}

/// HEAD request for the artifact size, used to fail early and to size
/// progress reporting.
///
/// # Errors
/// Fails on transport errors, non-success statuses, or a missing/zero
/// content length.
pub async fn preflight_size(http: &reqwest::Client, url: &str) -> Result<u64, InstallError> {
    let response = http
        .head(url)
        .send()
        .await
        .map_err(|source| InstallError::Request {
            url: url.to_string(),
            source,
        })?;
    if !response.status().is_success() {
        return Err(InstallError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }
    response
        .content_length()
        .filter(|length| *length > 0)
        .ok_or_else(|| InstallError::MissingContentLength {
            url: url.to_string(),
        })
}

async fn download_file(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: &mpsc::Sender<InstallProgress>,
    cancel: &CancellationToken,
) -> Result<u64, InstallError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|source| InstallError::Request {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(InstallError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let started = Instant::now();

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|source| InstallError::io("create download file", source))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        let chunk = chunk.map_err(|source| InstallError::Request {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|source| InstallError::io("write download data", source))?;
        downloaded += chunk.len() as u64;

        let elapsed = started.elapsed().as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let speed_mbps = if elapsed > 0.0 {
            downloaded as f64 / elapsed / 1024.0 / 1024.0
        } else {
            0.0
        };
        let _ = progress
            .send(InstallProgress::Downloading {
                downloaded,
                total,
                speed_mbps,
            })
            .await;
    }

    file.flush()
        .await
        .map_err(|source| InstallError::io("flush download file", source))?;

    info!("download complete: {downloaded} bytes");
    Ok(downloaded)
}

async fn verify_sha512(
    path: &Path,
    expected: &[u8],
    total: u64,
    progress: &mpsc::Sender<InstallProgress>,
    cancel: &CancellationToken,
) -> Result<(), InstallError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|source| InstallError::io("open file for verification", source))?;

    let mut hasher = Sha512::new();
    let mut buffer = vec![0_u8; BUFFER_SIZE];
    let mut hashed: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|source| InstallError::io("read file for verification", source))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        hashed += read as u64;
        let _ = progress.send(InstallProgress::Verifying { hashed, total }).await;
    }

    let actual = hasher.finalize();
    if actual.as_slice() == expected {
        Ok(())
    } else {
        let mismatch = InstallError::ChecksumMismatch {
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        };
        error!("{mismatch}");
        Err(mismatch)
    }
}

/// Versions of the manifest subdirectories the archive produced. A
/// missing manifests directory simply means the SDK ships none.
fn enumerate_manifests(dir: &Path) -> std::io::Result<Vec<Version>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        match name.to_string_lossy().parse::<Version>() {
            Ok(version) => versions.push(version),
            Err(_) => warn!(
                "ignoring manifest directory with non-version name: {}",
                name.to_string_lossy()
            ),
        }
    }
    versions.sort();
    Ok(versions)
}

/// Move every file from `scratch` into `dest_root` at its relative path.
///
/// When `overwrite` is set (a new primary install), existing destination
/// files are replaced; otherwise files already placed by a
/// higher-versioned install are left untouched.
fn merge_tree(scratch: &Path, dest_root: &Path, overwrite: bool) -> std::io::Result<()> {
    std::fs::create_dir_all(dest_root)?;

    for entry in WalkDir::new(scratch) {
        let entry = entry.map_err(std::io::Error::from)?;
        // Archives ship symlinks alongside regular files (e.g. versioned
        // shared-object names); both move over, directories are recreated.
        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(scratch)
            .map_err(std::io::Error::other)?;
        let dest = dest_root.join(relative);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // `symlink_metadata` detects dangling links that `exists` would
        // report as absent.
        let present = dest.symlink_metadata().is_ok();
        if overwrite || !present {
            if present {
                std::fs::remove_file(&dest)?;
            }
            std::fs::rename(entry.path(), &dest)?;
        }
    }

    Ok(())
}

fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}

fn sanitized_file_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && !n.contains(".."))
        .unwrap_or("artifact.tar.gz")
}
