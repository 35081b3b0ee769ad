use std::path::Path;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use log::warn;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("extraction was cancelled")]
    Cancelled,
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Seam for the archive decoding primitive: unpack an archive file into
/// a directory.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), ExtractError>;
}

/// Default extractor for the gzipped tarballs the catalog publishes.
pub struct TarGzExtractor;

#[async_trait]
impl ArchiveExtractor for TarGzExtractor {
    async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), ExtractError> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || unpack_tar_gz(&archive, &dest, &cancel))
            .await
            .map_err(|error| ExtractError::Task(error.to_string()))?
    }
}

fn unpack_tar_gz(archive: &Path, dest: &Path, cancel: &CancellationToken) -> Result<(), ExtractError> {
    std::fs::create_dir_all(dest).map_err(|source| ExtractError::Io {
        context: "create extraction directory",
        source,
    })?;

    let file = std::fs::File::open(archive).map_err(|source| ExtractError::Io {
        context: "open archive",
        source,
    })?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));

    let entries = tarball.entries().map_err(|source| ExtractError::Io {
        context: "read archive",
        source,
    })?;
    for entry in entries {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        let mut entry = entry.map_err(|source| ExtractError::Io {
            context: "read archive entry",
            source,
        })?;
        // unpack_in refuses entries that would escape dest.
        let unpacked = entry.unpack_in(dest).map_err(|source| ExtractError::Io {
            context: "unpack archive entry",
            source,
        })?;
        if !unpacked {
            warn!("skipping archive entry with unsafe path");
        }
    }

    Ok(())
}
