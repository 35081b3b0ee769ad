use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use fs2::FileExt;
use thiserror::Error;

use dotver_platform::InstallRoot;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("another dotver instance is already running")]
    AlreadyRunning,
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl AcquireError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Exclusive lock over the installation root, held for the lifetime of
/// the process. Two concurrent runs mutating the shared tree would
/// corrupt it.
pub struct SingleInstance {
    _file: File,
}

impl SingleInstance {
    pub fn acquire(root: &InstallRoot) -> Result<Self, AcquireError> {
        root.ensure_dirs()
            .map_err(|error| AcquireError::io("failed to create installation root", error))?;

        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(root.lock_file())
            .map_err(|error| AcquireError::io("failed to open instance lock file", error))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(AcquireError::AlreadyRunning);
            }
            Err(error) => {
                return Err(AcquireError::io("failed to acquire instance lock", error));
            }
        }

        lock_file
            .set_len(0)
            .and_then(|()| lock_file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
            .map_err(|error| AcquireError::io("failed to write instance lock metadata", error))?;

        Ok(Self { _file: lock_file })
    }
}
