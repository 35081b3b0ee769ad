mod env;
mod install;
mod list;
mod uninstall;
mod update;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dotver_core::{
    CatalogError, GlobalConfigError, InstallError, InstallProgress, RegistryError, ResolveError,
    SpecParseError, UninstallError, UpdateError,
};
use dotver_platform::{InstallRoot, PlatformError, RootError, runtime_identifier};

use crate::cli::Command;
use crate::single_instance::{AcquireError, SingleInstance};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("channel {channel} is already installed, use `dotver update` to refresh it")]
    AlreadyInstalled { channel: String },
    #[error("channel {channel} is not installed")]
    NotInstalled { channel: String },
    #[error("no channel given and no global.json pins a version, specify a channel")]
    NoChannel,
    #[error(transparent)]
    Lock(#[from] AcquireError),
    #[error(transparent)]
    Root(#[from] RootError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Spec(#[from] SpecParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Uninstall(#[from] UninstallError),
    #[error(transparent)]
    Update(#[from] UpdateError),
    #[error(transparent)]
    Global(#[from] GlobalConfigError),
    #[error("failed to {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub struct Context {
    pub root: InstallRoot,
    pub store: dotver_core::RegistryStore,
    pub http: reqwest::Client,
    pub rid: String,
    pub cancel: CancellationToken,
}

pub async fn run(command: Command) -> Result<(), CliError> {
    let root = InstallRoot::from_env()?;
    debug!("installation root: {}", root.path().display());

    // `env` and `list` only read; everything else mutates the shared
    // tree and must be the only running instance.
    let _lock = match command {
        Command::List | Command::Env => None,
        _ => Some(SingleInstance::acquire(&root)?),
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping");
                cancel.cancel();
            }
        });
    }

    let ctx = Context {
        store: dotver_core::RegistryStore::new(root.registry_file()),
        http: reqwest::Client::new(),
        rid: runtime_identifier()?,
        root,
        cancel,
    };

    match command {
        Command::Install { channel } => install::run(&ctx, channel.as_deref()).await,
        Command::Update { channel } => update::run(&ctx, channel.as_deref()).await,
        Command::Uninstall { channel, yes } => uninstall::run(&ctx, &channel, yes),
        Command::List => list::run(&ctx),
        Command::Env => env::run(&ctx),
    }
}

/// Drains installer progress into the log, reporting downloads at ten
/// percent steps to keep the output readable.
pub fn spawn_progress_logger(
    mut progress: mpsc::Receiver<InstallProgress>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_decile = 0_u64;
        let mut verifying_reported = false;
        while let Some(event) = progress.recv().await {
            match event {
                InstallProgress::Downloading {
                    downloaded,
                    total,
                    speed_mbps,
                } if total > 0 => {
                    let decile = downloaded * 10 / total;
                    if decile > last_decile {
                        last_decile = decile;
                        info!(
                            "downloaded {}/{} MiB ({speed_mbps:.1} MiB/s)",
                            downloaded / 1024 / 1024,
                            total / 1024 / 1024,
                        );
                    }
                }
                InstallProgress::Downloading { .. } => {}
                InstallProgress::Verifying { .. } => {
                    if !verifying_reported {
                        verifying_reported = true;
                        info!("verifying archive digest");
                    }
                }
                InstallProgress::Extracting => info!("extracting archive"),
                InstallProgress::Merging => info!("merging into installation tree"),
            }
        }
    })
}
