use log::info;
use tokio::sync::mpsc;

use dotver_core::{
    CatalogClient, ChannelSpec, Installer, ResolveError, TarGzExtractor, pinned_sdk_version,
    preflight_size, resolve_sdk, select_artifact,
};

use super::{CliError, Context};

pub async fn run(ctx: &Context, channel: Option<&str>) -> Result<(), CliError> {
    let requested = match channel {
        Some(channel) => channel.to_string(),
        None => {
            let cwd = std::env::current_dir().map_err(|source| CliError::Io {
                context: "resolve working directory",
                source,
            })?;
            let pinned = pinned_sdk_version(&cwd)?.ok_or(CliError::NoChannel)?;
            info!("installing SDK {pinned} pinned by global.json");
            pinned
        }
    };

    let spec: ChannelSpec = requested.parse()?;
    let channel_key = spec.to_string();

    if ctx.store.is_channel_installed(&channel_key)? {
        return Err(CliError::AlreadyInstalled {
            channel: channel_key,
        });
    }

    let catalog = CatalogClient::new(ctx.http.clone(), ctx.root.cache_dir());
    let snapshot = catalog.fetch_snapshot().await?;

    let sdk = resolve_sdk(&spec, &snapshot.channels, &snapshot.sdks).ok_or_else(|| {
        ResolveError::NoMatch {
            spec: spec.to_string(),
        }
    })?;
    let runtime_version =
        sdk.runtime_version
            .clone()
            .ok_or_else(|| ResolveError::MissingRuntimeVersion {
                version: sdk.version.clone(),
            })?;
    info!("channel {channel_key} resolves to SDK {}", sdk.version);

    let mut registry = ctx.store.load_or_default()?;

    if let Some(existing) = registry.entry_with_sdk(&sdk.version).cloned() {
        // Another channel already put this SDK on disk; record the new
        // channel without downloading anything.
        info!("SDK {} is already installed, registering channel", sdk.version);
        ctx.store.upsert(
            &channel_key,
            &mut registry,
            existing.sdk_version,
            existing.runtime_version,
            existing.sdk_manifests,
            false,
        )?;
        return Ok(());
    }

    let file = select_artifact(sdk, &ctx.rid)?;
    let size = preflight_size(&ctx.http, &file.url).await?;
    info!("downloading {} ({} MiB)", file.name, size / 1024 / 1024);

    let (tx, rx) = mpsc::channel(64);
    let reporter = super::spawn_progress_logger(rx);

    let extractor = TarGzExtractor;
    let installer = Installer::new(
        &ctx.http,
        &ctx.root,
        &ctx.store,
        &extractor,
        tx.clone(),
        ctx.cancel.clone(),
    );
    let result = installer
        .install(file, &channel_key, &mut registry, &sdk.version, &runtime_version)
        .await;
    drop(tx);
    let _ = reporter.await;
    result?;

    info!("channel {channel_key} is ready, run `dotver env` to put it on PATH");
    Ok(())
}
