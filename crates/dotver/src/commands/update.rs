use log::info;
use tokio::sync::mpsc;

use dotver_core::{CatalogClient, TarGzExtractor, UpdateOutcome, Updater};

use super::{CliError, Context};

pub async fn run(ctx: &Context, channel: Option<&str>) -> Result<(), CliError> {
    let mut registry = ctx.store.load_or_default()?;
    if registry.installed_channels.is_empty() {
        info!("no channels are installed");
        return Ok(());
    }

    let catalog = CatalogClient::new(ctx.http.clone(), ctx.root.cache_dir());
    let snapshot = catalog.fetch_snapshot().await?;

    let (tx, rx) = mpsc::channel(64);
    let reporter = super::spawn_progress_logger(rx);

    let extractor = TarGzExtractor;
    let updater = Updater::new(&ctx.http, &ctx.root, &ctx.store, &extractor, &ctx.rid);

    let result = match channel {
        Some(channel) => updater
            .update_channel(channel, &mut registry, &snapshot, &tx, &ctx.cancel)
            .await
            .map(|outcome| vec![(channel.to_string(), outcome)]),
        None => {
            updater
                .update_all(&mut registry, &snapshot, &tx, &ctx.cancel)
                .await
        }
    };
    drop(tx);
    let _ = reporter.await;

    for (channel, outcome) in result? {
        match outcome {
            UpdateOutcome::UpToDate => info!("channel {channel} is already up to date"),
            UpdateOutcome::Updated { from, to } => {
                info!("channel {channel} updated from {from} to {to}");
            }
        }
    }
    Ok(())
}
