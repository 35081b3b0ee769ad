use std::io::Write;

use log::info;

use dotver_core::Uninstaller;

use super::{CliError, Context};

pub fn run(ctx: &Context, channel: &str, yes: bool) -> Result<(), CliError> {
    let mut registry = ctx.store.load_or_default()?;
    if !registry.installed_channels.contains_key(channel) {
        return Err(CliError::NotInstalled {
            channel: channel.to_string(),
        });
    }

    let is_last = registry.installed_channels.len() == 1;
    if is_last && !yes {
        let proceed = confirm(&format!(
            "{channel} is the last installed channel; removing it deletes the whole \
             installation tree under {}. Continue?",
            ctx.root.path().display()
        ))?;
        if !proceed {
            info!("uninstall aborted");
            return Ok(());
        }
    }

    let uninstaller = Uninstaller::new(&ctx.root, &ctx.store, &ctx.rid);
    uninstaller.uninstall(channel, &mut registry, true)?;

    if is_last {
        purge(ctx)?;
        info!("removed the last channel and purged the installation tree");
    } else {
        info!("channel {channel} uninstalled");
    }
    Ok(())
}

/// With no channels left, anything still on disk (the shared host, the
/// download cache, the now-empty registry) is orphaned.
fn purge(ctx: &Context) -> Result<(), CliError> {
    for dir in [ctx.root.instances_dir(), ctx.root.cache_dir()] {
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CliError::Io {
                    context: "purge installation tree",
                    source,
                });
            }
        }
    }
    match std::fs::remove_file(ctx.root.registry_file()) {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(CliError::Io {
                context: "remove registry file",
                source,
            });
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush().map_err(|source| CliError::Io {
        context: "flush prompt",
        source,
    })?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|source| CliError::Io {
            context: "read confirmation",
            source,
        })?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
