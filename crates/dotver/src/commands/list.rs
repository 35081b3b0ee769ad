use std::collections::BTreeMap;

use semver::Version;

use super::{CliError, Context};

pub fn run(ctx: &Context) -> Result<(), CliError> {
    let registry = ctx.store.load_or_default()?;
    if registry.installed_channels.is_empty() {
        println!("no channels installed");
        return Ok(());
    }

    // Group by SDK version so shared installations show up once.
    let mut by_sdk: BTreeMap<&Version, Vec<&str>> = BTreeMap::new();
    for (channel, entry) in &registry.installed_channels {
        by_sdk
            .entry(&entry.sdk_version)
            .or_default()
            .push(channel.as_str());
    }

    for (version, channels) in by_sdk {
        let primary = registry.cli_version.as_ref() == Some(version);
        let marker = if primary { " (primary)" } else { "" };
        println!("{version}{marker} <- {}", channels.join(", "));
    }
    Ok(())
}
