use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Multi-channel .NET SDK version manager", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install the SDK channel. Without an argument the channel comes
    /// from the nearest `global.json`
    Install {
        /// Channel to install: `latest`, `lts`, `preview`, `10`,
        /// `10.0.x`, `10.0.1xx`, or an exact version
        channel: Option<String>,
    },
    /// Update installed channels to their latest release. Defaults to all
    Update {
        /// Update one specific channel
        channel: Option<String>,
    },
    /// Uninstall a channel, keeping artifacts other channels still use
    Uninstall {
        /// Channel to uninstall, exactly as shown by `dotver list`
        channel: String,
        /// Skip the confirmation prompt when removing the last channel
        #[arg(short, long)]
        yes: bool,
    },
    /// List installed SDK versions and the channels that own them
    List,
    /// Print shell exports that put the managed CLI on PATH
    Env,
}
