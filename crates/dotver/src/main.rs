mod cli;
mod commands;
mod logging;
mod single_instance;

use clap::Parser;
use log::error;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(err) = commands::run(cli.command).await {
        error!("{err}");
        std::process::exit(1);
    }
}
