mod auth;
mod cli;
mod config;
mod error;
mod filter;
mod model;
mod output;
mod pins;
mod poller;
mod providers;
mod state;
mod view;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting cidash");
    cli.execute().await?;

    Ok(())
}
