mod cli;
mod config;
mod platform;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    platform::run(cli::Cli::parse())
}
