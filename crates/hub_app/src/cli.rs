use std::path::PathBuf;

use clap::Parser;
use hub_core::DocumentKind;

#[derive(Debug, Parser)]
#[command(name = "hub", about = "IGAD Innovation Hub drafting console")]
pub struct Cli {
    /// RON configuration file; built-in defaults when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Draft to open (created on first save if it does not exist)
    #[arg(long)]
    pub draft: String,
    #[arg(long, default_value = "anonymous")]
    pub owner: String,
    /// Document kind: proposal or newsletter
    #[arg(long, default_value = "proposal")]
    pub kind: DocumentKind,
    /// Read commands from file (one per line; '#' comments supported)
    #[arg(long)]
    pub script: Option<PathBuf>,
    #[arg(long)]
    pub verbose: bool,
}
