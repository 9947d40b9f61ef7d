//! docharvest CLI: crawl a documentation section into Markdown.
//!
//! Crawls every page below a seed URL, keeps the main content of each page,
//! and writes it out as one Markdown file or a zip archive.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
