use anyhow::Result;
use clap::Parser;
use loctally::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.execute()
}
