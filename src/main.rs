use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;

use cli::command::Cli;

mod byteorder;
mod cli;
mod input;
mod report;
mod stream;
pub(crate) mod timestamp;
mod wav;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let multi = MultiProgress::new();
    let progress = cli::logging::init(&cli, &multi)?;

    cli::run(&cli, progress)
}
