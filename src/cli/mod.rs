use anyhow::Result;
use indicatif::MultiProgress;

use command::{Cli, Commands};

pub mod command;
pub mod info;
pub mod logging;
pub mod wrap;

/// Runs the selected subcommand.
pub fn run(cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    match &cli.command {
        Commands::Wrap(args) => wrap::cmd_wrap(args, cli, multi),
        Commands::Info(args) => info::cmd_info(args, cli, multi),
    }
}
