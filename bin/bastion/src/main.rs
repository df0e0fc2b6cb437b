//! Bastion operator CLI.

mod cli;
mod commands;

use std::process::ExitCode;

use bastion_node_core::{BastionConfig, logging};
use clap::Parser;
use eyre::WrapErr;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::commands::Verdict;

fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logging(&cli.logs)?;

    let load_config = || {
        BastionConfig::load_or_default(cli.config.as_deref())
            .wrap_err("failed to load configuration")
    };

    let verdict = match &cli.command {
        Commands::Config(command) => {
            print!("{}", commands::config::run(command)?);
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Validate => {
            print!("{}", commands::validate::summary(&load_config()?)?);
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Dial(args) => commands::decide::dial(&load_config()?.gating.build()?, args),
        Commands::Accept(args) => commands::decide::accept(&load_config()?.gating.build()?, args),
    };

    info!(%verdict, "decision");
    println!("{verdict}");
    Ok(match verdict {
        Verdict::Allow => ExitCode::SUCCESS,
        Verdict::Deny => ExitCode::from(1),
    })
}
