mod agents;
mod cli;
mod document;
mod error;
mod github;
mod settings;
mod tags;
mod updaters;
mod utils;
mod workflow;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings_file = cli.settings_file.as_deref();

    match &cli.command {
        Commands::Detect(args) => {
            let needs_attention =
                workflow::execute_detect(settings_file, cli.token.clone(), args, cli.quiet)
                    .context("detect failed")?;
            if needs_attention {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Update(args) => {
            workflow::execute_update(settings_file, cli.token.clone(), args, cli.quiet)
                .context("update failed")?;
        }
        Commands::ListUpdaters => workflow::execute_list_updaters()?,
        Commands::Config { action } => workflow::execute_config(settings_file, action)
            .context("config command failed")?,
    }

    Ok(ExitCode::SUCCESS)
}
