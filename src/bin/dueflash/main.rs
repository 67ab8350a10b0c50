//! dueflash CLI - build and flash firmware for Cortex-M3 boards

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use dueflash::core::PipelineError;
use dueflash::util::diagnostic;

fn main() {
    if let Err(e) = run() {
        match e.downcast_ref::<PipelineError>() {
            Some(pipeline) => diagnostic::emit(&pipeline.to_diagnostic(), std::io::stderr().is_terminal()),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("dueflash=debug")
    } else {
        EnvFilter::new("dueflash=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = commands::GlobalArgs::from(&cli);
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &global),
        Commands::Flash(args) => commands::flash::execute(args, &global),
        Commands::Clean(args) => commands::clean::execute(args, &global),
        Commands::Doctor(args) => commands::doctor::execute(args, &global),
        Commands::Config(args) => commands::config::execute(args, &global),
    }
}
