mod analyze;
mod ast;
mod cache;
mod cfg;
mod cli;
mod commands;
mod config;
mod detect;
mod engine;
mod errors;
mod lang;
mod report;
mod walk;

use crate::config::Config;
use crate::errors::ArgusResult;
use clap::Parser;
use cli::Cli;
use console::style;
use directories::ProjectDirs;
use std::fs;
use std::time::Instant;
use tracing_subscriber::fmt::time;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

fn init_tracing() {
    let fmt_layer = fmt::layer()
        .pretty()
        .with_thread_ids(true)
        .with_timer(time::UtcTime::rfc_3339());

    Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt_layer)
        .init();
}

fn run() -> ArgusResult<i32> {
    let now = Instant::now();

    tracing::debug!("CLI starting up");
    let cli = Cli::parse();

    let proj_dirs = ProjectDirs::from("dev", "argus-dev", "argus")
        .ok_or("Unable to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    fs::create_dir_all(config_dir)?;

    let database_dir = proj_dirs.data_local_dir();
    fs::create_dir_all(database_dir)?;

    let mut config = Config::load(config_dir)?;

    let code = commands::handle_command(cli.command, database_dir, &mut config)?;

    if !config.output.quiet {
        println!(
            "{} in {:.3}s.",
            style("Finished").green().bold(),
            now.elapsed().as_secs_f32()
        );
    }
    Ok(code)
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}
