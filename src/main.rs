#![allow(clippy::enum_variant_names)]

use std::fs::OpenOptions;
use std::sync::Mutex;

use clap::Parser as _;
use snafu::ResultExt;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use crate::{
    application::{Application, ApplicationError, LogFileSnafu},
    cli::Cli,
};

mod application;
mod cli;
mod config;
mod ext;
mod filesystem;
mod journal;
mod reconcile;

#[compio::main]
#[snafu::report]
async fn main() -> Result<(), ApplicationError> {
    let cli_args = Cli::parse();
    setup_tracing(&cli_args)?;
    debug!("Parsed CLI arguments: {cli_args:?}");

    Application::run(cli_args).await?;

    Ok(())
}

fn setup_tracing(cli_args: &Cli) -> Result<(), ApplicationError> {
    let Some(level) = cli_args.log_level.to_tracing_level() else {
        return Ok(());
    };

    let console = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(supports_color::on(supports_color::Stream::Stderr).is_some());

    let log_file = match cli_args.log_file() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .context(LogFileSnafu { path })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(console)
        .with(log_file)
        .init();
    Ok(())
}
