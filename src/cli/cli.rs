use std::path::PathBuf;

use clap::Parser;

use crate::application::data::{Detection, LogLevel, SyncMode};

/// Keeps a replica directory an exact one-way mirror of a source directory.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Directory to mirror
    pub source: Option<PathBuf>,
    /// Directory kept identical to the source
    pub replica: Option<PathBuf>,

    /// Seconds between synchronization passes [default: 1]
    #[clap(long, short)]
    pub interval: Option<u64>,
    /// How changed files are detected [default: timestamp]
    #[clap(long, short, value_enum)]
    pub strategy: Option<Detection>,
    /// How changes are discovered [default: poll]
    #[clap(long, short, value_enum)]
    pub mode: Option<SyncMode>,
    /// Seconds between full rescans in watch mode, none when unset
    #[clap(long)]
    pub rescan_interval: Option<u64>,

    /// YAML settings file, command line arguments take precedence over it
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    #[clap(long, short, default_value = "info", value_enum)]
    pub log_level: LogLevel,
    /// Also append log output to this file
    #[clap(long, default_value = "sync_log.txt")]
    pub log_file: PathBuf,
    /// Log to the console only
    #[clap(long, conflicts_with = "log_file")]
    pub no_log_file: bool,
}

impl Cli {
    pub fn log_file(&self) -> Option<&PathBuf> {
        (!self.no_log_file).then_some(&self.log_file)
    }
}
