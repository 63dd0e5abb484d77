use std::time::Duration;

use snafu::prelude::*;

use crate::application::data::{Detection, SyncMode};
use crate::cli::Cli;
use crate::config::{
    ConfigurationError, IntervalTooShortSnafu, MissingRootSnafu, SettingsFile, SettingsSnafu,
    validate_roots,
};
use crate::filesystem::SyncRoots;
use crate::reconcile::DetectionStrategy;

const DEFAULT_INTERVAL_SECS: u64 = 1;

/// Fully validated settings the application runs with.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub roots: SyncRoots,
    pub interval: Duration,
    pub detection: Detection,
    pub mode: SyncMode,
    pub rescan_interval: Option<Duration>,
}

impl RuntimeConfig {
    /// Merges the command line over the optional settings file and checks
    /// the result.
    pub async fn resolve(cli: &Cli) -> Result<Self, ConfigurationError> {
        let file = match &cli.config {
            Some(path) => SettingsFile::from_path(path).await.context(SettingsSnafu)?,
            None => SettingsFile::default(),
        };

        let source = cli
            .source
            .clone()
            .or(file.source)
            .context(MissingRootSnafu { name: "source" })?;
        let replica = cli
            .replica
            .clone()
            .or(file.replica)
            .context(MissingRootSnafu { name: "replica" })?;

        let interval = cli
            .interval
            .or(file.interval)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        ensure!(interval >= 1, IntervalTooShortSnafu { name: "interval" });

        let rescan_interval = cli.rescan_interval.or(file.rescan_interval);
        if let Some(rescan_interval) = rescan_interval {
            ensure!(
                rescan_interval >= 1,
                IntervalTooShortSnafu {
                    name: "rescan interval"
                }
            );
        }

        let roots = validate_roots(&source, &replica).await?;

        Ok(Self {
            roots,
            interval: Duration::from_secs(interval),
            detection: cli.strategy.or(file.strategy).unwrap_or_default(),
            mode: cli.mode.or(file.mode).unwrap_or_default(),
            rescan_interval: rescan_interval.map(Duration::from_secs),
        })
    }

    pub fn detection_strategy(&self) -> DetectionStrategy {
        self.detection.into()
    }
}
