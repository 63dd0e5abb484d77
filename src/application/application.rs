use std::pin::pin;
use std::sync::Arc;

use futures::future::{Either, select};
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::application::RuntimeConfig;
use crate::application::data::SyncMode;
use crate::cli::Cli;
use crate::config::ConfigurationError;
use crate::ext::BestEffortPathExt;
use crate::journal::{ActivitySink, TracingSink};
use crate::reconcile::{EventReconciler, NotificationSubscription, PollingReconciler, WatchError};

pub struct Application;

impl Application {
    /// Resolves the configuration and synchronizes until interrupted.
    pub async fn run(cli: Cli) -> Result<(), ApplicationError> {
        let config = RuntimeConfig::resolve(&cli).await.context(ConfigSnafu)?;
        debug!("Resolved configuration: {:?}", config);

        info!(
            "Synchronization of {} into {} starting ({} mode, {} detection)",
            config.roots.source.best_effort_path_display(),
            config.roots.replica.best_effort_path_display(),
            config.mode,
            config.detection
        );

        let sink: Arc<dyn ActivitySink> = Arc::new(TracingSink);
        let session = pin!(Self::synchronize(&config, sink));
        let interrupted = pin!(compio::signal::ctrl_c());

        match select(session, interrupted).await {
            Either::Left((result, _)) => result?,
            Either::Right((signal, _)) => {
                signal.context(SignalSnafu)?;
                info!("Synchronization stopped by user");
            }
        }

        Ok(())
    }

    async fn synchronize(
        config: &RuntimeConfig,
        sink: Arc<dyn ActivitySink>,
    ) -> Result<(), ApplicationError> {
        let mut polling = PollingReconciler::new(
            config.roots.clone(),
            config.detection_strategy(),
            config.interval,
            sink.clone(),
        );

        match config.mode {
            SyncMode::Poll => polling.run().await,
            SyncMode::Watch => {
                // Subscribe first so nothing that changes during the initial
                // pass goes unnoticed.
                let mut subscription =
                    NotificationSubscription::start(&config.roots, sink.clone())
                        .context(WatchSnafu)?;
                polling.tick().await;

                let reconciler = EventReconciler::new(config.roots.clone(), sink);
                match config.rescan_interval {
                    Some(interval) => {
                        reconciler
                            .run_with_rescan(&mut subscription.events, &mut polling, interval)
                            .await
                    }
                    None => reconciler.run(&mut subscription.events).await,
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: ConfigurationError },
    #[snafu(display("Failed to start watching the source directory"))]
    WatchError { source: WatchError },
    #[snafu(display("Failed to listen for the interrupt signal"))]
    SignalError { source: std::io::Error },
    #[snafu(display("Failed to open the log file {}", path.best_effort_path_display()))]
    LogFileError {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
