use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tracing::info;

use crate::config::SettingsFileError;
use crate::ext::BestEffortPathExt;
use crate::filesystem::SyncRoots;

/// Checks both roots and returns them in canonical form.
///
/// A missing replica root is created. Roots that are equal or nested inside
/// each other are rejected, mirroring would otherwise feed on itself.
pub async fn validate_roots(
    source: &Path,
    replica: &Path,
) -> Result<SyncRoots, ConfigurationError> {
    let source_metadata = compio::fs::metadata(source)
        .await
        .context(SourceInaccessibleSnafu { path: source })?;
    ensure!(
        source_metadata.is_dir(),
        SourceNotDirectorySnafu { path: source }
    );
    let source =
        std::fs::canonicalize(source).context(SourceInaccessibleSnafu { path: source })?;

    match compio::fs::metadata(replica).await {
        Ok(metadata) => ensure!(metadata.is_dir(), ReplicaNotDirectorySnafu { path: replica }),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            let planned = std::path::absolute(replica)
                .context(ReplicaInaccessibleSnafu { path: replica })?;
            check_disjoint(&source, &planned)?;
            compio::fs::create_dir_all(replica)
                .await
                .context(ReplicaCreateSnafu { path: replica })?;
            info!(
                "Created replica root {}",
                replica.best_effort_path_display()
            );
        }
        Err(error) => return Err(error).context(ReplicaInaccessibleSnafu { path: replica }),
    }
    let replica =
        std::fs::canonicalize(replica).context(ReplicaInaccessibleSnafu { path: replica })?;

    check_disjoint(&source, &replica)?;
    Ok(SyncRoots::new(source, replica))
}

fn check_disjoint(source: &Path, replica: &Path) -> Result<(), ConfigurationError> {
    ensure!(
        !source.starts_with(replica) && !replica.starts_with(source),
        OverlappingRootsSnafu {
            source_root: source,
            replica_root: replica,
        }
    );
    Ok(())
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigurationError {
    #[snafu(display("Failed to load the settings file"))]
    SettingsError { source: SettingsFileError },
    #[snafu(display("No {} directory was given", name))]
    MissingRoot { name: &'static str },
    #[snafu(display("The {} must be at least one second", name))]
    IntervalTooShort { name: &'static str },
    #[snafu(display("Source directory {} is not accessible", path.best_effort_path_display()))]
    SourceInaccessible {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Source {} is not a directory", path.best_effort_path_display()))]
    SourceNotDirectory { path: PathBuf },
    #[snafu(display("Replica directory {} is not accessible", path.best_effort_path_display()))]
    ReplicaInaccessible {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Replica {} exists and is not a directory", path.best_effort_path_display()))]
    ReplicaNotDirectory { path: PathBuf },
    #[snafu(display("Failed to create replica directory {}", path.best_effort_path_display()))]
    ReplicaCreate {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "Source {} and replica {} must not contain each other",
        source_root.best_effort_path_display(),
        replica_root.best_effort_path_display()
    ))]
    OverlappingRoots {
        source_root: PathBuf,
        replica_root: PathBuf,
    },
}
