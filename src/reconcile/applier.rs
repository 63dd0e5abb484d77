use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use compio::BufResult;
use compio::fs::File;
use compio::io::{AsyncReadAt, AsyncWriteAtExt};
use snafu::Snafu;
use tracing::debug;

use crate::ext::BestEffortPathExt;
use crate::filesystem::{CHUNK_SIZE, MirrorPath};
use crate::journal::{ActionKind, ActionRecord, ActivitySink};

/// Whether an applier call changed the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Applied,
    /// The replica already looked the way the call asked for.
    AlreadyInPlace,
}

/// Executes filesystem mutations on the replica.
///
/// Every call is idempotent and only touches the one path it is given.
/// Each `Applied` outcome is reported to the sink exactly once.
#[derive(Clone)]
pub struct Applier {
    sink: Arc<dyn ActivitySink>,
}

impl Applier {
    pub fn new(sink: Arc<dyn ActivitySink>) -> Self {
        Self { sink }
    }

    pub async fn create_directory(&self, target: &MirrorPath) -> Result<Mutation, ApplyError> {
        let destination = &target.destination;
        match compio::fs::symlink_metadata(destination).await {
            Ok(metadata) if metadata.is_dir() => return Ok(Mutation::AlreadyInPlace),
            Ok(metadata) if metadata.file_type().is_symlink() => {
                self.remove_link(target).await?;
            }
            Ok(_) => {
                return Err(ApplyError::Collision {
                    path: destination.clone(),
                });
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(classify("inspect", destination, error)),
        }

        compio::fs::create_dir_all(destination)
            .await
            .map_err(|error| classify("create directory", destination, error))?;

        self.record(ActionKind::CreateDirectory, target);
        Ok(Mutation::Applied)
    }

    /// Streams the source file over the destination and carries the source
    /// modification time along, so timestamp detection sees them as equal.
    pub async fn copy_file(&self, target: &MirrorPath) -> Result<Mutation, ApplyError> {
        let (source, destination) = (&target.source, &target.destination);

        // Read through std like the scanner, compio's metadata does not carry
        // modification times reliably.
        let source_metadata =
            std::fs::metadata(source).map_err(|error| classify("inspect", source, error))?;
        if source_metadata.is_dir() {
            return Err(ApplyError::Collision {
                path: source.clone(),
            });
        }
        let modified = source_metadata.modified().ok();

        match compio::fs::symlink_metadata(destination).await {
            Ok(metadata) if metadata.is_dir() => {
                return Err(ApplyError::Collision {
                    path: destination.clone(),
                });
            }
            Ok(metadata) if metadata.file_type().is_symlink() => {
                self.remove_link(target).await?;
            }
            _ => {}
        }

        let bytes = stream_content(source, destination).await?;
        if let Some(modified) = modified {
            set_modified(destination, modified)
                .map_err(|error| classify("set modification time of", destination, error))?;
        }

        debug!("Copied {} bytes into {}", bytes, destination.display());
        self.record(ActionKind::CopyFile, target);
        Ok(Mutation::Applied)
    }

    pub async fn remove_file(&self, target: &MirrorPath) -> Result<Mutation, ApplyError> {
        match compio::fs::remove_file(&target.destination).await {
            Ok(()) => {
                self.record(ActionKind::RemoveFile, target);
                Ok(Mutation::Applied)
            }
            Err(error) if is_absent(&error) => Ok(Mutation::AlreadyInPlace),
            Err(error) => Err(classify("remove file", &target.destination, error)),
        }
    }

    pub async fn remove_directory_tree(&self, target: &MirrorPath) -> Result<Mutation, ApplyError> {
        let destination = &target.destination;
        match compio::fs::symlink_metadata(destination).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(ApplyError::Collision {
                    path: destination.clone(),
                });
            }
            Err(error) if is_absent(&error) => return Ok(Mutation::AlreadyInPlace),
            Err(error) => return Err(classify("inspect", destination, error)),
        }

        // compio has no recursive removal, this runs on the calling thread.
        match std::fs::remove_dir_all(destination) {
            Ok(()) => {
                self.record(ActionKind::RemoveDirectoryTree, target);
                Ok(Mutation::Applied)
            }
            Err(error) if is_absent(&error) => Ok(Mutation::AlreadyInPlace),
            Err(error) => Err(classify("remove directory", destination, error)),
        }
    }

    /// Writing through a link would land outside the replica.
    async fn remove_link(&self, target: &MirrorPath) -> Result<(), ApplyError> {
        debug!("Replacing symbolic link {}", target.destination.display());
        self.remove_file(target).await?;
        Ok(())
    }

    fn record(&self, kind: ActionKind, target: &MirrorPath) {
        self.sink.applied(&ActionRecord::now(kind, target));
    }
}

async fn stream_content(source: &Path, destination: &Path) -> Result<u64, ApplyError> {
    let reader = File::open(source)
        .await
        .map_err(|error| classify("open", source, error))?;
    let mut writer = File::create(destination)
        .await
        .map_err(|error| classify("create", destination, error))?;

    let mut buffer = Vec::with_capacity(CHUNK_SIZE);
    let mut position = 0u64;
    loop {
        buffer.clear();
        let BufResult(result, returned) = reader.read_at(buffer, position).await;
        buffer = returned;
        let read = result.map_err(|error| classify("read", source, error))?;
        if read == 0 {
            break;
        }

        let BufResult(result, returned) = writer.write_all_at(buffer, position).await;
        buffer = returned;
        result.map_err(|error| classify("write", destination, error))?;
        position += read as u64;
    }

    writer
        .close()
        .await
        .map_err(|error| classify("close", destination, error))?;

    Ok(position)
}

/// A path below a file cannot exist either.
fn is_absent(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

fn set_modified(path: &Path, modified: SystemTime) -> std::io::Result<()> {
    std::fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(modified)
}

fn classify(operation: &'static str, path: &Path, error: std::io::Error) -> ApplyError {
    let path = path.to_path_buf();
    match error.kind() {
        ErrorKind::NotFound => ApplyError::NotFound {
            operation,
            path,
            source: error,
        },
        ErrorKind::PermissionDenied => ApplyError::PermissionDenied {
            operation,
            path,
            source: error,
        },
        _ => ApplyError::IoFailure {
            operation,
            path,
            source: error,
        },
    }
}

#[derive(Debug, Snafu)]
pub enum ApplyError {
    #[snafu(display("Cannot {} {}: path vanished", operation, path.best_effort_path_display()))]
    NotFound {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Cannot {} {}: permission denied", operation, path.best_effort_path_display()))]
    PermissionDenied {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to {} {}", operation, path.best_effort_path_display()))]
    IoFailure {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("{} is occupied by an object of another kind", path.best_effort_path_display()))]
    Collision { path: PathBuf },
}
